use crate::attention::AttentionBias;
use crate::embedding::{PositionalEncoding, TokenEmbedding};
use crate::error::{self, TranslatorError};
use crate::mask::Seq2SeqMasks;
use crate::transformer::{Decoder, Encoder, LayerDims};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;

/// Architecture of the encoder-decoder translator.
#[derive(Config, Debug)]
pub struct Seq2SeqConfig {
    pub src_vocab_size: usize,
    pub tgt_vocab_size: usize,
    #[config(default = 512)]
    pub d_model: usize,
    #[config(default = 8)]
    pub n_heads: usize,
    #[config(default = 512)]
    pub d_ff: usize,
    #[config(default = 3)]
    pub n_encoder_layers: usize,
    #[config(default = 3)]
    pub n_decoder_layers: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
    /// Longest sequence the positional table supports
    #[config(default = 5000)]
    pub max_len: usize,
}

impl Seq2SeqConfig {
    pub fn validate(&self) -> error::Result<()> {
        let sizes = [
            (self.src_vocab_size, "src_vocab_size"),
            (self.tgt_vocab_size, "tgt_vocab_size"),
            (self.d_model, "d_model"),
            (self.n_heads, "n_heads"),
            (self.d_ff, "d_ff"),
            (self.max_len, "max_len"),
        ];
        if let Some((_, name)) = sizes.iter().find(|(size, _)| *size == 0) {
            return Err(TranslatorError::ZeroDimension(*name));
        }
        if self.d_model % self.n_heads != 0 {
            return Err(TranslatorError::HeadsNotDivisible {
                d_model: self.d_model,
                n_heads: self.n_heads,
            });
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(TranslatorError::Config(format!(
                "dropout {} must lie in [0, 1)",
                self.dropout
            )));
        }

        Ok(())
    }

    pub fn layer_dims(&self) -> LayerDims {
        LayerDims {
            d_model: self.d_model,
            n_heads: self.n_heads,
            d_ff: self.d_ff,
            dropout: self.dropout,
        }
    }

    /// Builds a freshly initialized model; configuration mistakes fail here.
    pub fn init<B: Backend>(&self, device: &B::Device) -> error::Result<Seq2SeqModel<B>> {
        self.validate()?;
        let dims = self.layer_dims();

        Ok(Seq2SeqModel {
            src_embedding: TokenEmbedding::new(self.src_vocab_size, self.d_model, device),
            tgt_embedding: TokenEmbedding::new(self.tgt_vocab_size, self.d_model, device),
            positional_encoding: PositionalEncoding::new(
                self.d_model,
                self.max_len,
                self.dropout,
                device,
            ),
            encoder: Encoder::new(self.n_encoder_layers, dims, device)?,
            decoder: Decoder::new(self.n_decoder_layers, dims, device)?,
            generator: LinearConfig::new(self.d_model, self.tgt_vocab_size).init(device),
        })
    }
}

// ===== Seq2SeqModel =====

/// Token batches are sequence-major ([seq_len, batch]); hidden states and
/// logits follow the same layout with the feature axis last.
#[derive(Module, Debug)]
pub struct Seq2SeqModel<B: Backend> {
    pub(crate) src_embedding: TokenEmbedding<B>,
    pub(crate) tgt_embedding: TokenEmbedding<B>,
    positional_encoding: PositionalEncoding<B>,
    encoder: Encoder<B>,
    decoder: Decoder<B>,
    generator: Linear<B>,
}

impl<B: Backend> Seq2SeqModel<B> {
    pub fn src_vocab_size(&self) -> usize {
        self.src_embedding.vocab_size()
    }

    pub fn tgt_vocab_size(&self) -> usize {
        self.tgt_embedding.vocab_size()
    }

    pub fn max_len(&self) -> usize {
        self.positional_encoding.max_len()
    }

    /// src: [src_len, batch] → memory: [src_len, batch, d_model]
    pub fn encode(
        &self,
        src: Tensor<B, 2, Int>,
        src_key_exclusion: Option<&Tensor<B, 2, Bool>>,
    ) -> error::Result<Tensor<B, 3>> {
        let [src_len, batch_size] = src.dims();
        check_non_empty("source", src_len, batch_size)?;
        check_exclusion("source", src_key_exclusion, batch_size, src_len)?;

        let embedded = self.src_embedding.forward(src.swap_dims(0, 1));
        let x = self.positional_encoding.forward(embedded)?;
        let memory = self
            .encoder
            .forward(x, &AttentionBias::None, src_key_exclusion);

        Ok(memory.swap_dims(0, 1))
    }

    /// tgt: [tgt_len, batch], memory: [src_len, batch, d_model] → [tgt_len, batch, d_model]
    pub fn decode(
        &self,
        tgt: Tensor<B, 2, Int>,
        memory: Tensor<B, 3>,
        tgt_bias: &AttentionBias<B>,
        tgt_key_exclusion: Option<&Tensor<B, 2, Bool>>,
        memory_key_exclusion: Option<&Tensor<B, 2, Bool>>,
    ) -> error::Result<Tensor<B, 3>> {
        let [tgt_len, batch_size] = tgt.dims();
        let [src_len, memory_batch, _] = memory.dims();
        check_non_empty("target", tgt_len, batch_size)?;
        if memory_batch != batch_size {
            return Err(TranslatorError::MalformedBatch(format!(
                "target batch {batch_size} does not match memory batch {memory_batch}"
            )));
        }
        check_exclusion("target", tgt_key_exclusion, batch_size, tgt_len)?;
        check_exclusion("memory", memory_key_exclusion, batch_size, src_len)?;

        let embedded = self.tgt_embedding.forward(tgt.swap_dims(0, 1));
        let x = self.positional_encoding.forward(embedded)?;
        let hidden = self.decoder.forward(
            x,
            memory.swap_dims(0, 1),
            tgt_bias,
            tgt_key_exclusion,
            memory_key_exclusion,
        );

        Ok(hidden.swap_dims(0, 1))
    }

    /// hidden: [.., .., d_model] → unnormalized target-vocabulary scores
    pub fn generator(&self, hidden: Tensor<B, 3>) -> Tensor<B, 3> {
        self.generator.forward(hidden)
    }

    /// Teacher-forced pass: logits [tgt_len, batch, tgt_vocab_size]
    pub fn forward(
        &self,
        src: Tensor<B, 2, Int>,
        tgt: Tensor<B, 2, Int>,
        masks: &Seq2SeqMasks<B>,
    ) -> error::Result<Tensor<B, 3>> {
        let [_, src_batch] = src.dims();
        let [_, tgt_batch] = tgt.dims();
        if src_batch != tgt_batch {
            return Err(TranslatorError::MalformedBatch(format!(
                "source batch {src_batch} does not match target batch {tgt_batch}"
            )));
        }

        let memory = self.encode(src, masks.src_key_exclusion.as_ref())?;
        let hidden = self.decode(
            tgt,
            memory,
            &masks.tgt_bias,
            masks.tgt_key_exclusion.as_ref(),
            masks.memory_key_exclusion.as_ref(),
        )?;

        Ok(self.generator(hidden))
    }
}

fn check_non_empty(side: &str, seq_len: usize, batch_size: usize) -> error::Result<()> {
    if seq_len == 0 || batch_size == 0 {
        return Err(TranslatorError::MalformedBatch(format!(
            "{side} batch has shape [{seq_len}, {batch_size}]"
        )));
    }
    Ok(())
}

fn check_exclusion<B: Backend>(
    side: &str,
    exclusion: Option<&Tensor<B, 2, Bool>>,
    batch_size: usize,
    seq_len: usize,
) -> error::Result<()> {
    match exclusion {
        Some(mask) if mask.dims() != [batch_size, seq_len] => {
            Err(TranslatorError::MalformedBatch(format!(
                "{side} key exclusion has shape {:?}, expected [{batch_size}, {seq_len}]",
                mask.dims()
            )))
        }
        _ => Ok(()),
    }
}
