use crate::attention::{AttentionBias, MultiHeadAttention};
use crate::error::Result;
use burn::nn::{Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig};
use burn::prelude::*;

/// Shape of one encoder or decoder layer.
#[derive(Clone, Copy, Debug)]
pub struct LayerDims {
    pub d_model: usize,
    pub n_heads: usize,
    pub d_ff: usize,
    pub dropout: f64,
}

// ===== FeedForward =====

#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    w_1: Linear<B>,
    w_2: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> FeedForward<B> {
    pub fn new(dims: LayerDims, device: &B::Device) -> Self {
        let w_1 = LinearConfig::new(dims.d_model, dims.d_ff).init(device);
        let w_2 = LinearConfig::new(dims.d_ff, dims.d_model).init(device);
        let dropout = DropoutConfig::new(dims.dropout).init();

        Self { w_1, w_2, dropout }
    }

    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        // d_model → d_ff → ReLU → d_model
        let hidden = self.w_1.forward(x);
        let activated = burn::tensor::activation::relu(hidden);
        let activated = self.dropout.forward(activated);

        self.dropout.forward(self.w_2.forward(activated))
    }
}

// ===== Encoder layer =====

#[derive(Module, Debug)]
pub struct EncoderLayer<B: Backend> {
    self_attention: MultiHeadAttention<B>,
    feed_forward: FeedForward<B>,
    layer_norm1: LayerNorm<B>,
    layer_norm2: LayerNorm<B>,
    dropout: Dropout,
}

impl<B: Backend> EncoderLayer<B> {
    pub fn new(dims: LayerDims, device: &B::Device) -> Result<Self> {
        Ok(Self {
            self_attention: MultiHeadAttention::new(dims.d_model, dims.n_heads, device)?,
            feed_forward: FeedForward::new(dims, device),
            layer_norm1: LayerNormConfig::new(dims.d_model).init(device),
            layer_norm2: LayerNormConfig::new(dims.d_model).init(device),
            dropout: DropoutConfig::new(dims.dropout).init(),
        })
    }

    /// Pre-LN: each sub-layer sees a normalized input, the residual path does not.
    pub fn forward(
        &self,
        x: Tensor<B, 3>,
        bias: &AttentionBias<B>,
        key_exclusion: Option<&Tensor<B, 2, Bool>>,
    ) -> Tensor<B, 3> {
        let normalized1 = self.layer_norm1.forward(x.clone());
        let attention_output = self.self_attention.forward(
            normalized1.clone(),
            normalized1.clone(),
            normalized1,
            bias,
            key_exclusion,
        );
        let residual1 = x + self.dropout.forward(attention_output);

        let normalized2 = self.layer_norm2.forward(residual1.clone());
        let ff_output = self.feed_forward.forward(normalized2);

        residual1 + ff_output
    }
}

// ===== Decoder layer =====

#[derive(Module, Debug)]
pub struct DecoderLayer<B: Backend> {
    self_attention: MultiHeadAttention<B>,
    cross_attention: MultiHeadAttention<B>,
    feed_forward: FeedForward<B>,
    layer_norm1: LayerNorm<B>,
    layer_norm2: LayerNorm<B>,
    layer_norm3: LayerNorm<B>,
    dropout: Dropout,
}

impl<B: Backend> DecoderLayer<B> {
    pub fn new(dims: LayerDims, device: &B::Device) -> Result<Self> {
        Ok(Self {
            self_attention: MultiHeadAttention::new(dims.d_model, dims.n_heads, device)?,
            cross_attention: MultiHeadAttention::new(dims.d_model, dims.n_heads, device)?,
            feed_forward: FeedForward::new(dims, device),
            layer_norm1: LayerNormConfig::new(dims.d_model).init(device),
            layer_norm2: LayerNormConfig::new(dims.d_model).init(device),
            layer_norm3: LayerNormConfig::new(dims.d_model).init(device),
            dropout: DropoutConfig::new(dims.dropout).init(),
        })
    }

    pub fn forward(
        &self,
        x: Tensor<B, 3>,
        memory: Tensor<B, 3>,
        self_bias: &AttentionBias<B>,
        self_exclusion: Option<&Tensor<B, 2, Bool>>,
        cross_exclusion: Option<&Tensor<B, 2, Bool>>,
    ) -> Tensor<B, 3> {
        // 1. causal self-attention
        let normalized1 = self.layer_norm1.forward(x.clone());
        let self_attn_output = self.self_attention.forward(
            normalized1.clone(),
            normalized1.clone(),
            normalized1,
            self_bias,
            self_exclusion,
        );
        let residual1 = x + self.dropout.forward(self_attn_output);

        // 2. cross-attention over the encoder memory
        let normalized2 = self.layer_norm2.forward(residual1.clone());
        let cross_attn_output = self.cross_attention.forward(
            normalized2,
            memory.clone(),
            memory,
            &AttentionBias::None,
            cross_exclusion,
        );
        let residual2 = residual1 + self.dropout.forward(cross_attn_output);

        // 3. feed-forward
        let normalized3 = self.layer_norm3.forward(residual2.clone());
        let ff_output = self.feed_forward.forward(normalized3);

        residual2 + ff_output
    }
}

// ===== Stacks =====

/// N encoder layers, each owning its own parameters, applied in order.
#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    encoder_blocks: Vec<EncoderLayer<B>>,
}

impl<B: Backend> Encoder<B> {
    pub fn new(num_layers: usize, dims: LayerDims, device: &B::Device) -> Result<Self> {
        let mut encoder_blocks = Vec::with_capacity(num_layers);
        for _ in 0..num_layers {
            encoder_blocks.push(EncoderLayer::new(dims, device)?);
        }

        Ok(Self::from_layers(encoder_blocks))
    }

    pub fn from_layers(encoder_blocks: Vec<EncoderLayer<B>>) -> Self {
        Self { encoder_blocks }
    }

    pub fn num_layers(&self) -> usize {
        self.encoder_blocks.len()
    }

    pub fn forward(
        &self,
        mut x: Tensor<B, 3>,
        bias: &AttentionBias<B>,
        key_exclusion: Option<&Tensor<B, 2, Bool>>,
    ) -> Tensor<B, 3> {
        for block in &self.encoder_blocks {
            x = block.forward(x, bias, key_exclusion);
        }

        x
    }
}

/// N decoder layers; every layer attends over the same memory.
#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    decoder_blocks: Vec<DecoderLayer<B>>,
}

impl<B: Backend> Decoder<B> {
    pub fn new(num_layers: usize, dims: LayerDims, device: &B::Device) -> Result<Self> {
        let mut decoder_blocks = Vec::with_capacity(num_layers);
        for _ in 0..num_layers {
            decoder_blocks.push(DecoderLayer::new(dims, device)?);
        }

        Ok(Self::from_layers(decoder_blocks))
    }

    pub fn from_layers(decoder_blocks: Vec<DecoderLayer<B>>) -> Self {
        Self { decoder_blocks }
    }

    pub fn num_layers(&self) -> usize {
        self.decoder_blocks.len()
    }

    pub fn forward(
        &self,
        mut x: Tensor<B, 3>,
        memory: Tensor<B, 3>,
        self_bias: &AttentionBias<B>,
        self_exclusion: Option<&Tensor<B, 2, Bool>>,
        cross_exclusion: Option<&Tensor<B, 2, Bool>>,
    ) -> Tensor<B, 3> {
        for block in &self.decoder_blocks {
            x = block.forward(
                x,
                memory.clone(),
                self_bias,
                self_exclusion,
                cross_exclusion,
            );
        }

        x
    }
}
