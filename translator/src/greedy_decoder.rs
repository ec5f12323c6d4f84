use crate::attention::AttentionBias;
use crate::config::{BOS_ID, EOS_ID};
use crate::error::{Result, TranslatorError};
use crate::mask::causal_bias;
use crate::translation_data::ids_to_tensor;
use crate::translation_model::Seq2SeqModel;
use burn::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The end sentinel was emitted
    EndToken,
    /// The length limit was reached first; the output lacks an end sentinel
    MaxLength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    AwaitingFirstToken,
    Generating,
    Terminated(StopReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreedyOutput {
    /// Generated ids including the leading begin sentinel
    pub tokens: Vec<usize>,
    /// Number of decode steps taken
    pub steps: usize,
    pub stop_reason: StopReason,
}

impl GreedyOutput {
    pub fn is_truncated(&self) -> bool {
        self.stop_reason == StopReason::MaxLength
    }
}

/// Autoregressive argmax decoding against a fixed encoder memory.
///
/// Each step feeds the model its own previous output, never a reference.
#[derive(Debug, Clone, Copy)]
pub struct GreedyDecoder {
    max_len: usize,
    bos_id: usize,
    eos_id: usize,
}

impl GreedyDecoder {
    /// `max_len` bounds the output length, begin sentinel included.
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            bos_id: BOS_ID,
            eos_id: EOS_ID,
        }
    }

    pub fn with_sentinels(mut self, bos_id: usize, eos_id: usize) -> Self {
        self.bos_id = bos_id;
        self.eos_id = eos_id;
        self
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// src: [src_len, 1]. The limit is additionally capped by the model's positional table.
    pub fn decode<B: Backend>(
        &self,
        model: &Seq2SeqModel<B>,
        src: Tensor<B, 2, Int>,
        src_key_exclusion: Option<&Tensor<B, 2, Bool>>,
    ) -> Result<GreedyOutput> {
        let [_, batch_size] = src.dims();
        if batch_size != 1 {
            return Err(TranslatorError::MalformedBatch(format!(
                "greedy decoding expects a single sentence, got batch of {batch_size}"
            )));
        }
        let vocab_size = model.tgt_vocab_size();
        for id in [self.bos_id, self.eos_id] {
            if id >= vocab_size {
                return Err(TranslatorError::TokenOutOfVocabulary { id, vocab_size });
            }
        }

        let device = src.device();
        let memory = model.encode(src, src_key_exclusion)?;
        let max_len = self.max_len.min(model.max_len());

        let mut tokens = vec![self.bos_id];
        let mut steps = 0;
        let mut state = DecodeState::AwaitingFirstToken;

        loop {
            match state {
                DecodeState::Terminated(stop_reason) => {
                    return Ok(GreedyOutput {
                        tokens,
                        steps,
                        stop_reason,
                    });
                }
                DecodeState::AwaitingFirstToken | DecodeState::Generating => {
                    if tokens.len() >= max_len {
                        state = DecodeState::Terminated(StopReason::MaxLength);
                        continue;
                    }

                    let next = self.next_token(
                        model,
                        &tokens,
                        memory.clone(),
                        src_key_exclusion,
                        &device,
                    )?;
                    tokens.push(next);
                    steps += 1;
                    tracing::debug!(step = steps, token = next, "greedy step");

                    state = if next == self.eos_id {
                        DecodeState::Terminated(StopReason::EndToken)
                    } else {
                        DecodeState::Generating
                    };
                }
            }
        }
    }

    fn next_token<B: Backend>(
        &self,
        model: &Seq2SeqModel<B>,
        tokens: &[usize],
        memory: Tensor<B, 3>,
        memory_key_exclusion: Option<&Tensor<B, 2, Bool>>,
        device: &B::Device,
    ) -> Result<usize> {
        let current_len = tokens.len();
        let tgt = ids_to_tensor::<B>(tokens, [current_len, 1], device);
        let bias = AttentionBias::Additive(causal_bias(current_len, device));

        let hidden = model.decode(tgt, memory, &bias, None, memory_key_exclusion)?;
        let [_, _, d_model] = hidden.dims();
        let last = hidden.slice([current_len - 1..current_len, 0..1, 0..d_model]);
        let logits = model.generator(last);

        let scores: Vec<f32> = logits
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| TranslatorError::Readback(format!("{e:?}")))?;

        argmax(&scores).ok_or_else(|| TranslatorError::Readback("no finite logits".to_string()))
    }
}

/// Index of the largest value, lowest index on ties; NaNs are ignored.
pub fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f32)>, (idx, &value)| match best {
            Some((_, best_value)) if value <= best_value => best,
            _ => Some((idx, value)),
        })
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_prefers_lowest_index_on_ties() {
        assert_eq!(argmax(&[0.5, 2.0, 2.0, 1.0]), Some(1));
        assert_eq!(argmax(&[f32::NAN, -1.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }
}
