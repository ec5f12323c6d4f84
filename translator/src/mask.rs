use crate::attention::AttentionBias;
use burn::prelude::*;
use burn::tensor::TensorData;

/// Row-major n×n values: 0 where key ≤ query, -inf where the key lies ahead.
pub fn causal_bias_values(n: usize) -> Vec<f32> {
    (0..n)
        .flat_map(|query| {
            (0..n).map(move |key| if key <= query { 0.0 } else { f32::NEG_INFINITY })
        })
        .collect()
}

/// Subsequent-token bias for a target of length `n`.
pub fn causal_bias<B: Backend>(n: usize, device: &B::Device) -> Tensor<B, 2> {
    Tensor::from_data(TensorData::new(causal_bias_values(n), [n, n]), device)
}

/// tokens: [seq_len, batch] → [batch, seq_len], true exactly where the token is `pad_id`.
pub fn key_exclusion<B: Backend>(tokens: Tensor<B, 2, Int>, pad_id: usize) -> Tensor<B, 2, Bool> {
    tokens.swap_dims(0, 1).equal_elem(pad_id as i64)
}

/// Every mask one teacher-forced forward pass needs.
#[derive(Clone, Debug)]
pub struct Seq2SeqMasks<B: Backend> {
    pub tgt_bias: AttentionBias<B>,
    pub src_key_exclusion: Option<Tensor<B, 2, Bool>>,
    pub tgt_key_exclusion: Option<Tensor<B, 2, Bool>>,
    pub memory_key_exclusion: Option<Tensor<B, 2, Bool>>,
}

impl<B: Backend> Seq2SeqMasks<B> {
    /// src: [src_len, batch], tgt: [tgt_len, batch]
    pub fn new(src: &Tensor<B, 2, Int>, tgt: &Tensor<B, 2, Int>, pad_id: usize) -> Self {
        let [tgt_len, _] = tgt.dims();
        let device = tgt.device();

        let src_key_exclusion = key_exclusion(src.clone(), pad_id);
        let tgt_key_exclusion = key_exclusion(tgt.clone(), pad_id);

        Self {
            tgt_bias: AttentionBias::Additive(causal_bias(tgt_len, &device)),
            src_key_exclusion: Some(src_key_exclusion.clone()),
            tgt_key_exclusion: Some(tgt_key_exclusion),
            memory_key_exclusion: Some(src_key_exclusion),
        }
    }

    /// Causal bias only; for batches known to carry no padding.
    pub fn causal_only(tgt_len: usize, device: &B::Device) -> Self {
        Self {
            tgt_bias: AttentionBias::Additive(causal_bias(tgt_len, device)),
            src_key_exclusion: None,
            tgt_key_exclusion: None,
            memory_key_exclusion: None,
        }
    }
}
