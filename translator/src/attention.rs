use crate::error::{Result, TranslatorError};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;

/// Score written into every disallowed (query, key) slot before softmax.
///
/// Finite on purpose: a query whose keys are all disallowed ends up with
/// identical scores and therefore uniform attention instead of NaN.
pub const MASKED_SCORE: f32 = -1.0e9;

/// Additive bias over (query, key) positions.
///
/// Entries at or below [`MASKED_SCORE`] (typically `-inf`) forbid the pair;
/// other entries are added to the scores as-is.
#[derive(Clone, Debug)]
pub enum AttentionBias<B: Backend> {
    None,
    /// [query_len, key_len], broadcast over batch and heads
    Additive(Tensor<B, 2>),
}

/// Bias and exclusion folded into the [batch, query, key] score shape.
struct ScoreMask<B: Backend> {
    additive: Option<Tensor<B, 3>>,
    disallowed: Option<Tensor<B, 3, Bool>>,
}

impl<B: Backend> ScoreMask<B> {
    fn new(
        bias: &AttentionBias<B>,
        key_exclusion: Option<&Tensor<B, 2, Bool>>,
        shape: [usize; 3],
    ) -> Self {
        let mut additive = None;
        let mut disallowed: Option<Tensor<B, 3, Bool>> = None;

        if let AttentionBias::Additive(bias) = bias {
            let blocked = bias.clone().lower_equal_elem(MASKED_SCORE);
            // -inf never enters the arithmetic; the fill below restores exact masking
            additive = Some(
                bias.clone()
                    .clamp_min(MASKED_SCORE)
                    .unsqueeze::<3>()
                    .expand(shape),
            );
            disallowed = Some(blocked.unsqueeze::<3>().expand(shape));
        }

        if let Some(exclusion) = key_exclusion {
            // [batch, key] → [batch, 1, key] → every query of that row
            let excluded = exclusion.clone().unsqueeze_dim::<3>(1).expand(shape);
            disallowed = Some(match disallowed {
                Some(blocked) => (blocked.int() + excluded.int()).greater_elem(0),
                None => excluded,
            });
        }

        Self {
            additive,
            disallowed,
        }
    }

    fn apply(&self, scores: Tensor<B, 3>) -> Tensor<B, 3> {
        let scores = match &self.additive {
            Some(additive) => scores + additive.clone(),
            None => scores,
        };

        match &self.disallowed {
            Some(disallowed) => scores.mask_fill(disallowed.clone(), MASKED_SCORE),
            None => scores,
        }
    }
}

// ===== Multi-Head Attention =====

/// Scaled dot-product attention over `n_heads` independent projections.
///
/// Shared by encoder self-attention, decoder self-attention and decoder
/// cross-attention; only the inputs differ.
#[derive(Module, Debug)]
pub struct MultiHeadAttention<B: Backend> {
    w_q: Vec<Linear<B>>,
    w_k: Vec<Linear<B>>,
    w_v: Vec<Linear<B>>,
    w_o: Linear<B>,
    d_head: usize,
}

impl<B: Backend> MultiHeadAttention<B> {
    pub fn new(d_model: usize, n_heads: usize, device: &B::Device) -> Result<Self> {
        if n_heads == 0 {
            return Err(TranslatorError::ZeroDimension("n_heads"));
        }
        if d_model % n_heads != 0 {
            return Err(TranslatorError::HeadsNotDivisible { d_model, n_heads });
        }
        let d_head = d_model / n_heads;

        let mut w_q = Vec::with_capacity(n_heads);
        let mut w_k = Vec::with_capacity(n_heads);
        let mut w_v = Vec::with_capacity(n_heads);

        for _ in 0..n_heads {
            w_q.push(LinearConfig::new(d_model, d_head).init(device));
            w_k.push(LinearConfig::new(d_model, d_head).init(device));
            w_v.push(LinearConfig::new(d_model, d_head).init(device));
        }

        let w_o = LinearConfig::new(d_model, d_model).init(device);

        Ok(Self {
            w_q,
            w_k,
            w_v,
            w_o,
            d_head,
        })
    }

    pub fn n_heads(&self) -> usize {
        self.w_q.len()
    }

    /// query: [batch, q_len, d_model], key/value: [batch, k_len, d_model],
    /// key_exclusion: [batch, k_len] (true = padding). Returns [batch, q_len, d_model].
    pub fn forward(
        &self,
        query: Tensor<B, 3>,
        key: Tensor<B, 3>,
        value: Tensor<B, 3>,
        bias: &AttentionBias<B>,
        key_exclusion: Option<&Tensor<B, 2, Bool>>,
    ) -> Tensor<B, 3> {
        let [batch_size, q_len, _] = query.dims();
        let [_, k_len, _] = key.dims();
        let mask = ScoreMask::new(bias, key_exclusion, [batch_size, q_len, k_len]);

        let head_outputs = (0..self.n_heads())
            .map(|head_idx| {
                self.compute_head(query.clone(), key.clone(), value.clone(), head_idx, &mask)
            })
            .collect();

        let concat = Tensor::cat(head_outputs, 2);
        self.w_o.forward(concat)
    }

    fn compute_head(
        &self,
        query: Tensor<B, 3>,
        key: Tensor<B, 3>,
        value: Tensor<B, 3>,
        head_idx: usize,
        mask: &ScoreMask<B>,
    ) -> Tensor<B, 3> {
        let q = self.w_q[head_idx].forward(query);
        let k = self.w_k[head_idx].forward(key);
        let v = self.w_v[head_idx].forward(value);

        // Q × K^T / sqrt(d_head): [batch, q_len, k_len]
        let scores = q.matmul(k.transpose());
        let scores = scores / (self.d_head as f64).sqrt();
        let scores = mask.apply(scores);

        let attention_weights = burn::tensor::activation::softmax(scores, 2);
        attention_weights.matmul(v)
    }
}
