use crate::error::{Result, TranslatorError};
use burn::nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig};
use burn::prelude::*;
use burn::tensor::TensorData;

// ===== Token embedding =====

/// Embedding lookup scaled by `sqrt(d_model)`.
#[derive(Module, Debug)]
pub struct TokenEmbedding<B: Backend> {
    pub(crate) embedding: Embedding<B>,
    d_model: usize,
}

impl<B: Backend> TokenEmbedding<B> {
    pub fn new(vocab_size: usize, d_model: usize, device: &B::Device) -> Self {
        let embedding = EmbeddingConfig::new(vocab_size, d_model).init(device);

        Self { embedding, d_model }
    }

    /// tokens: [batch, seq_len] → [batch, seq_len, d_model]
    pub fn forward(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let scale = (self.d_model as f64).sqrt();
        self.embedding.forward(tokens) * scale
    }

    pub fn vocab_size(&self) -> usize {
        self.embedding.weight.dims()[0]
    }
}

// ===== Sinusoidal positional encoding =====

/// Fixed sin/cos position signal added to embeddings, followed by dropout.
///
/// The table is computed once at construction and holds no learned
/// parameters, so it is rebuilt rather than restored when loading a record.
#[derive(Module, Debug)]
pub struct PositionalEncoding<B: Backend> {
    table: Tensor<B, 2>,
    dropout: Dropout,
    max_len: usize,
}

impl<B: Backend> PositionalEncoding<B> {
    pub fn new(d_model: usize, max_len: usize, dropout: f64, device: &B::Device) -> Self {
        let values = sinusoid_table(d_model, max_len);
        let table = Tensor::<B, 2>::from_data(TensorData::new(values, [max_len, d_model]), device);
        let dropout = DropoutConfig::new(dropout).init();

        Self {
            table,
            dropout,
            max_len,
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// The full [max_len, d_model] table.
    pub fn table(&self) -> Tensor<B, 2> {
        self.table.clone()
    }

    /// x: [batch, seq_len, d_model]. Fails when seq_len exceeds the table.
    pub fn forward(&self, x: Tensor<B, 3>) -> Result<Tensor<B, 3>> {
        let [_, seq_len, d_model] = x.dims();
        if seq_len > self.max_len {
            return Err(TranslatorError::SequenceTooLong {
                len: seq_len,
                max_len: self.max_len,
            });
        }

        let positions = self
            .table
            .clone()
            .slice([0..seq_len, 0..d_model])
            .unsqueeze::<3>();

        Ok(self.dropout.forward(x + positions))
    }
}

/// Row-major [max_len, d_model] table: even columns sin, odd columns cos,
/// both at angle pos / 10000^(2k / d_model) with k = column / 2.
pub fn sinusoid_table(d_model: usize, max_len: usize) -> Vec<f32> {
    let mut values = Vec::with_capacity(max_len * d_model);

    for pos in 0..max_len {
        for col in 0..d_model {
            let pair = (col / 2) as f64;
            let angle = pos as f64 / 10000_f64.powf(2.0 * pair / d_model as f64);
            let value = if col % 2 == 0 { angle.sin() } else { angle.cos() };
            values.push(value as f32);
        }
    }

    values
}
