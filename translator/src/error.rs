use thiserror::Error;

/// Errors raised by model construction, batch handling and persistence.
#[derive(Debug, Error)]
pub enum TranslatorError {
    #[error("d_model {d_model} is not divisible by n_heads {n_heads}")]
    HeadsNotDivisible { d_model: usize, n_heads: usize },

    #[error("invalid model dimension: {0} must be non-zero")]
    ZeroDimension(&'static str),

    #[error("sequence length {len} exceeds positional encoding capacity {max_len}")]
    SequenceTooLong { len: usize, max_len: usize },

    #[error("token id {id} is outside vocabulary of size {vocab_size}")]
    TokenOutOfVocabulary { id: usize, vocab_size: usize },

    #[error("malformed batch: {0}")]
    MalformedBatch(String),

    #[error("tensor readback failed: {0}")]
    Readback(String),

    #[error("unsupported backend: {0}")]
    UnsupportedBackend(String),

    #[error("corpus {0} produced no usable sentence pairs")]
    EmptyCorpus(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TranslatorError>;
