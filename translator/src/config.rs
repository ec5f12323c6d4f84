use crate::translation_model::Seq2SeqConfig;
use burn::prelude::*;

// Reserved token ids shared by the source and target vocabularies
pub const UNK_ID: usize = 0;
pub const PAD_ID: usize = 1;
pub const BOS_ID: usize = 2;
pub const EOS_ID: usize = 3;

/// Extra target tokens allowed beyond the source length during greedy decoding
pub const DECODE_LENGTH_SLACK: usize = 5;

/// Training hyperparameters, saved as `config.json` beside the checkpoint.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    pub model: Seq2SeqConfig,
    #[config(default = 18)]
    pub epochs: usize,
    #[config(default = 128)]
    pub batch_size: usize,
    #[config(default = 1.0e-4)]
    pub learning_rate: f64,
    #[config(default = 0.9)]
    pub beta_1: f32,
    #[config(default = 0.98)]
    pub beta_2: f32,
    #[config(default = 1.0e-9)]
    pub epsilon: f32,
    #[config(default = 0)]
    pub seed: u64,
    /// Sentence pairs whose source side (with sentinels) exceeds this are skipped
    #[config(default = 128)]
    pub max_src_len: usize,
    #[config(default = 128)]
    pub max_tgt_len: usize,
}
