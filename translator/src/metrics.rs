use crate::config::TrainingConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Per-epoch loss curves collected during training.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TrainingMetrics {
    pub train_loss: Vec<f32>,
    /// Empty when no validation corpus was given
    pub valid_loss: Vec<f32>,
    pub epochs: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
}

impl TrainingMetrics {
    pub fn final_train_loss(&self) -> Option<f32> {
        self.train_loss.last().copied()
    }

    pub fn final_valid_loss(&self) -> Option<f32> {
        self.valid_loss.last().copied()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ModelSummary {
    pub d_model: usize,
    pub n_heads: usize,
    pub n_encoder_layers: usize,
    pub n_decoder_layers: usize,
    pub d_ff: usize,
    pub src_vocab_size: usize,
    pub tgt_vocab_size: usize,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MetricsFile {
    pub model: ModelSummary,
    pub training: TrainingMetrics,
    pub trained_at: String,
    pub crate_version: String,
}

/// Writes `metrics.json` into `save_dir`.
pub fn save_metrics(
    save_dir: &Path,
    config: &TrainingConfig,
    training: &TrainingMetrics,
) -> Result<()> {
    fs::create_dir_all(save_dir)?;

    let model = &config.model;
    let metrics_file = MetricsFile {
        model: ModelSummary {
            d_model: model.d_model,
            n_heads: model.n_heads,
            n_encoder_layers: model.n_encoder_layers,
            n_decoder_layers: model.n_decoder_layers,
            d_ff: model.d_ff,
            src_vocab_size: model.src_vocab_size,
            tgt_vocab_size: model.tgt_vocab_size,
        },
        training: training.clone(),
        trained_at: chrono::Local::now().to_rfc3339(),
        crate_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let path = save_dir.join("metrics.json");
    fs::write(&path, serde_json::to_string_pretty(&metrics_file)?)?;
    tracing::info!(path = %path.display(), "saved metrics");

    Ok(())
}
