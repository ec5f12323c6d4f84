use crate::config::TrainingConfig;
use crate::error::{Result, TranslatorError};
use crate::translation_model::Seq2SeqModel;
use burn::prelude::*;
use burn::record::{BinFileRecorder, FullPrecisionSettings, Recorder};
use std::fs;
use std::path::Path;

const MODEL_FILE: &str = "model";
const CONFIG_FILE: &str = "config.json";

/// Writes `model.bin` and `config.json` into `save_dir`.
pub fn save_model<B: Backend>(
    model: &Seq2SeqModel<B>,
    config: &TrainingConfig,
    save_dir: &Path,
) -> Result<()> {
    fs::create_dir_all(save_dir)?;

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(save_dir.join(MODEL_FILE), &recorder)
        .map_err(|e| TranslatorError::Checkpoint(format!("failed to save model: {e:?}")))?;

    config.save(save_dir.join(CONFIG_FILE))?;

    tracing::info!(dir = %save_dir.display(), "saved checkpoint");
    Ok(())
}

pub fn load_config(load_dir: &Path) -> Result<TrainingConfig> {
    TrainingConfig::load(load_dir.join(CONFIG_FILE)).map_err(|e| {
        TranslatorError::Config(format!(
            "failed to read {}: {e:?}",
            load_dir.join(CONFIG_FILE).display()
        ))
    })
}

/// Rebuilds the architecture from `config.json`, then restores the weights.
pub fn load_model<B: Backend>(
    load_dir: &Path,
    device: &B::Device,
) -> Result<(Seq2SeqModel<B>, TrainingConfig)> {
    let config = load_config(load_dir)?;
    let model = config.model.init::<B>(device)?;

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    let record = recorder
        .load(load_dir.join(MODEL_FILE), device)
        .map_err(|e| TranslatorError::Checkpoint(format!("failed to load model: {e:?}")))?;

    tracing::info!(dir = %load_dir.display(), "loaded checkpoint");
    Ok((model.load_record(record), config))
}
