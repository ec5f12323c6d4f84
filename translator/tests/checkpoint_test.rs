use burn::backend::ndarray::NdArray;
use burn::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use translator::config::{TrainingConfig, PAD_ID};
use translator::mask::Seq2SeqMasks;
use translator::metrics::{save_metrics, MetricsFile, TrainingMetrics};
use translator::translation_checkpoint::{load_config, load_model, save_model};
use translator::translation_model::{Seq2SeqConfig, Seq2SeqModel};

type TestBackend = NdArray;

static RNG_LOCK: Mutex<()> = Mutex::new(());

fn rng_lock() -> MutexGuard<'static, ()> {
    RNG_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fresh scratch directory under tests/
fn create_test_dir(name: &str) -> PathBuf {
    let test_dir = PathBuf::from("tests").join(name);
    if test_dir.exists() {
        fs::remove_dir_all(&test_dir).ok();
    }
    fs::create_dir_all(&test_dir).unwrap();
    test_dir
}

/// Removes a scratch directory if present
fn cleanup_test_dir(test_dir: &PathBuf) {
    if test_dir.exists() {
        fs::remove_dir_all(test_dir).ok();
    }
}

fn small_config() -> TrainingConfig {
    let model = Seq2SeqConfig::new(7, 9)
        .with_d_model(8)
        .with_n_heads(2)
        .with_d_ff(16)
        .with_n_encoder_layers(1)
        .with_n_decoder_layers(2)
        .with_dropout(0.0)
        .with_max_len(16);
    TrainingConfig::new(model).with_epochs(2).with_batch_size(4)
}

fn tokens(ids: &[i32], shape: [usize; 2]) -> Tensor<TestBackend, 2, Int> {
    Tensor::<TestBackend, 1, Int>::from_data(ids, &Default::default()).reshape(shape)
}

fn logits(model: &Seq2SeqModel<TestBackend>) -> Vec<f32> {
    let src = tokens(&[2, 2, 4, 5, 6, 3, 3, 1], [4, 2]);
    let tgt = tokens(&[2, 2, 7, 8, 3, 3], [3, 2]);
    let masks = Seq2SeqMasks::new(&src, &tgt, PAD_ID);
    model
        .forward(src, tgt, &masks)
        .unwrap()
        .into_data()
        .to_vec::<f32>()
        .unwrap()
}

#[test]
fn test_checkpoint_roundtrip_ndarray() {
    let test_dir = create_test_dir("temp_checkpoint_roundtrip");
    let config = small_config();
    let device = Default::default();

    let model: Seq2SeqModel<TestBackend> = {
        let _guard = rng_lock();
        config.model.init(&device).unwrap()
    };
    let output_before = logits(&model);

    save_model(&model, &config, &test_dir).expect("failed to save model");

    // loading starts from fresh random weights that the record overwrites
    let (loaded_model, loaded_config) = {
        let _guard = rng_lock();
        load_model::<TestBackend>(&test_dir, &device).expect("failed to load model")
    };
    let output_after = logits(&loaded_model);

    let max_diff = output_before
        .iter()
        .zip(&output_after)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0_f32, f32::max);
    assert!(max_diff < 1e-5, "outputs differ after reload: {max_diff}");

    assert_eq!(loaded_config.model.src_vocab_size, 7);
    assert_eq!(loaded_config.model.tgt_vocab_size, 9);
    assert_eq!(loaded_config.model.n_decoder_layers, 2);
    assert_eq!(loaded_config.epochs, 2);

    cleanup_test_dir(&test_dir);
}

#[test]
fn test_checkpoint_files_created() {
    let test_dir = create_test_dir("temp_checkpoint_files");
    let config = small_config();

    let model: Seq2SeqModel<TestBackend> = {
        let _guard = rng_lock();
        config.model.init(&Default::default()).unwrap()
    };
    save_model(&model, &config, &test_dir).expect("failed to save model");

    let metrics = TrainingMetrics {
        train_loss: vec![2.5, 1.75],
        valid_loss: vec![2.25, 2.0],
        epochs: 2,
        learning_rate: config.learning_rate,
        batch_size: config.batch_size,
    };
    save_metrics(&test_dir, &config, &metrics).expect("failed to save metrics");

    assert!(test_dir.join("model.bin").exists(), "model.bin was not written");
    assert!(test_dir.join("config.json").exists(), "config.json was not written");

    let metrics_json = fs::read_to_string(test_dir.join("metrics.json")).unwrap();
    let parsed: MetricsFile = serde_json::from_str(&metrics_json).unwrap();
    assert_eq!(parsed.training, metrics);
    assert_eq!(parsed.model.d_model, 8);
    assert_eq!(parsed.model.src_vocab_size, 7);
    assert_eq!(parsed.training.final_train_loss(), Some(1.75));
    assert_eq!(parsed.training.final_valid_loss(), Some(2.0));

    let reloaded = load_config(&test_dir).unwrap();
    assert_eq!(reloaded.batch_size, 4);

    cleanup_test_dir(&test_dir);
}

#[test]
fn test_load_from_missing_directory_fails() {
    let missing = PathBuf::from("tests/temp_checkpoint_missing");
    cleanup_test_dir(&missing);

    assert!(load_model::<TestBackend>(&missing, &Default::default()).is_err());
}
