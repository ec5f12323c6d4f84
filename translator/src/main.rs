#![recursion_limit = "256"]

use anyhow::{bail, Context, Result};
use burn::backend::ndarray::NdArray;
use burn::backend::wgpu::{Wgpu, WgpuDevice};
use burn::backend::Autodiff;
use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use translator::config::TrainingConfig;
use translator::metrics::save_metrics;
use translator::translation_checkpoint::save_model;
use translator::translation_data::Corpus;
use translator::translation_inference::{run_translation_inference, translate};
use translator::translation_model::Seq2SeqConfig;
use translator::translation_training::train;

/// Transformer encoder-decoder sentence translator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train on a TSV parallel corpus (source<TAB>target per line)
    Train(TrainArgs),
    /// Translate one sentence with a saved checkpoint
    Translate(TranslateArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    #[arg(long)]
    train_data: PathBuf,

    #[arg(long)]
    valid_data: Option<PathBuf>,

    /// Directory receiving model.bin, config.json and metrics.json
    #[arg(long)]
    save: Option<PathBuf>,

    /// Sentence to translate once training finishes
    #[arg(long)]
    predict: Option<String>,

    /// wgpu or ndarray
    #[arg(long, default_value = "wgpu")]
    backend: String,

    #[arg(long, default_value_t = 18)]
    epochs: usize,

    #[arg(long, default_value_t = 128)]
    batch_size: usize,

    #[arg(long, default_value_t = 1.0e-4)]
    learning_rate: f64,

    #[arg(long, default_value_t = 512)]
    d_model: usize,

    #[arg(long, default_value_t = 8)]
    n_heads: usize,

    #[arg(long, default_value_t = 512)]
    d_ff: usize,

    #[arg(long, default_value_t = 3)]
    layers: usize,

    #[arg(long, default_value_t = 0.1)]
    dropout: f64,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Pairs longer than this (sentinels included) are dropped from the corpus
    #[arg(long, default_value_t = 128)]
    max_len: usize,
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Checkpoint directory written by `train --save`
    #[arg(long)]
    load: PathBuf,

    /// Training corpus the checkpoint was built from (vocabularies are rebuilt from it)
    #[arg(long)]
    data: PathBuf,

    #[arg(long)]
    text: String,

    /// wgpu, ndarray or auto
    #[arg(long, default_value = "wgpu")]
    backend: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translator=info".parse()?),
        )
        .init();

    let start_time = Instant::now();
    let cli = Cli::parse();

    match cli.command {
        Command::Train(args) => match args.backend.as_str() {
            "wgpu" => run_training::<Autodiff<Wgpu>>(&args, WgpuDevice::default())?,
            "ndarray" => run_training::<Autodiff<NdArray>>(&args, Default::default())?,
            other => bail!("unsupported training backend: {other}"),
        },
        Command::Translate(args) => {
            let translation =
                run_translation_inference(&args.backend, &args.load, &args.data, &args.text)
                    .with_context(|| format!("failed to translate with {}", args.load.display()))?;
            println!("{} → {}", args.text, translation);
        }
    }

    tracing::info!(seconds = start_time.elapsed().as_secs_f64(), "done");
    Ok(())
}

fn run_training<B: AutodiffBackend>(args: &TrainArgs, device: B::Device) -> Result<()> {
    let corpus = Corpus::load(
        &args.train_data,
        args.valid_data.as_deref(),
        args.max_len,
        args.max_len,
    )
    .context("failed to prepare corpus")?;

    let model_config = Seq2SeqConfig::new(corpus.src_vocab.len(), corpus.tgt_vocab.len())
        .with_d_model(args.d_model)
        .with_n_heads(args.n_heads)
        .with_d_ff(args.d_ff)
        .with_n_encoder_layers(args.layers)
        .with_n_decoder_layers(args.layers)
        .with_dropout(args.dropout);

    let config = TrainingConfig::new(model_config)
        .with_epochs(args.epochs)
        .with_batch_size(args.batch_size)
        .with_learning_rate(args.learning_rate)
        .with_seed(args.seed)
        .with_max_src_len(args.max_len)
        .with_max_tgt_len(args.max_len);

    B::seed(config.seed);
    let model = config.model.init::<B>(&device)?;

    let (model, metrics) = train(
        model,
        &config,
        &corpus.train,
        corpus.valid.as_ref(),
        &device,
    )?;

    tracing::info!(
        train_loss = ?metrics.final_train_loss(),
        valid_loss = ?metrics.final_valid_loss(),
        "training finished"
    );

    if let Some(save_dir) = &args.save {
        save_model(&model, &config, save_dir)?;
        save_metrics(save_dir, &config, &metrics)?;
    }

    if let Some(text) = &args.predict {
        // inference runs on the inner backend so dropout stays off
        let model = model.valid();
        let translation = translate(&model, &corpus.src_vocab, &corpus.tgt_vocab, text, &device)?;
        println!("{} → {}", text, translation);
    }

    Ok(())
}
