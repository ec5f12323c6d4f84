use crate::config::{TrainingConfig, PAD_ID};
use crate::error::{Result, TranslatorError};
use crate::mask::Seq2SeqMasks;
use crate::metrics::TrainingMetrics;
use crate::translation_data::{Batch, TranslationData};
use crate::translation_model::Seq2SeqModel;
use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;

/// Teacher-forced training with Adam at a constant learning rate.
pub fn train<B: AutodiffBackend>(
    model: Seq2SeqModel<B>,
    config: &TrainingConfig,
    train_data: &TranslationData,
    valid_data: Option<&TranslationData>,
    device: &B::Device,
) -> Result<(Seq2SeqModel<B>, TrainingMetrics)> {
    if train_data.is_empty() {
        return Err(TranslatorError::EmptyCorpus("training data".to_string()));
    }

    let mut optimizer = AdamConfig::new()
        .with_beta_1(config.beta_1)
        .with_beta_2(config.beta_2)
        .with_epsilon(config.epsilon)
        .init();

    let batches = train_data.batches(
        config.batch_size,
        PAD_ID,
        model.src_vocab_size(),
        model.tgt_vocab_size(),
    )?;

    let mut model = model;
    let mut metrics = TrainingMetrics {
        epochs: config.epochs,
        learning_rate: config.learning_rate,
        batch_size: config.batch_size,
        ..Default::default()
    };

    tracing::info!(
        epochs = config.epochs,
        batches = batches.len(),
        samples = train_data.len(),
        "starting training"
    );

    for epoch in 0..config.epochs {
        let mut total_loss = 0.0;

        for batch in &batches {
            let loss = batch_loss(&model, batch, device)?;
            total_loss += loss.clone().into_scalar().elem::<f32>();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }

        let train_loss = total_loss / batches.len() as f32;
        metrics.train_loss.push(train_loss);

        match valid_data {
            Some(valid_data) => {
                let valid_loss = evaluate(&model.valid(), valid_data, config.batch_size, device)?;
                metrics.valid_loss.push(valid_loss);
                tracing::info!(epoch = epoch + 1, train_loss, valid_loss, "epoch finished");
            }
            None => tracing::info!(epoch = epoch + 1, train_loss, "epoch finished"),
        }
    }

    Ok((model, metrics))
}

/// Mean per-batch loss without gradient tracking.
pub fn evaluate<B: Backend>(
    model: &Seq2SeqModel<B>,
    data: &TranslationData,
    batch_size: usize,
    device: &B::Device,
) -> Result<f32> {
    let batches = data.batches(
        batch_size,
        PAD_ID,
        model.src_vocab_size(),
        model.tgt_vocab_size(),
    )?;
    if batches.is_empty() {
        return Err(TranslatorError::EmptyCorpus("validation data".to_string()));
    }

    let mut total_loss = 0.0;
    for batch in &batches {
        total_loss += batch_loss(model, batch, device)?.into_scalar().elem::<f32>();
    }

    Ok(total_loss / batches.len() as f32)
}

/// Cross-entropy of predicting `tgt[1..]` from `tgt[..len-1]`, padding ignored.
pub fn batch_loss<B: Backend>(
    model: &Seq2SeqModel<B>,
    batch: &Batch,
    device: &B::Device,
) -> Result<Tensor<B, 1>> {
    batch.check_shape()?;
    let (src, tgt) = batch.to_tensors::<B>(device);
    let tgt_len = batch.tgt_len;
    let batch_size = batch.batch_size;

    // decoder input [bos, w1, .., wn], labels [w1, .., wn, eos]
    let tgt_input = tgt.clone().slice([0..tgt_len - 1, 0..batch_size]);
    let tgt_output = tgt.slice([1..tgt_len, 0..batch_size]);

    let masks = Seq2SeqMasks::new(&src, &tgt_input, PAD_ID);
    let logits = model.forward(src, tgt_input, &masks)?;

    let [len, rows, vocab_size] = logits.dims();
    let logits = logits.reshape([len * rows, vocab_size]);
    let targets = tgt_output.reshape([len * rows]);

    let loss = CrossEntropyLossConfig::new()
        .with_pad_tokens(Some(vec![PAD_ID]))
        .init(device)
        .forward(logits, targets);

    Ok(loss)
}
