use crate::config::DECODE_LENGTH_SLACK;
use crate::error::{Result, TranslatorError};
use crate::greedy_decoder::{GreedyDecoder, GreedyOutput};
use crate::translation_checkpoint::load_model;
use crate::translation_data::{build_vocabularies, ids_to_tensor, read_parallel_corpus};
use crate::translation_model::Seq2SeqModel;
use crate::translation_vocabulary::Vocabulary;
use burn::backend::ndarray::NdArray;
use burn::backend::wgpu::{Wgpu, WgpuDevice};
use burn::prelude::*;
use std::path::Path;

/// Greedy translation of one sentence, returned as target ids with sentinels.
pub fn translate_ids<B: Backend>(
    model: &Seq2SeqModel<B>,
    src_vocab: &Vocabulary,
    input_text: &str,
    device: &B::Device,
) -> Result<GreedyOutput> {
    let ids = src_vocab.encode_with_sentinels(input_text);
    let vocab_size = model.src_vocab_size();
    if let Some(&id) = ids.iter().find(|&&id| id >= vocab_size) {
        return Err(TranslatorError::TokenOutOfVocabulary { id, vocab_size });
    }

    let src = ids_to_tensor::<B>(&ids, [ids.len(), 1], device);
    let decoder = GreedyDecoder::new(ids.len() + DECODE_LENGTH_SLACK);

    let output = decoder.decode(model, src, None)?;
    if output.is_truncated() {
        tracing::warn!(max_len = decoder.max_len(), "translation hit the length limit");
    }

    Ok(output)
}

/// Greedy translation of one sentence to detokenized text.
pub fn translate<B: Backend>(
    model: &Seq2SeqModel<B>,
    src_vocab: &Vocabulary,
    tgt_vocab: &Vocabulary,
    input_text: &str,
    device: &B::Device,
) -> Result<String> {
    let output = translate_ids(model, src_vocab, input_text, device)?;
    Ok(tgt_vocab.decode(&output.tokens))
}

fn translate_from_checkpoint<B: Backend>(
    load_dir: &Path,
    src_vocab: &Vocabulary,
    tgt_vocab: &Vocabulary,
    input_text: &str,
    device: &B::Device,
) -> Result<String> {
    let (model, config) = load_model::<B>(load_dir, device)?;

    let expected = (config.model.src_vocab_size, config.model.tgt_vocab_size);
    let rebuilt = (src_vocab.len(), tgt_vocab.len());
    if expected != rebuilt {
        return Err(TranslatorError::Checkpoint(format!(
            "corpus vocabularies {rebuilt:?} do not match checkpoint {expected:?}"
        )));
    }

    translate(&model, src_vocab, tgt_vocab, input_text, device)
}

/// Loads a checkpoint on the requested backend (`wgpu`, `ndarray` or `auto`)
/// and translates `input_text`. Vocabularies are rebuilt from `corpus_path`.
pub fn run_translation_inference(
    backend_name: &str,
    load_dir: &Path,
    corpus_path: &Path,
    input_text: &str,
) -> Result<String> {
    let pairs = read_parallel_corpus(corpus_path)?;
    let (src_vocab, tgt_vocab) = build_vocabularies(&pairs);

    match backend_name {
        "wgpu" => {
            let device = WgpuDevice::default();
            translate_from_checkpoint::<Wgpu>(load_dir, &src_vocab, &tgt_vocab, input_text, &device)
        }
        "ndarray" => {
            let device = Default::default();
            translate_from_checkpoint::<NdArray>(
                load_dir,
                &src_vocab,
                &tgt_vocab,
                input_text,
                &device,
            )
        }
        "auto" => {
            // try WGPU first, fall back to NdArray if the adapter is unavailable
            let wgpu_result = std::panic::catch_unwind(|| {
                let device = WgpuDevice::default();
                translate_from_checkpoint::<Wgpu>(
                    load_dir,
                    &src_vocab,
                    &tgt_vocab,
                    input_text,
                    &device,
                )
            });

            match wgpu_result {
                Ok(Ok(translation)) => {
                    tracing::info!("backend: wgpu (auto)");
                    Ok(translation)
                }
                _ => {
                    tracing::info!("backend: ndarray (wgpu unavailable)");
                    let device = Default::default();
                    translate_from_checkpoint::<NdArray>(
                        load_dir,
                        &src_vocab,
                        &tgt_vocab,
                        input_text,
                        &device,
                    )
                }
            }
        }
        _ => Err(TranslatorError::UnsupportedBackend(backend_name.to_string())),
    }
}
