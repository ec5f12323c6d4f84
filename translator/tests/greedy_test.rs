use burn::backend::NdArray;
use burn::prelude::*;
use std::sync::{Mutex, MutexGuard};

use translator::config::{BOS_ID, EOS_ID};
use translator::greedy_decoder::{GreedyDecoder, StopReason};
use translator::translation_data::{build_vocabularies, parse_parallel_corpus};
use translator::translation_inference::{translate, translate_ids};
use translator::translation_model::{Seq2SeqConfig, Seq2SeqModel};
use translator::TranslatorError;

type TestBackend = NdArray;

static RNG_LOCK: Mutex<()> = Mutex::new(());

fn rng_lock() -> MutexGuard<'static, ()> {
    RNG_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn model(src_vocab: usize, tgt_vocab: usize, max_len: usize) -> Seq2SeqModel<TestBackend> {
    Seq2SeqConfig::new(src_vocab, tgt_vocab)
        .with_d_model(8)
        .with_n_heads(2)
        .with_d_ff(16)
        .with_n_encoder_layers(1)
        .with_n_decoder_layers(1)
        .with_dropout(0.0)
        .with_max_len(max_len)
        .init(&Default::default())
        .unwrap()
}

fn source(ids: &[i32]) -> Tensor<TestBackend, 2, Int> {
    Tensor::<TestBackend, 1, Int>::from_data(ids, &Default::default()).reshape([ids.len(), 1])
}

#[test]
fn single_token_vocabulary_stops_after_one_step() {
    let _guard = rng_lock();
    // the only target id doubles as both sentinels
    let model = model(6, 1, 16);
    let decoder = GreedyDecoder::new(10).with_sentinels(0, 0);

    let output = decoder.decode(&model, source(&[2, 4, 3]), None).unwrap();

    assert_eq!(output.tokens, vec![0, 0]);
    assert_eq!(output.steps, 1);
    assert_eq!(output.stop_reason, StopReason::EndToken);
}

#[test]
fn output_respects_length_limit() {
    let _guard = rng_lock();
    let model = model(6, 6, 32);

    let output = GreedyDecoder::new(4)
        .decode(&model, source(&[2, 4, 5, 3]), None)
        .unwrap();

    assert_eq!(output.tokens[0], BOS_ID);
    assert!(output.tokens.len() <= 4);
    assert_eq!(output.steps, output.tokens.len() - 1);
    match output.stop_reason {
        StopReason::EndToken => assert_eq!(output.tokens.last(), Some(&EOS_ID)),
        StopReason::MaxLength => {
            assert_eq!(output.tokens.len(), 4);
            assert!(!output.tokens[1..].contains(&EOS_ID));
        }
    }
}

#[test]
fn limit_of_one_returns_only_the_begin_token() {
    let _guard = rng_lock();
    let model = model(6, 6, 32);

    let output = GreedyDecoder::new(1)
        .decode(&model, source(&[2, 3]), None)
        .unwrap();

    assert_eq!(output.tokens, vec![BOS_ID]);
    assert_eq!(output.steps, 0);
    assert!(output.is_truncated());
}

#[test]
fn positional_table_caps_the_limit() {
    let _guard = rng_lock();
    let model = model(6, 6, 3);

    let output = GreedyDecoder::new(50)
        .decode(&model, source(&[2, 3]), None)
        .unwrap();

    assert!(output.tokens.len() <= 3);
}

#[test]
fn decoding_is_deterministic() {
    let _guard = rng_lock();
    let model = model(6, 6, 32);
    let decoder = GreedyDecoder::new(8);

    let first = decoder.decode(&model, source(&[2, 4, 5, 3]), None).unwrap();
    let second = decoder.decode(&model, source(&[2, 4, 5, 3]), None).unwrap();

    assert_eq!(first, second);
}

#[test]
fn batched_source_is_rejected() {
    let _guard = rng_lock();
    let model = model(6, 6, 16);
    let src = Tensor::<TestBackend, 1, Int>::from_data([2, 2, 3, 3].as_slice(), &Default::default())
        .reshape([2, 2]);

    assert!(matches!(
        GreedyDecoder::new(5).decode(&model, src, None),
        Err(TranslatorError::MalformedBatch(_))
    ));
}

#[test]
fn sentinels_outside_target_vocabulary_are_rejected() {
    let _guard = rng_lock();
    let model = model(6, 3, 16);

    // EOS_ID (3) does not fit a vocabulary of three
    assert!(matches!(
        GreedyDecoder::new(5).decode(&model, source(&[2, 3]), None),
        Err(TranslatorError::TokenOutOfVocabulary { id: 3, vocab_size: 3 })
    ));
}

#[test]
fn translate_returns_text_without_sentinels() {
    let _guard = rng_lock();
    let pairs = parse_parallel_corpus("ein hund\ta dog\nzwei katzen\ttwo cats\n");
    let (src_vocab, tgt_vocab) = build_vocabularies(&pairs);
    let model = model(src_vocab.len(), tgt_vocab.len(), 32);
    let device = Default::default();

    let output = translate_ids(&model, &src_vocab, "ein hund", &device).unwrap();
    // four source ids (with sentinels) plus slack
    assert!(output.tokens.len() <= 4 + 5);

    let text = translate(&model, &src_vocab, &tgt_vocab, "ein hund", &device).unwrap();
    assert!(!text.contains("<bos>"));
    assert!(!text.contains("<eos>"));
    assert!(!text.contains("<pad>"));
}
