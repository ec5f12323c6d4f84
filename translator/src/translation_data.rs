use crate::config::{BOS_ID, EOS_ID};
use crate::error::{Result, TranslatorError};
use crate::translation_vocabulary::Vocabulary;
use burn::prelude::*;
use burn::tensor::TensorData;
use std::fs;
use std::path::Path;

/// One encoded sentence pair; both sides carry `<bos>` … `<eos>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentencePair {
    pub source: Vec<usize>,
    pub target: Vec<usize>,
}

/// Splits `source<TAB>target` lines, skipping blanks, `#` comments and malformed lines.
pub fn parse_parallel_corpus(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() != 2 || parts[0].trim().is_empty() || parts[1].trim().is_empty() {
            tracing::warn!(line = line_no + 1, "skipping malformed corpus line");
            continue;
        }

        pairs.push((parts[0].trim().to_string(), parts[1].trim().to_string()));
    }

    pairs
}

/// Reads a TSV parallel corpus from disk.
pub fn read_parallel_corpus(path: &Path) -> Result<Vec<(String, String)>> {
    let content = fs::read_to_string(path)?;
    let pairs = parse_parallel_corpus(&content);
    if pairs.is_empty() {
        return Err(TranslatorError::EmptyCorpus(path.display().to_string()));
    }

    tracing::info!(path = %path.display(), pairs = pairs.len(), "loaded parallel corpus");
    Ok(pairs)
}

pub struct TranslationData {
    pub samples: Vec<SentencePair>,
}

impl TranslationData {
    /// Encodes raw pairs, dropping those longer than the given caps (sentinels included).
    pub fn from_pairs(
        pairs: &[(String, String)],
        src_vocab: &Vocabulary,
        tgt_vocab: &Vocabulary,
        max_src_len: usize,
        max_tgt_len: usize,
    ) -> Self {
        let mut samples = Vec::with_capacity(pairs.len());
        let mut skipped = 0;

        for (source_text, target_text) in pairs {
            let source = src_vocab.encode_with_sentinels(source_text);
            let target = tgt_vocab.encode_with_sentinels(target_text);

            if source.len() > max_src_len || target.len() > max_tgt_len {
                skipped += 1;
                continue;
            }

            samples.push(SentencePair { source, target });
        }

        if skipped > 0 {
            tracing::warn!(skipped, "sentence pairs exceeded length caps");
        }

        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Consecutive batches in corpus order; the last may be smaller.
    pub fn batches(
        &self,
        batch_size: usize,
        pad_id: usize,
        src_vocab_size: usize,
        tgt_vocab_size: usize,
    ) -> Result<Vec<Batch>> {
        if batch_size == 0 {
            return Err(TranslatorError::ZeroDimension("batch_size"));
        }

        self.samples
            .chunks(batch_size)
            .map(|chunk| Batch::collate(chunk, pad_id, src_vocab_size, tgt_vocab_size))
            .collect()
    }
}

/// Vocabularies built from the training split plus the encoded splits.
pub struct Corpus {
    pub src_vocab: Vocabulary,
    pub tgt_vocab: Vocabulary,
    pub train: TranslationData,
    pub valid: Option<TranslationData>,
}

impl Corpus {
    pub fn load(
        train_path: &Path,
        valid_path: Option<&Path>,
        max_src_len: usize,
        max_tgt_len: usize,
    ) -> Result<Self> {
        let train_pairs = read_parallel_corpus(train_path)?;
        let (src_vocab, tgt_vocab) = build_vocabularies(&train_pairs);

        let train = TranslationData::from_pairs(
            &train_pairs,
            &src_vocab,
            &tgt_vocab,
            max_src_len,
            max_tgt_len,
        );
        if train.is_empty() {
            return Err(TranslatorError::EmptyCorpus(train_path.display().to_string()));
        }

        let valid = match valid_path {
            Some(path) => {
                let pairs = read_parallel_corpus(path)?;
                Some(TranslationData::from_pairs(
                    &pairs,
                    &src_vocab,
                    &tgt_vocab,
                    max_src_len,
                    max_tgt_len,
                ))
            }
            None => None,
        };
        let valid = valid.filter(|data| {
            if data.is_empty() {
                tracing::warn!("validation split is empty after filtering; skipping validation");
            }
            !data.is_empty()
        });

        tracing::info!(
            src_vocab = src_vocab.len(),
            tgt_vocab = tgt_vocab.len(),
            train = train.len(),
            "prepared corpus"
        );

        Ok(Self {
            src_vocab,
            tgt_vocab,
            train,
            valid,
        })
    }
}

/// (source, target) vocabularies over every token of the given pairs.
pub fn build_vocabularies(pairs: &[(String, String)]) -> (Vocabulary, Vocabulary) {
    let src_vocab = Vocabulary::from_sentences(pairs.iter().map(|(s, _)| s.as_str()), 1);
    let tgt_vocab = Vocabulary::from_sentences(pairs.iter().map(|(_, t)| t.as_str()), 1);
    (src_vocab, tgt_vocab)
}

// ===== Batch collation =====

/// Padded ids in sequence-major order: element (pos, row) sits at `pos * batch_size + row`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub src: Vec<usize>,
    pub tgt: Vec<usize>,
    pub src_len: usize,
    pub tgt_len: usize,
    pub batch_size: usize,
}

impl Batch {
    pub fn collate(
        samples: &[SentencePair],
        pad_id: usize,
        src_vocab_size: usize,
        tgt_vocab_size: usize,
    ) -> Result<Self> {
        if samples.is_empty() {
            return Err(TranslatorError::MalformedBatch("empty batch".to_string()));
        }

        for sample in samples {
            if sample.source.is_empty() {
                return Err(TranslatorError::MalformedBatch(
                    "empty source sequence".to_string(),
                ));
            }
            if sample.target.len() < 2
                || sample.target.first() != Some(&BOS_ID)
                || sample.target.last() != Some(&EOS_ID)
            {
                return Err(TranslatorError::MalformedBatch(format!(
                    "target {:?} is not wrapped in <bos> … <eos>",
                    sample.target
                )));
            }
            check_ids(&sample.source, src_vocab_size)?;
            check_ids(&sample.target, tgt_vocab_size)?;
        }

        let batch_size = samples.len();
        let src_len = samples.iter().map(|s| s.source.len()).max().unwrap_or(0);
        let tgt_len = samples.iter().map(|s| s.target.len()).max().unwrap_or(0);

        let src = pad_sequence_major(samples.iter().map(|s| &s.source), src_len, batch_size, pad_id);
        let tgt = pad_sequence_major(samples.iter().map(|s| &s.target), tgt_len, batch_size, pad_id);

        Ok(Self {
            src,
            tgt,
            src_len,
            tgt_len,
            batch_size,
        })
    }

    /// Rejects batches whose buffers disagree with their declared shape, or
    /// whose targets are too short to hold `<bos>` and `<eos>`.
    pub fn check_shape(&self) -> Result<()> {
        if self.batch_size == 0 || self.src_len == 0 {
            return Err(TranslatorError::MalformedBatch(format!(
                "source batch has shape [{}, {}]",
                self.src_len, self.batch_size
            )));
        }
        if self.tgt_len < 2 {
            return Err(TranslatorError::MalformedBatch(format!(
                "target length {} cannot hold <bos> and <eos>",
                self.tgt_len
            )));
        }
        if self.src.len() != self.src_len * self.batch_size
            || self.tgt.len() != self.tgt_len * self.batch_size
        {
            return Err(TranslatorError::MalformedBatch(format!(
                "buffers of {} and {} ids do not fit [{}, {}] and [{}, {}]",
                self.src.len(),
                self.tgt.len(),
                self.src_len,
                self.batch_size,
                self.tgt_len,
                self.batch_size
            )));
        }

        Ok(())
    }

    /// (src [src_len, batch], tgt [tgt_len, batch])
    pub fn to_tensors<B: Backend>(
        &self,
        device: &B::Device,
    ) -> (Tensor<B, 2, Int>, Tensor<B, 2, Int>) {
        let src = ids_to_tensor(&self.src, [self.src_len, self.batch_size], device);
        let tgt = ids_to_tensor(&self.tgt, [self.tgt_len, self.batch_size], device);
        (src, tgt)
    }
}

fn check_ids(ids: &[usize], vocab_size: usize) -> Result<()> {
    match ids.iter().find(|&&id| id >= vocab_size) {
        Some(&id) => Err(TranslatorError::TokenOutOfVocabulary { id, vocab_size }),
        None => Ok(()),
    }
}

fn pad_sequence_major<'a, I>(rows: I, seq_len: usize, batch_size: usize, pad_id: usize) -> Vec<usize>
where
    I: Iterator<Item = &'a Vec<usize>>,
{
    let mut flat = vec![pad_id; seq_len * batch_size];
    for (row, ids) in rows.enumerate() {
        for (pos, &id) in ids.iter().enumerate() {
            flat[pos * batch_size + row] = id;
        }
    }
    flat
}

/// Uploads ids laid out row-major for `shape`.
pub fn ids_to_tensor<B: Backend>(
    ids: &[usize],
    shape: [usize; 2],
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let values: Vec<i64> = ids.iter().map(|&id| id as i64).collect();
    Tensor::from_data(TensorData::new(values, shape), device)
}
