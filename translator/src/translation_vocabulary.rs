use crate::config::{BOS_ID, EOS_ID, PAD_ID, UNK_ID};
use std::collections::HashMap;

pub const UNK_TOKEN: &str = "<unk>";
pub const PAD_TOKEN: &str = "<pad>";
pub const BOS_TOKEN: &str = "<bos>";
pub const EOS_TOKEN: &str = "<eos>";

/// Word-level vocabulary built from one side of a parallel corpus.
///
/// Ids 0..4 are always `<unk>`, `<pad>`, `<bos>`, `<eos>`; the remaining
/// tokens follow by descending frequency, ties broken lexically.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    token_to_id: HashMap<String, usize>,
    id_to_token: Vec<String>,
}

impl Vocabulary {
    /// Collects every token occurring at least `min_freq` times.
    pub fn from_sentences<'a, I>(sentences: I, min_freq: usize) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for sentence in sentences {
            for token in tokenize(sentence) {
                *counts.entry(token).or_insert(0) += 1;
            }
        }

        let specials = [UNK_TOKEN, PAD_TOKEN, BOS_TOKEN, EOS_TOKEN];
        let mut tokens: Vec<(String, usize)> = counts
            .into_iter()
            .filter(|(token, count)| *count >= min_freq && !specials.contains(&token.as_str()))
            .collect();
        tokens.sort_by(|(a, a_count), (b, b_count)| b_count.cmp(a_count).then_with(|| a.cmp(b)));

        let id_to_token: Vec<String> = specials
            .iter()
            .map(|s| s.to_string())
            .chain(tokens.into_iter().map(|(token, _)| token))
            .collect();

        let token_to_id = id_to_token
            .iter()
            .enumerate()
            .map(|(id, token)| (token.clone(), id))
            .collect();

        Self {
            token_to_id,
            id_to_token,
        }
    }

    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_token.is_empty()
    }

    pub fn token(&self, id: usize) -> Option<&str> {
        self.id_to_token.get(id).map(String::as_str)
    }

    pub fn id(&self, token: &str) -> usize {
        self.token_to_id.get(token).copied().unwrap_or(UNK_ID)
    }

    /// Tokens to ids, unknown words mapped to `<unk>`. No sentinels added.
    pub fn encode(&self, text: &str) -> Vec<usize> {
        tokenize(text).iter().map(|token| self.id(token)).collect()
    }

    /// `[bos, tokens.., eos]`
    pub fn encode_with_sentinels(&self, text: &str) -> Vec<usize> {
        let mut ids = Vec::new();
        ids.push(BOS_ID);
        ids.extend(self.encode(text));
        ids.push(EOS_ID);
        ids
    }

    /// Ids back to text, dropping `<bos>`, `<eos>`, `<pad>` and out-of-range ids.
    pub fn decode(&self, ids: &[usize]) -> String {
        ids.iter()
            .filter(|&&id| id != BOS_ID && id != EOS_ID && id != PAD_ID)
            .filter_map(|&id| self.token(id))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Lowercased whitespace split with sentence punctuation detached.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace(',', " ,")
        .replace('.', " .")
        .replace('!', " !")
        .replace('?', " ?")
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}
