// ============================================================
// Layer 3 - Vocabulary
// ============================================================
// Bidirectional word <-> id table with a one-way lifecycle:
//
//   mutable  → every unseen word gets the next free id
//   frozen   → no new ids; unseen words map to UNK
//
// The model allocates its embedding and output tensors from
// `len()`, so the vocabulary has to be frozen before any model
// is built and must never grow afterwards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub type TokenId = u32;

pub const START_TOKEN: &str = "<s>";
pub const END_TOKEN: &str = "</s>";
pub const UNK_TOKEN: &str = "UNK";

pub const START_ID: TokenId = 0;
pub const END_ID: TokenId = 1;
pub const UNK_ID: TokenId = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    words: Vec<String>,
    ids: HashMap<String, TokenId>,
    frozen: bool,
}

impl Vocabulary {
    /// A fresh, mutable vocabulary holding only the reserved entries.
    pub fn new() -> Self {
        let mut vocab = Self {
            words: Vec::new(),
            ids: HashMap::new(),
            frozen: false,
        };
        for reserved in [START_TOKEN, END_TOKEN, UNK_TOKEN] {
            vocab.insert(reserved);
        }
        vocab
    }

    /// Rebuild a frozen vocabulary from persisted (word, id) pairs.
    /// Ids must be dense `0..n` and the reserved entries must sit at
    /// their fixed ids.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, TokenId)>) -> anyhow::Result<Self> {
        let mut pairs: Vec<(String, TokenId)> = entries.into_iter().collect();
        pairs.sort_by_key(|(_, id)| *id);

        let mut vocab = Self {
            words: Vec::with_capacity(pairs.len()),
            ids: HashMap::with_capacity(pairs.len()),
            frozen: true,
        };
        for (expected, (word, id)) in pairs.into_iter().enumerate() {
            if id as usize != expected {
                anyhow::bail!("vocabulary ids are not dense: expected {expected}, found {id} for '{word}'");
            }
            vocab.ids.insert(word.clone(), id);
            vocab.words.push(word);
        }

        for (word, id) in [(START_TOKEN, START_ID), (END_TOKEN, END_ID), (UNK_TOKEN, UNK_ID)] {
            if vocab.ids.get(word) != Some(&id) {
                anyhow::bail!("reserved token '{word}' is not mapped to id {id}");
            }
        }
        Ok(vocab)
    }

    fn insert(&mut self, word: &str) -> TokenId {
        let id = self.words.len() as TokenId;
        self.words.push(word.to_string());
        self.ids.insert(word.to_string(), id);
        id
    }

    /// Resolve a word, allocating a new id while the vocabulary is
    /// still mutable. Once frozen this behaves like [`Self::lookup`].
    pub fn convert(&mut self, word: &str) -> TokenId {
        if let Some(&id) = self.ids.get(word) {
            return id;
        }
        if self.frozen {
            return UNK_ID;
        }
        self.insert(word)
    }

    /// Resolve a word without ever growing the table.
    pub fn lookup(&self, word: &str) -> TokenId {
        self.ids.get(word).copied().unwrap_or(UNK_ID)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.ids.contains_key(word)
    }

    pub fn word(&self, id: TokenId) -> Option<&str> {
        self.words.get(id as usize).map(String::as_str)
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// (word, id) pairs in id order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, TokenId)> {
        self.words
            .iter()
            .enumerate()
            .map(|(id, word)| (word.as_str(), id as TokenId))
    }

    /// Render token ids back to a space-joined string.
    pub fn render(&self, ids: &[TokenId]) -> String {
        ids.iter()
            .map(|&id| self.word(id).unwrap_or(UNK_TOKEN))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}
