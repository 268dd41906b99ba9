// ============================================================
// Layer 6 - Vocabulary Store
// ============================================================
// Persists the frozen Vocabulary as a Hugging Face word-level
// tokenizer file, so the table is readable by any tokenizers
// consumer as well as by this crate.
//
//   models/vocab.json
//     model.type       = "WordLevel"
//     model.vocab      = { "<s>": 0, "</s>": 1, "UNK": 2, ... }
//     model.unk_token  = "UNK"
//     pre_tokenizer    = WhitespaceSplit (no normalisation, so
//                        sentinels and casing survive unchanged)
//
// Written once, right after the training corpus freezes the
// vocabulary. Loaded before any model is built, since every
// embedding and output layer is sized by it.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use crate::domain::vocabulary::{Vocabulary, UNK_TOKEN};

const VOCAB_FILE: &str = "vocab.json";

pub struct VocabularyStore {
    dir: PathBuf,
}

impl VocabularyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(VOCAB_FILE)
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    pub fn save(&self, vocab: &Vocabulary) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let table: serde_json::Map<String, serde_json::Value> = vocab
            .entries()
            .map(|(word, id)| (word.to_string(), serde_json::json!(id)))
            .collect();

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": { "type": "WhitespaceSplit" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": table,
                "unk_token": UNK_TOKEN
            }
        });

        let path = self.path();
        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write vocabulary to '{}'", path.display()))?;

        tracing::info!("Saved vocabulary of {} words to '{}'", vocab.len(), path.display());
        Ok(())
    }

    /// Reload a saved vocabulary. The result is frozen.
    pub fn load(&self) -> Result<Vocabulary> {
        let tokenizer = self.load_tokenizer()?;
        let vocab = Vocabulary::from_entries(tokenizer.get_vocab(true))
            .with_context(|| format!("Invalid vocabulary in '{}'", self.path().display()))?;

        tracing::info!("Loaded vocabulary of {} words", vocab.len());
        Ok(vocab)
    }

    pub fn load_tokenizer(&self) -> Result<Tokenizer> {
        load_tokenizer_file(&self.path())
    }
}

fn load_tokenizer_file(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path).map_err(|e| {
        anyhow!(
            "Cannot load vocabulary from '{}': {}. Have you run 'train' first?",
            path.display(),
            e
        )
    })
}
