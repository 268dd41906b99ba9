// ============================================================
// Layer 6 - Checkpoint Manager
// ============================================================
// Saves and restores parameter sets using Burn's CompactRecorder,
// plus the run configuration as JSON.
//
// Layout of a checkpoint directory:
//
//   models/
//     model.mpk           ← single-set strategies
//     model_sent.mpk      ← hierarchical: sentence level
//     model_word.mpk      ← hierarchical: word level
//     train_config.json   ← strategy + dimensions + vocab size
//     vocab.json          ← see vocab_store.rs
//     metrics.csv         ← see metrics.rs
//
// Parameter blobs are only written when the dev loss improves,
// so whatever is on disk is always the best model seen so far.
//
// Blob names carry no dots: the recorder replaces everything after
// the last dot with its own extension.

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::PathBuf,
};

pub const MODEL_FILE: &str = "model";
pub const SENTENCE_MODEL_FILE: &str = "model_sent";
pub const WORD_MODEL_FILE: &str = "model_word";

const CONFIG_FILE: &str = "train_config.json";

/// Manages parameter blobs and the saved config in one directory.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Serialise every parameter of `module` to `{dir}/{name}.mpk`.
    pub fn save_module<B: Backend, M: Module<B>>(&self, name: &str, module: &M) -> Result<()> {
        let path = self.dir.join(name);
        let recorder = CompactRecorder::new();
        <CompactRecorder as Recorder<B>>::record(&recorder, module.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save parameters to '{}'", path.display()))?;

        tracing::debug!("Saved parameters '{}'", path.display());
        Ok(())
    }

    /// Restore parameters saved under `name` into `module`, which must
    /// have the same architecture.
    pub fn load_module<B: Backend, M: Module<B>>(
        &self,
        name:   &str,
        module: M,
        device: &B::Device,
    ) -> Result<M> {
        let path = self.dir.join(name);
        let recorder = CompactRecorder::new();
        let record = <CompactRecorder as Recorder<B>>::load(&recorder, path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load parameters '{}'. Have you trained a model into this directory?",
                    path.display()
                )
            })?;

        tracing::info!("Loaded parameters from '{}'", path.display());
        Ok(module.load_record(record))
    }

    pub fn save_config<T: Serialize>(&self, cfg: &T) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config<T: DeserializeOwned>(&self) -> Result<T> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure you have run 'train' first.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config in '{}'", path.display()))
    }
}
