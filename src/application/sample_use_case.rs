// ============================================================
// Layer 2 - SampleUseCase
// ============================================================
// Generates text from a trained hidden-context model. For every
// document in the context file, the model reads all sentences but
// the last and then writes one new sentence per seed word.
//
// Output: <context file>.hidden.sample
//
//   but the market closed lower
//   so analysts expect a rebound
//   ===
//   ...
//
// Only the hidden strategy is supported.

use anyhow::{bail, Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use crate::application::train_use_case::TrainedRun;
use crate::data::loader::CorpusLoader;
use crate::domain::{strategy::ContextStrategy, traits::DocumentSource};
use crate::infra::checkpoint::MODEL_FILE;
use crate::ml::{
    default_device,
    sampler::{render_continuation, resolve_seeds, Sampler, DEFAULT_MAX_LEN, DEFAULT_SEEDS},
    InnerBackend,
};

/// Written after the continuations of each context document.
pub const DOCUMENT_SEPARATOR: &str = "===";

#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub context_path:   String,
    pub checkpoint_dir: String,
    pub seeds:          Vec<String>,
    pub max_len:        usize,
    pub seed:           u64,
    pub delimiter:      Option<char>,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            context_path:   "data/test.txt".to_string(),
            checkpoint_dir: "models".to_string(),
            seeds:          DEFAULT_SEEDS.iter().map(|s| s.to_string()).collect(),
            max_len:        DEFAULT_MAX_LEN,
            seed:           1,
            delimiter:      None,
        }
    }
}

pub struct SampleUseCase {
    config: SampleConfig,
}

impl SampleUseCase {
    pub fn new(config: SampleConfig) -> Self {
        Self { config }
    }

    /// Returns the path of the written sample file.
    pub fn execute(&self) -> Result<PathBuf> {
        let cfg = &self.config;

        // ── Step 1: Reopen the trained run ───────────────────────────────────
        let TrainedRun { config: trained, mut vocab, checkpoints } =
            TrainedRun::open(&cfg.checkpoint_dir)?;
        if trained.strategy != ContextStrategy::Hidden {
            bail!(
                "Sampling needs a model trained with the hidden strategy, found '{}'",
                trained.strategy
            );
        }

        // ── Step 2: Restore the model on the inference backend ──────────────
        let device = default_device();
        let model  = trained.model_config().init_hidden::<InnerBackend>(&device);
        let model  = checkpoints.load_module::<InnerBackend, _>(MODEL_FILE, model, &device)?;

        // ── Step 3: Context documents and seeds ──────────────────────────────
        let delimiter = cfg.delimiter.unwrap_or(trained.delimiter);
        let contexts  = CorpusLoader::new(&cfg.context_path, delimiter).load_all(&mut vocab, false)?;
        let seeds     = resolve_seeds(&vocab, &cfg.seeds);
        if seeds.is_empty() {
            bail!("No seed words given");
        }

        // ── Step 4: Generate ─────────────────────────────────────────────────
        let sampler  = Sampler::new(&model, seeds, cfg.max_len);
        let mut rng  = StdRng::seed_from_u64(cfg.seed);
        let out_path = PathBuf::from(format!("{}.hidden.sample", cfg.context_path));
        let file = File::create(&out_path)
            .with_context(|| format!("Cannot create '{}'", out_path.display()))?;
        let mut out = BufWriter::new(file);

        for document in &contexts {
            for continuation in sampler.continue_document(document, &mut rng)? {
                writeln!(out, "{}", render_continuation(&vocab, &continuation))?;
            }
            writeln!(out, "{DOCUMENT_SEPARATOR}")?;
        }
        out.flush()?;

        tracing::info!(
            "Wrote continuations for {} documents to '{}'",
            contexts.len(),
            out_path.display()
        );
        Ok(out_path)
    }
}
