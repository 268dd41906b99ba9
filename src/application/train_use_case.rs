// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Load training corpus, build vocabulary   (Layer 4 - data)
//   Step 2: Load dev corpus against frozen vocab     (Layer 4 - data)
//   Step 3: Save vocabulary                          (Layer 6 - infra)
//   Step 4: Segment long training documents          (Layer 4 - data)
//   Step 5: Save config                              (Layer 6 - infra)
//   Step 6: Build learner for the chosen strategy    (Layer 5 - ml)
//   Step 7: Run the online training loop             (Layer 5 - ml)
//
// With `resume`, Step 1 reuses the saved vocabulary instead of
// building one, and Step 6 restores the saved parameters. The saved
// config must describe the same architecture as the current one.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{bail, Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::{
    loader::{CorpusLoader, DEFAULT_DELIMITER},
    segmenter::Segmenter,
};
use crate::domain::{
    document::Corpus, strategy::ContextStrategy, traits::DocumentSource, vocabulary::Vocabulary,
};
use crate::infra::{
    checkpoint::CheckpointManager, metrics::MetricsLogger, vocab_store::VocabularyStore,
};
use crate::ml::{
    config::{ModelConfig, OptimConfig},
    default_device,
    learner::build_learner,
    trainer::{Trainer, TrainerConfig, DEFAULT_DEV_EVERY_REPORTS, DEFAULT_REPORT_EVERY},
};

/// Default upper bound on sentences per training document.
pub const DEFAULT_SEGMENT_THRESHOLD: usize = 5;

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything a run needs, saved next to the parameters so `evaluate`
// and `sample` can rebuild the exact same model later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub train_path:        String,
    pub dev_path:          String,
    pub checkpoint_dir:    String,
    pub strategy:          ContextStrategy,
    pub layers:            usize,
    pub input_dim:         usize,
    pub hidden_dim:        usize,
    pub align_dim:         usize,
    pub lr:                f64,
    pub lr_decay:          f64,
    pub weight_decay:      f32,
    pub report_every:      usize,
    pub dev_every_reports: usize,
    pub segment_threshold: usize,
    pub delimiter:         char,
    pub seed:              u64,
    pub resume:            bool,
    /// Filled in once the vocabulary is frozen.
    pub vocab_size:        usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_path:        "data/train.txt".to_string(),
            dev_path:          "data/dev.txt".to_string(),
            checkpoint_dir:    "models".to_string(),
            strategy:          ContextStrategy::Hidden,
            layers:            2,
            input_dim:         16,
            hidden_dim:        48,
            align_dim:         32,
            lr:                0.1,
            lr_decay:          0.0,
            weight_decay:      1e-6,
            report_every:      DEFAULT_REPORT_EVERY,
            dev_every_reports: DEFAULT_DEV_EVERY_REPORTS,
            segment_threshold: DEFAULT_SEGMENT_THRESHOLD,
            delimiter:         DEFAULT_DELIMITER,
            seed:              1,
            resume:            false,
            vocab_size:        0,
        }
    }
}

impl TrainConfig {
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig::new(self.vocab_size)
            .with_layers(self.layers)
            .with_input_dim(self.input_dim)
            .with_hidden_dim(self.hidden_dim)
            .with_align_dim(self.align_dim)
    }

    pub fn optim_config(&self) -> OptimConfig {
        OptimConfig::new()
            .with_lr(self.lr)
            .with_lr_decay(self.lr_decay)
            .with_weight_decay(self.weight_decay)
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            report_every:      self.report_every,
            dev_every_reports: self.dev_every_reports,
        }
    }

    /// Fails when `saved` describes a different model than `self`.
    fn ensure_compatible(&self, saved: &TrainConfig) -> Result<()> {
        if saved.strategy != self.strategy {
            bail!(
                "Checkpoint in '{}' was trained with strategy '{}', not '{}'",
                self.checkpoint_dir, saved.strategy, self.strategy
            );
        }
        let ours   = (self.layers, self.input_dim, self.hidden_dim, self.align_dim);
        let theirs = (saved.layers, saved.input_dim, saved.hidden_dim, saved.align_dim);
        if ours != theirs {
            bail!(
                "Checkpoint dimensions (layers, input, hidden, align) = {theirs:?} \
                 do not match the requested {ours:?}"
            );
        }
        Ok(())
    }
}

// ─── Trained Run ──────────────────────────────────────────────────────────────
// A finished checkpoint directory reopened for evaluation or sampling.
pub struct TrainedRun {
    pub config:      TrainConfig,
    pub vocab:       Vocabulary,
    pub checkpoints: CheckpointManager,
}

impl TrainedRun {
    /// Loads the saved config and vocabulary, failing if they disagree
    /// on the vocabulary size.
    pub fn open(checkpoint_dir: &str) -> Result<Self> {
        let checkpoints = CheckpointManager::new(checkpoint_dir)?;
        let config: TrainConfig = checkpoints
            .load_config()
            .with_context(|| format!("No trained model in '{checkpoint_dir}'"))?;
        let vocab = VocabularyStore::new(checkpoint_dir).load()?;

        if vocab.len() != config.vocab_size {
            bail!(
                "Vocabulary in '{}' has {} words but the model was built for {}",
                checkpoint_dir,
                vocab.len(),
                config.vocab_size
            );
        }
        Ok(Self { config, vocab, checkpoints })
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Runs until interrupted; only returns on error.
    pub fn execute(&self) -> Result<()> {
        let mut cfg     = self.config.clone();
        let checkpoints = CheckpointManager::new(&cfg.checkpoint_dir)?;
        let vocab_store = VocabularyStore::new(&cfg.checkpoint_dir);

        // ── Step 1: Training corpus + vocabulary ─────────────────────────────
        let train_loader = CorpusLoader::new(&cfg.train_path, cfg.delimiter);
        let (mut vocab, training) = if cfg.resume {
            let saved: TrainConfig = checkpoints
                .load_config()
                .context("Cannot resume: no saved config")?;
            cfg.ensure_compatible(&saved)?;

            let mut vocab = vocab_store.load()?;
            if vocab.len() != saved.vocab_size {
                bail!(
                    "Saved vocabulary has {} words but the checkpoint expects {}",
                    vocab.len(),
                    saved.vocab_size
                );
            }
            let training = train_loader.load_all(&mut vocab, false)?;
            (vocab, training)
        } else {
            let mut vocab = Vocabulary::new();
            let training  = train_loader.load_all(&mut vocab, true)?;
            vocab.freeze();
            (vocab, training)
        };
        tracing::info!("Vocabulary size: {}", vocab.len());

        // ── Step 2: Dev corpus ───────────────────────────────────────────────
        // Never grows the vocabulary; unseen words map to UNK.
        let dev: Corpus = CorpusLoader::new(&cfg.dev_path, cfg.delimiter)
            .load_all(&mut vocab, false)?;

        // ── Step 3: Save vocabulary ──────────────────────────────────────────
        if !cfg.resume {
            vocab_store.save(&vocab)?;
        }

        // ── Step 4: Segment training documents ───────────────────────────────
        if cfg.segment_threshold == 0 {
            bail!("segment_threshold must be at least 1");
        }
        let segmenter = Segmenter::new(cfg.segment_threshold);
        let before    = training.len();
        let training  = segmenter.segment(training);
        tracing::info!(
            "Segmented training corpus at {} sentences: {} -> {} documents",
            segmenter.max_sentences(),
            before,
            training.len()
        );

        // ── Step 5: Save config ──────────────────────────────────────────────
        cfg.vocab_size = vocab.len();
        checkpoints.save_config(&cfg)?;

        // ── Step 6: Build learner ────────────────────────────────────────────
        let device  = default_device();
        let learner = build_learner(
            cfg.strategy,
            &cfg.model_config(),
            &cfg.optim_config(),
            checkpoints,
            cfg.resume,
            &device,
        )?;

        // ── Step 7: Train ────────────────────────────────────────────────────
        let rng     = StdRng::seed_from_u64(cfg.seed);
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;
        let mut trainer = Trainer::new(learner, training, dev, cfg.trainer_config(), rng)?
            .with_metrics(metrics);
        trainer.run()
    }
}
