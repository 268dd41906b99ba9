// ============================================================
// Layer 2 - EvaluateUseCase
// ============================================================
// Scores a held-out corpus with the best saved parameters:
//
//   Step 1: Reopen the trained run (config + vocabulary)
//   Step 2: Load the test corpus against the frozen vocabulary
//   Step 3: Rebuild the learner and restore its parameters
//   Step 4: Per-document losses
//   Step 5: Write per-document perplexities to
//           <test file>.<strategy>.result
//
// Test documents are NOT segmented: every document is scored with
// its full context, however long.

use anyhow::{Context, Result};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use crate::application::train_use_case::TrainedRun;
use crate::data::loader::CorpusLoader;
use crate::domain::traits::{DocumentLearner, DocumentSource};
use crate::ml::{default_device, learner::build_learner};

#[derive(Debug, Clone)]
pub struct EvaluateConfig {
    pub test_path:      String,
    pub checkpoint_dir: String,
    /// Falls back to the delimiter the model was trained with.
    pub delimiter:      Option<char>,
}

/// Corpus-level result of an evaluation.
#[derive(Debug, Clone)]
pub struct EvaluationSummary {
    pub documents:   usize,
    pub loss:        f64,
    pub words:       usize,
    pub result_path: PathBuf,
}

impl EvaluationSummary {
    pub fn perplexity(&self) -> Option<f64> {
        (self.words > 0).then(|| (self.loss / self.words as f64).exp())
    }
}

pub struct EvaluateUseCase {
    config: EvaluateConfig,
}

impl EvaluateUseCase {
    pub fn new(config: EvaluateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<EvaluationSummary> {
        let cfg = &self.config;

        // ── Step 1: Reopen the trained run ───────────────────────────────────
        let TrainedRun { config: trained, mut vocab, checkpoints } =
            TrainedRun::open(&cfg.checkpoint_dir)?;
        let delimiter = cfg.delimiter.unwrap_or(trained.delimiter);

        // ── Step 2: Test corpus ──────────────────────────────────────────────
        let test = CorpusLoader::new(&cfg.test_path, delimiter).load_all(&mut vocab, false)?;

        // ── Step 3: Learner with restored parameters ─────────────────────────
        let device  = default_device();
        let learner = build_learner(
            trained.strategy,
            &trained.model_config(),
            &trained.optim_config(),
            checkpoints,
            true,
            &device,
        )?;

        // ── Step 4: Score ────────────────────────────────────────────────────
        let losses = learner.evaluate(&test)?;

        // ── Step 5: Write results ────────────────────────────────────────────
        let result_path = PathBuf::from(format!("{}.{}.result", cfg.test_path, trained.strategy));
        let file = File::create(&result_path)
            .with_context(|| format!("Cannot create '{}'", result_path.display()))?;
        let mut out = BufWriter::new(file);

        let mut total_loss  = 0.0;
        let mut total_words = 0;
        for (index, (doc, loss)) in test.iter().zip(&losses).enumerate() {
            let words = doc.target_count();
            if words == 0 {
                tracing::warn!("Test document {} has no words; skipped", index + 1);
                continue;
            }
            writeln!(out, " PPL = {:.4}", (loss / words as f64).exp())?;
            total_loss  += loss;
            total_words += words;
        }
        out.flush()?;

        let summary = EvaluationSummary {
            documents: test.len(),
            loss: total_loss,
            words: total_words,
            result_path,
        };
        match summary.perplexity() {
            Some(ppl) => tracing::info!(
                "TEST E = {:.4} PPL = {:.4} over {} documents",
                total_loss / total_words as f64,
                ppl,
                summary.documents
            ),
            None => tracing::warn!("Test corpus has no words to score"),
        }
        Ok(summary)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::checkpoint::CheckpointManager;
    use crate::application::train_use_case::TrainConfig;

    #[test]
    fn test_summary_perplexity() {
        let s = EvaluationSummary { documents: 1, loss: 0.0, words: 4, result_path: PathBuf::new() };
        assert_eq!(s.perplexity(), Some(1.0));
        let empty = EvaluationSummary { words: 0, ..s };
        assert!(empty.perplexity().is_none());
    }

    #[test]
    fn test_untrained_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = EvaluateConfig {
            test_path:      tmp.path().join("test.txt").to_string_lossy().into_owned(),
            checkpoint_dir: tmp.path().to_string_lossy().into_owned(),
            delimiter:      None,
        };
        assert!(EvaluateUseCase::new(cfg).execute().is_err());
    }

    #[test]
    fn test_missing_parameters_are_an_error() {
        // Config and vocabulary present, parameter blob absent.
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_string_lossy().into_owned();

        let mut vocab = crate::domain::vocabulary::Vocabulary::new();
        vocab.convert("a");
        vocab.freeze();
        crate::infra::vocab_store::VocabularyStore::new(&dir).save(&vocab).unwrap();
        let trained = TrainConfig { vocab_size: vocab.len(), ..Default::default() };
        CheckpointManager::new(&dir).unwrap().save_config(&trained).unwrap();

        let test = tmp.path().join("test.txt");
        std::fs::write(&test, "a a\n").unwrap();
        let cfg = EvaluateConfig {
            test_path:      test.to_string_lossy().into_owned(),
            checkpoint_dir: dir,
            delimiter:      None,
        };
        assert!(EvaluateUseCase::new(cfg).execute().is_err());
    }

    #[test]
    fn test_scores_every_document_with_saved_parameters() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_string_lossy().into_owned();

        let mut vocab = crate::domain::vocabulary::Vocabulary::new();
        for w in ["a", "b", "c"] {
            vocab.convert(w);
        }
        vocab.freeze();
        crate::infra::vocab_store::VocabularyStore::new(&dir).save(&vocab).unwrap();

        let trained = TrainConfig {
            strategy: crate::domain::strategy::ContextStrategy::Flat,
            layers: 1,
            input_dim: 3,
            hidden_dim: 4,
            align_dim: 3,
            vocab_size: vocab.len(),
            ..Default::default()
        };
        let checkpoints = CheckpointManager::new(&dir).unwrap();
        checkpoints.save_config(&trained).unwrap();
        build_learner(
            trained.strategy,
            &trained.model_config(),
            &trained.optim_config(),
            checkpoints,
            false,
            &default_device(),
        )
        .unwrap()
        .checkpoint()
        .unwrap();

        let test = tmp.path().join("test.txt");
        std::fs::write(&test, "a b\nc\n=\nb zebra\n").unwrap();
        let cfg = EvaluateConfig {
            test_path:      test.to_string_lossy().into_owned(),
            checkpoint_dir: dir,
            delimiter:      None,
        };
        let summary = EvaluateUseCase::new(cfg).execute().unwrap();

        assert_eq!(summary.documents, 2);
        // (2 + 1) + 1 content words plus one </s> per sentence
        assert_eq!(summary.words, 3 + 2 + 3);
        assert!(summary.perplexity().unwrap() > 1.0);

        let lines = std::fs::read_to_string(&summary.result_path).unwrap();
        assert!(summary.result_path.to_string_lossy().ends_with("test.txt.flat.result"));
        assert_eq!(lines.lines().count(), 2);
        assert!(lines.lines().all(|l| l.starts_with(" PPL = ")));
    }
}
