// ============================================================
// Layer 5 - Training Control Loop
// ============================================================
// Online training, one document per optimiser step, generic over
// any DocumentLearner:
//
//   loop {
//       repeat report_every times:
//           next document from a shuffled order
//           (reshuffle + epoch decay when the order is exhausted,
//            except on the very first pass)
//           train on it, add its loss and target count
//       log  E = loss / words   PPL = exp(E)
//
//       every dev_every_reports windows:
//           score the dev set (no updates)
//           checkpoint when the total dev loss strictly improves
//   }
//
// There is no stopping criterion; the process runs until it is
// killed. Loss and word totals in a window always come from the
// same set of documents.

use anyhow::{bail, Result};
use rand::{seq::SliceRandom, Rng};

use crate::domain::{
    document::{corpus_target_count, Corpus},
    traits::DocumentLearner,
};
use crate::infra::metrics::{MetricsLogger, ReportKind, ReportMetrics};

pub const DEFAULT_REPORT_EVERY: usize = 50;
pub const DEFAULT_DEV_EVERY_REPORTS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainerConfig {
    /// Documents per reporting window.
    pub report_every:      usize,
    /// Reporting windows between dev passes.
    pub dev_every_reports: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            report_every:      DEFAULT_REPORT_EVERY,
            dev_every_reports: DEFAULT_DEV_EVERY_REPORTS,
        }
    }
}

/// Lowest total dev loss seen so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestLoss {
    value: f64,
}

impl BestLoss {
    pub fn new() -> Self {
        Self { value: f64::MAX }
    }

    /// `None` until something has been observed.
    pub fn value(&self) -> Option<f64> {
        (self.value < f64::MAX).then_some(self.value)
    }

    /// Records `loss` and returns true only on a strict improvement.
    pub fn observe(&mut self, loss: f64) -> bool {
        if loss < self.value {
            self.value = loss;
            true
        } else {
            false
        }
    }
}

impl Default for BestLoss {
    fn default() -> Self {
        Self::new()
    }
}

pub struct DevReport {
    pub metrics:  ReportMetrics,
    pub improved: bool,
}

pub struct Trainer<L, R> {
    learner:        L,
    training:       Corpus,
    dev:            Corpus,
    config:         TrainerConfig,
    rng:            R,
    order:          Vec<usize>,
    cursor:         usize,
    first_pass:     bool,
    documents_seen: usize,
    reports:        usize,
    best:           BestLoss,
    metrics:        Option<MetricsLogger>,
}

impl<L: DocumentLearner, R: Rng> Trainer<L, R> {
    pub fn new(
        learner:  L,
        training: Corpus,
        dev:      Corpus,
        config:   TrainerConfig,
        rng:      R,
    ) -> Result<Self> {
        if training.is_empty() {
            bail!("Training corpus is empty: nothing to train on");
        }
        if config.report_every == 0 || config.dev_every_reports == 0 {
            bail!("report_every and dev_every_reports must both be at least 1");
        }
        if dev.is_empty() {
            tracing::warn!("Dev corpus is empty; checkpoints will not track generalisation");
        }

        let order = (0..training.len()).collect::<Vec<_>>();
        Ok(Self {
            cursor: order.len(),
            order,
            learner,
            training,
            dev,
            config,
            rng,
            first_pass: true,
            documents_seen: 0,
            reports: 0,
            best: BestLoss::new(),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: MetricsLogger) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn learner(&self) -> &L {
        &self.learner
    }

    /// Fractional number of passes over the training set so far.
    pub fn epoch_fraction(&self) -> f64 {
        self.documents_seen as f64 / self.training.len() as f64
    }

    fn next_document(&mut self) -> usize {
        if self.cursor == self.order.len() {
            if self.first_pass {
                self.first_pass = false;
            } else {
                self.learner.end_epoch();
            }
            tracing::info!("**SHUFFLE");
            self.order.shuffle(&mut self.rng);
            self.cursor = 0;
        }
        let index = self.order[self.cursor];
        self.cursor += 1;
        self.documents_seen += 1;
        index
    }

    /// Trains on one reporting window, logs it, and runs a dev pass
    /// when one is due.
    pub fn run_report_cycle(&mut self) -> Result<ReportMetrics> {
        let mut loss  = 0.0f64;
        let mut words = 0usize;

        for _ in 0..self.config.report_every {
            let index    = self.next_document();
            let document = &self.training[index];
            let targets  = document.target_count();
            if targets == 0 {
                tracing::warn!("Skipping training document {} with no prediction targets", index);
                continue;
            }
            loss  += self.learner.train_document(document)?;
            words += targets;
        }

        self.reports += 1;
        let report = ReportMetrics {
            kind:   ReportKind::Train,
            report: self.reports,
            epoch:  self.epoch_fraction(),
            loss,
            words,
        };
        match (report.per_word(), report.perplexity()) {
            (Some(e), Some(ppl)) => {
                tracing::info!("[epoch={:.4}] E = {:.4} PPL = {:.4}", report.epoch, e, ppl)
            }
            _ => tracing::warn!("[epoch={:.4}] window had no prediction targets", report.epoch),
        }
        self.record(&report)?;

        if self.reports % self.config.dev_every_reports == 0 {
            self.run_dev_pass()?;
        }
        Ok(report)
    }

    /// Scores the whole dev set without updating parameters and
    /// checkpoints on a strict improvement.
    pub fn run_dev_pass(&mut self) -> Result<DevReport> {
        let losses = self.learner.evaluate(&self.dev)?;

        let mut loss  = 0.0f64;
        let mut words = 0usize;
        for (i, (document, doc_loss)) in self.dev.iter().zip(losses).enumerate() {
            let targets = document.target_count();
            if targets == 0 {
                tracing::warn!("Skipping dev document {} with no prediction targets", i);
                continue;
            }
            loss  += doc_loss;
            words += targets;
        }

        let metrics = ReportMetrics {
            kind:   ReportKind::Dev,
            report: self.reports,
            epoch:  self.epoch_fraction(),
            loss,
            words,
        };

        // A pass with nothing to score never counts as an improvement.
        let improved = words > 0 && self.best.observe(loss);
        if improved {
            self.learner.checkpoint()?;
        }

        let best_ppl = self
            .best
            .value()
            .filter(|_| words > 0)
            .map(|best| (best / words as f64).exp());
        match (metrics.per_word(), metrics.perplexity(), best_ppl) {
            (Some(e), Some(ppl), Some(best)) => tracing::info!(
                "DEV[epoch={:.4}] E = {:.4} PPL = {:.4} ({:.4}){}",
                metrics.epoch, e, ppl, best,
                if improved { " saved" } else { "" },
            ),
            _ => tracing::warn!("DEV[epoch={:.4}] dev set has no prediction targets", metrics.epoch),
        }
        self.record(&metrics)?;

        Ok(DevReport { metrics, improved })
    }

    fn record(&self, metrics: &ReportMetrics) -> Result<()> {
        match &self.metrics {
            Some(logger) => logger.log(metrics),
            None => Ok(()),
        }
    }

    /// Runs reporting cycles until an error occurs or the process is
    /// stopped from outside.
    pub fn run(&mut self) -> Result<()> {
        tracing::info!(
            "Training on {} documents ({} targets), dev set {} documents",
            self.training.len(),
            corpus_target_count(&self.training),
            self.dev.len(),
        );
        loop {
            self.run_report_cycle()?;
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::VecDeque;

    use crate::domain::document::{Document, Sentence};

    /// Trains nothing; records what it was asked to do and replays
    /// a fixed sequence of dev losses.
    #[derive(Default)]
    struct ScriptedLearner {
        trained:     Vec<u32>,
        dev_losses:  VecDeque<f64>,
        epochs:      usize,
    }

    impl DocumentLearner for ScriptedLearner {
        fn train_document(&mut self, document: &Document) -> Result<f64> {
            self.trained.push(document.sentences()[0].content()[0]);
            Ok(document.target_count() as f64)
        }

        fn evaluate(&self, documents: &[Document]) -> Result<Vec<f64>> {
            let total = self.dev_losses.front().copied().unwrap_or(0.0);
            let mut out = vec![0.0; documents.len()];
            if let Some(first) = out.first_mut() {
                *first = total;
            }
            Ok(out)
        }

        fn end_epoch(&mut self) {
            self.epochs += 1;
        }

        fn checkpoint(&self) -> Result<()> {
            Ok(())
        }
    }

    /// Counts checkpoints through interior state the trait's `&self`
    /// signature cannot mutate.
    struct CountingLearner {
        inner: ScriptedLearner,
        saves: std::cell::Cell<usize>,
    }

    impl DocumentLearner for CountingLearner {
        fn train_document(&mut self, document: &Document) -> Result<f64> {
            self.inner.train_document(document)
        }

        fn evaluate(&self, documents: &[Document]) -> Result<Vec<f64>> {
            self.inner.evaluate(documents)
        }

        fn end_epoch(&mut self) {
            self.inner.epochs += 1;
            self.inner.dev_losses.pop_front();
        }

        fn checkpoint(&self) -> Result<()> {
            self.saves.set(self.saves.get() + 1);
            Ok(())
        }
    }

    fn corpus(n: u32) -> Corpus {
        (0..n)
            .map(|i| Document::new(vec![Sentence::from_content([10 + i, 3])]))
            .collect()
    }

    fn config(report_every: usize, dev_every_reports: usize) -> TrainerConfig {
        TrainerConfig { report_every, dev_every_reports }
    }

    #[test]
    fn test_best_loss_only_improves_strictly() {
        let mut best = BestLoss::new();
        assert!(best.value().is_none());
        assert!(best.observe(5.0));
        assert!(!best.observe(5.0));
        assert!(!best.observe(6.0));
        assert!(best.observe(4.5));
        assert_eq!(best.value(), Some(4.5));
    }

    #[test]
    fn test_checkpoint_on_every_strict_improvement_only() {
        // One training doc per window, one window per epoch, one dev
        // pass per window: each epoch boundary advances the script.
        let learner = CountingLearner {
            inner: ScriptedLearner {
                dev_losses: VecDeque::from(vec![5.0, 4.0, 4.0, 6.0, 3.0, 2.0]),
                ..Default::default()
            },
            saves: std::cell::Cell::new(0),
        };
        let rng = StdRng::seed_from_u64(1);
        let mut trainer = Trainer::new(learner, corpus(1), corpus(2), config(1, 1), rng).unwrap();

        let mut improved = Vec::new();
        for _ in 0..6 {
            trainer.run_report_cycle().unwrap();
            improved.push(trainer.best.value().unwrap());
        }
        assert_eq!(improved, vec![5.0, 4.0, 4.0, 4.0, 3.0, 2.0]);
        assert_eq!(trainer.learner().saves.get(), 4);
    }

    #[test]
    fn test_dev_pass_reports_improvement() {
        let learner = ScriptedLearner {
            dev_losses: VecDeque::from(vec![7.0]),
            ..Default::default()
        };
        let rng = StdRng::seed_from_u64(1);
        let mut trainer = Trainer::new(learner, corpus(2), corpus(3), config(1, 100), rng).unwrap();

        let first = trainer.run_dev_pass().unwrap();
        assert!(first.improved);
        assert_eq!(first.metrics.kind, ReportKind::Dev);
        assert_eq!(first.metrics.words, 9);
        assert!(!trainer.run_dev_pass().unwrap().improved);
    }

    #[test]
    fn test_dev_pass_without_words_never_checkpoints() {
        let learner = CountingLearner {
            inner: ScriptedLearner::default(),
            saves: std::cell::Cell::new(0),
        };
        let rng = StdRng::seed_from_u64(1);
        let mut trainer = Trainer::new(learner, corpus(2), Corpus::new(), config(1, 1), rng).unwrap();

        for _ in 0..4 {
            trainer.run_report_cycle().unwrap();
        }
        let extra: Vec<bool> = (0..2).map(|_| trainer.run_dev_pass().unwrap().improved).collect();

        assert_eq!(extra, vec![false, false]);
        assert_eq!(trainer.learner().saves.get(), 0);
        assert!(trainer.best.value().is_none());
    }

    #[test]
    fn test_each_epoch_visits_every_document_once() {
        let rng = StdRng::seed_from_u64(42);
        let mut trainer =
            Trainer::new(ScriptedLearner::default(), corpus(5), corpus(1), config(5, 100), rng).unwrap();

        trainer.run_report_cycle().unwrap();
        trainer.run_report_cycle().unwrap();
        let trained = &trainer.learner().trained;
        for epoch in trained.chunks(5) {
            let mut seen = epoch.to_vec();
            seen.sort_unstable();
            assert_eq!(seen, vec![10, 11, 12, 13, 14]);
        }
    }

    #[test]
    fn test_first_pass_skips_epoch_decay() {
        let rng = StdRng::seed_from_u64(42);
        let mut trainer =
            Trainer::new(ScriptedLearner::default(), corpus(3), corpus(1), config(2, 100), rng).unwrap();

        trainer.run_report_cycle().unwrap(); // docs 1-2
        assert_eq!(trainer.learner().epochs, 0);
        trainer.run_report_cycle().unwrap(); // docs 3-4, wraps once
        assert_eq!(trainer.learner().epochs, 1);
        trainer.run_report_cycle().unwrap(); // docs 5-6
        assert_eq!(trainer.learner().epochs, 1);
        assert!((trainer.epoch_fraction() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_window_words_match_window_documents() {
        let training = vec![
            Document::new(vec![Sentence::from_content([10, 3, 4])]),               // 4 targets
            Document::new(vec![Sentence::from_content([11]), Sentence::from_content([5])]), // 4 targets
        ];
        let rng = StdRng::seed_from_u64(0);
        let mut trainer =
            Trainer::new(ScriptedLearner::default(), training, corpus(1), config(2, 100), rng).unwrap();

        let report = trainer.run_report_cycle().unwrap();
        assert_eq!(report.words, 8);
        assert_eq!(report.loss, 8.0);
        assert_eq!(report.kind, ReportKind::Train);
    }

    #[test]
    fn test_zero_target_documents_are_skipped() {
        let training = vec![Document::default(), Document::new(vec![Sentence::from_content([12])])];
        let rng = StdRng::seed_from_u64(0);
        let mut trainer =
            Trainer::new(ScriptedLearner::default(), training, Vec::new(), config(2, 100), rng).unwrap();

        let report = trainer.run_report_cycle().unwrap();
        assert_eq!(report.words, 2);
        assert_eq!(trainer.learner().trained, vec![12]);
    }

    #[test]
    fn test_empty_training_corpus_is_fatal() {
        let rng = StdRng::seed_from_u64(0);
        assert!(Trainer::new(ScriptedLearner::default(), Vec::new(), corpus(1), config(1, 1), rng).is_err());
    }

    #[test]
    fn test_metrics_are_written() {
        let tmp = tempfile::tempdir().unwrap();
        let rng = StdRng::seed_from_u64(0);
        let mut trainer = Trainer::new(ScriptedLearner::default(), corpus(2), corpus(1), config(1, 1), rng)
            .unwrap()
            .with_metrics(MetricsLogger::new(tmp.path()).unwrap());

        trainer.run_report_cycle().unwrap();
        let text = std::fs::read_to_string(tmp.path().join("metrics.csv")).unwrap();
        assert_eq!(text.lines().count(), 3);
    }
}
