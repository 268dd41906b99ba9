// ============================================================
// Layer 3 - Core Traits (Abstractions)
// ============================================================
// The two seams the rest of the system is written against:
//
//   DocumentSource  - where a Corpus comes from
//                     (CorpusLoader reads delimited text files)
//
//   DocumentLearner - one trainable document model plus its
//                     optimiser state. Every context strategy is
//                     wrapped in a learner, so the control loop in
//                     ml::trainer never needs to know which one
//                     is active.
//
// Neither trait mentions Burn: the domain layer stays free of
// framework types, and the control loop can be unit tested with
// a scripted learner.

use anyhow::Result;

use crate::domain::document::{Corpus, Document};
use crate::domain::vocabulary::Vocabulary;

// ─── DocumentSource ───────────────────────────────────────────────────────────
/// Anything that can produce a corpus against a vocabulary.
pub trait DocumentSource {
    /// Load every document. With `update` set, unseen words grow the
    /// vocabulary; otherwise they resolve to the unknown-token id.
    fn load_all(&self, vocab: &mut Vocabulary, update: bool) -> Result<Corpus>;
}

// ─── DocumentLearner ──────────────────────────────────────────────────────────
/// A model that learns one document at a time.
pub trait DocumentLearner {
    /// Build the graph for `document`, back-propagate, and apply the
    /// optimiser step(s). Returns the loss that was reported for it.
    fn train_document(&mut self, document: &Document) -> Result<f64>;

    /// Forward-only loss for each document, in order.
    fn evaluate(&self, documents: &[Document]) -> Result<Vec<f64>>;

    /// Epoch boundary: advance learning-rate decay.
    fn end_epoch(&mut self);

    /// Persist the current parameters.
    fn checkpoint(&self) -> Result<()>;
}

impl<L: DocumentLearner + ?Sized> DocumentLearner for Box<L> {
    fn train_document(&mut self, document: &Document) -> Result<f64> {
        (**self).train_document(document)
    }

    fn evaluate(&self, documents: &[Document]) -> Result<Vec<f64>> {
        (**self).evaluate(documents)
    }

    fn end_epoch(&mut self) {
        (**self).end_epoch()
    }

    fn checkpoint(&self) -> Result<()> {
        (**self).checkpoint()
    }
}
