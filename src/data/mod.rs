// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// From a delimited text file to a training-ready Corpus:
//
//   corpus.txt
//       │
//       ▼
//   CorpusLoader   → lines → sentences → documents, resolves words
//       │            against the Vocabulary
//       ▼
//   Segmenter      → bounds document length (training set only)
//       │
//       ▼
//   Corpus         → handed to the control loop one document at a time
//
// There is no batching step: training is online, one document
// per optimiser step.

/// Reads delimited corpus files into documents
pub mod loader;

/// Splits long documents into bounded chunks
pub mod segmenter;
