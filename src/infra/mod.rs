// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Everything that touches the disk on behalf of the other layers:
//
//   checkpoint.rs   - parameter blobs (Burn CompactRecorder) and
//                     the saved run configuration (JSON)
//
//   vocab_store.rs  - the frozen vocabulary as a word-level
//                     tokenizer file
//
//   metrics.rs      - training and dev reports appended to CSV
//
// All three share one directory per run (--checkpoint-dir), so a
// trained model is a self-contained folder.

/// Parameter and config persistence
pub mod checkpoint;

/// Vocabulary persistence
pub mod vocab_store;

/// Report CSV logger
pub mod metrics;
