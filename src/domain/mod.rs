// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Pure Rust types for the data every other layer passes around.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only plain structs, enums, and traits
//
// Everything here is testable without building a model.

// Sentence / Document / Corpus
pub mod document;

// Word <-> id table with freeze semantics
pub mod vocabulary;

// Which context-threading rule a run uses
pub mod strategy;

// Abstractions implemented by the data and ml layers
pub mod traits;
