// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// One use case per CLI subcommand. Each one wires the data, ml
// and infra layers together for a single workflow:
//
//   train     build vocabulary, segment, train until interrupted
//   evaluate  score a test corpus with the best saved parameters
//   sample    continue documents with the hidden-context model
//
// Rules for this layer:
//   - No tensor code here (that's Layer 5)
//   - No argument parsing or printing (that's Layer 1)
//   - Only workflow coordination

/// The training workflow, plus the saved run configuration
pub mod train_use_case;

/// Held-out perplexity
pub mod evaluate_use_case;

/// Text generation
pub mod sample_use_case;
