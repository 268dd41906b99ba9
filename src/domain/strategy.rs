// ============================================================
// Layer 3 - Context Strategy selector
// ============================================================
// Which rule threads information from one sentence to the next.
// Chosen once per run (CLI flag or saved config) and never
// changed afterwards.
//
//   flat          no context, every sentence starts cold
//   hidden        previous sentence's final state appended to inputs
//   output        previous sentence's final state shifts the output bias
//   attention     attention over every earlier sentence's final state
//   hierarchical  separate sentence-level and word-level recurrences
//
// Reference: Ji et al. (2015) Document Context Language Models
//            Lin et al. (2015) Hierarchical Recurrent Neural Network
//                              for Document Modeling

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextStrategy {
    Flat,
    Hidden,
    Output,
    Attention,
    Hierarchical,
}

impl ContextStrategy {
    pub const ALL: [ContextStrategy; 5] = [
        ContextStrategy::Flat,
        ContextStrategy::Hidden,
        ContextStrategy::Output,
        ContextStrategy::Attention,
        ContextStrategy::Hierarchical,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ContextStrategy::Flat         => "flat",
            ContextStrategy::Hidden       => "hidden",
            ContextStrategy::Output       => "output",
            ContextStrategy::Attention    => "attention",
            ContextStrategy::Hierarchical => "hierarchical",
        }
    }
}

impl fmt::Display for ContextStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ContextStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flat" | "rnnlm"           => Ok(ContextStrategy::Flat),
            "hidden"                   => Ok(ContextStrategy::Hidden),
            "output"                   => Ok(ContextStrategy::Output),
            "attention" | "dam"        => Ok(ContextStrategy::Attention),
            "hierarchical" | "hrnnlm"  => Ok(ContextStrategy::Hierarchical),
            other => Err(format!(
                "unrecognized context strategy '{other}' (expected one of: flat, hidden, output, attention, hierarchical)"
            )),
        }
    }
}
