// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// The three subcommands and their flags. Defaults come from the
// application-layer configs so the two never drift apart. Each
// argument struct converts into its use case config; the
// application layer never sees clap types.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::{
    evaluate_use_case::EvaluateConfig,
    sample_use_case::SampleConfig,
    train_use_case::{TrainConfig, DEFAULT_SEGMENT_THRESHOLD},
};
use crate::data::loader::DEFAULT_DELIMITER;
use crate::domain::strategy::ContextStrategy;
use crate::ml::{
    sampler::DEFAULT_MAX_LEN,
    trainer::{DEFAULT_DEV_EVERY_REPORTS, DEFAULT_REPORT_EVERY},
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a model; runs until interrupted, checkpointing on dev improvement
    Train(TrainArgs),

    /// Report per-document and corpus perplexity on a test file
    Evaluate(EvaluateArgs),

    /// Continue documents with a trained hidden-context model
    Sample(SampleArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Training corpus (one sentence per line, documents separated by
    /// lines starting with the delimiter)
    #[arg(long)]
    pub train: String,

    /// Dev corpus used to select checkpoints
    #[arg(long)]
    pub dev: String,

    /// Directory for parameters, vocabulary, config and metrics
    #[arg(long, default_value = "models")]
    pub checkpoint_dir: String,

    /// Context strategy: flat, hidden, output, attention or hierarchical
    #[arg(long, default_value = "hidden")]
    pub strategy: ContextStrategy,

    /// Stacked recurrent layers
    #[arg(long, default_value_t = 2)]
    pub layers: usize,

    /// Word embedding size
    #[arg(long, default_value_t = 16)]
    pub input_dim: usize,

    /// Recurrent state size
    #[arg(long, default_value_t = 48)]
    pub hidden_dim: usize,

    /// Attention alignment size (attention strategy only)
    #[arg(long, default_value_t = 32)]
    pub align_dim: usize,

    /// Initial SGD learning rate
    #[arg(long, default_value_t = 0.1)]
    pub lr: f64,

    /// Rate at epoch e is lr / (1 + e * lr_decay)
    #[arg(long, default_value_t = 0.0)]
    pub lr_decay: f64,

    /// L2 penalty applied by the optimiser
    #[arg(long, default_value_t = 1e-6)]
    pub weight_decay: f32,

    /// Training documents per report
    #[arg(long, default_value_t = DEFAULT_REPORT_EVERY)]
    pub report_every: usize,

    /// Reports between dev passes
    #[arg(long, default_value_t = DEFAULT_DEV_EVERY_REPORTS)]
    pub dev_every_reports: usize,

    /// Longest training document, in sentences, before it is split
    #[arg(long, default_value_t = DEFAULT_SEGMENT_THRESHOLD)]
    pub segment_threshold: usize,

    /// Document delimiter character
    #[arg(long, default_value_t = DEFAULT_DELIMITER)]
    pub delimiter: char,

    /// Shuffle seed
    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// Continue from the parameters and vocabulary in checkpoint_dir
    #[arg(long)]
    pub resume: bool,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            train_path:        a.train,
            dev_path:          a.dev,
            checkpoint_dir:    a.checkpoint_dir,
            strategy:          a.strategy,
            layers:            a.layers,
            input_dim:         a.input_dim,
            hidden_dim:        a.hidden_dim,
            align_dim:         a.align_dim,
            lr:                a.lr,
            lr_decay:          a.lr_decay,
            weight_decay:      a.weight_decay,
            report_every:      a.report_every,
            dev_every_reports: a.dev_every_reports,
            segment_threshold: a.segment_threshold,
            delimiter:         a.delimiter,
            seed:              a.seed,
            resume:            a.resume,
            vocab_size:        0,
        }
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Test corpus; results go to <test>.<strategy>.result
    #[arg(long)]
    pub test: String,

    #[arg(long, default_value = "models")]
    pub checkpoint_dir: String,

    /// Overrides the delimiter saved with the model
    #[arg(long)]
    pub delimiter: Option<char>,
}

impl From<EvaluateArgs> for EvaluateConfig {
    fn from(a: EvaluateArgs) -> Self {
        EvaluateConfig {
            test_path:      a.test,
            checkpoint_dir: a.checkpoint_dir,
            delimiter:      a.delimiter,
        }
    }
}

#[derive(Args, Debug)]
pub struct SampleArgs {
    /// Documents to continue; output goes to <context>.hidden.sample
    #[arg(long)]
    pub context: String,

    #[arg(long, default_value = "models")]
    pub checkpoint_dir: String,

    /// First word of each generated sentence
    #[arg(long, value_delimiter = ',', default_value = "but,so")]
    pub seeds: Vec<String>,

    /// Most tokens generated after the seed
    #[arg(long, default_value_t = DEFAULT_MAX_LEN)]
    pub max_len: usize,

    /// Sampling seed
    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    #[arg(long)]
    pub delimiter: Option<char>,
}

impl From<SampleArgs> for SampleConfig {
    fn from(a: SampleArgs) -> Self {
        SampleConfig {
            context_path:   a.context,
            checkpoint_dir: a.checkpoint_dir,
            seeds:          a.seeds,
            max_len:        a.max_len,
            seed:           a.seed,
            delimiter:      a.delimiter,
        }
    }
}
