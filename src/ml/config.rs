use burn::prelude::*;

/// Dimensions shared by every context strategy. Passed to each
/// strategy's constructor; nothing reads these from global state.
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// Frozen vocabulary size: rows of the embedding table and
    /// columns of every output projection.
    pub vocab_size: usize,
    /// Stacked recurrent layers.
    #[config(default = 2)]
    pub layers: usize,
    /// Word embedding width.
    #[config(default = 16)]
    pub input_dim: usize,
    /// Hidden width of each recurrent layer.
    #[config(default = 48)]
    pub hidden_dim: usize,
    /// Width of the attention alignment space (attention strategy only).
    #[config(default = 32)]
    pub align_dim: usize,
}

impl ModelConfig {
    /// Width of a concatenation of every layer's hidden state.
    pub fn stacked_state_dim(&self) -> usize {
        self.layers * self.hidden_dim
    }
}

/// Optimiser settings. The update rule itself belongs to burn's SGD;
/// this only fixes the starting rate, its per-epoch decay and the L2
/// penalty.
#[derive(Config, Debug)]
pub struct OptimConfig {
    #[config(default = 0.1)]
    pub lr: f64,
    /// rate = lr / (1 + epoch * lr_decay)
    #[config(default = 0.0)]
    pub lr_decay: f64,
    #[config(default = 1e-6)]
    pub weight_decay: f32,
}
