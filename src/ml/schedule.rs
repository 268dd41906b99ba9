// ============================================================
// Layer 5 - Learning-rate schedule
// ============================================================
// Wraps one burn optimiser with an epoch-decayed learning rate:
//
//   rate(epoch) = lr0 / (1 + epoch * decay)
//
// The control loop calls `update_epoch` at every epoch boundary
// except the very first pass, and `update` once per document.

use burn::{
    module::AutodiffModule,
    optim::{decay::WeightDecayConfig, GradientsParams, Optimizer, SgdConfig},
    tensor::backend::AutodiffBackend,
};

use crate::ml::config::OptimConfig;

impl OptimConfig {
    /// Plain SGD with an L2 penalty.
    pub fn sgd(&self) -> SgdConfig {
        SgdConfig::new().with_weight_decay(Some(WeightDecayConfig::new(self.weight_decay.into())))
    }
}

pub struct LearningSchedule<O> {
    optim: O,
    lr0:   f64,
    decay: f64,
    epoch: usize,
}

impl<O> LearningSchedule<O> {
    pub fn new(optim: O, lr0: f64, decay: f64) -> Self {
        Self { optim, lr0, decay, epoch: 0 }
    }

    pub fn rate(&self) -> f64 {
        self.lr0 / (1.0 + self.epoch as f64 * self.decay)
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn update_epoch(&mut self) {
        self.epoch += 1;
        tracing::debug!("Learning rate now {:.6} (epoch {})", self.rate(), self.epoch);
    }

    /// One optimiser step at the current rate.
    pub fn update<B, M>(&mut self, module: M, grads: GradientsParams) -> M
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let rate = self.rate();
        self.optim.step(rate, module, grads)
    }
}
