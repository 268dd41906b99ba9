// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// All Burn framework code lives here. The domain and data layers
// never import burn; they hand Documents in and get plain f64
// losses back through the DocumentLearner trait.
//
//   config.rs        ModelConfig / OptimConfig
//   cell.rs          stacked GRU driven one token at a time
//   model.rs         DocumentModel trait + shared loss helpers
//
//   flat.rs          ┐
//   hidden.rs        │ the five context strategies, one
//   output.rs        │ DocumentModel each (hierarchical
//   attention.rs     │ has two)
//   hierarchical.rs  ┘
//
//   schedule.rs      SGD with epoch-decayed learning rate
//   learner.rs       model + optimiser pairs, strategy factory
//   trainer.rs       the online training control loop
//   sampler.rs       text generation from the hidden model
//
// Backends: training runs on Autodiff<InnerBackend>; dev passes,
// evaluation and sampling run on InnerBackend through
// `model.valid()`. InnerBackend is NdArray (CPU) unless the `wgpu`
// feature is enabled.
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

pub mod config;
pub mod cell;
pub mod model;

pub mod flat;
pub mod hidden;
pub mod output;
pub mod attention;
pub mod hierarchical;

pub mod schedule;
pub mod learner;
pub mod trainer;
pub mod sampler;

#[cfg(not(feature = "wgpu"))]
pub type InnerBackend = burn::backend::NdArray;

#[cfg(feature = "wgpu")]
pub type InnerBackend = burn::backend::Wgpu;

pub type TrainBackend = burn::backend::Autodiff<InnerBackend>;

/// Device every model is built on.
pub fn default_device() -> <TrainBackend as burn::tensor::backend::Backend>::Device {
    Default::default()
}
