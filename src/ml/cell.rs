// ============================================================
// Layer 5 - Recurrent Cell
// ============================================================
// A stack of burn GRU layers driven one token at a time.
//
// The strategies never look inside the cell. They only need:
//
//   cell.run(device)       fresh per-graph state    (reset)
//   run.start_sequence()   forget state at a sentence boundary
//   run.add_input(x)       advance one step, returns top-layer h
//   run.final_hidden()     top-layer h of the last step
//   run.final_states()     every layer's h, concatenated
//
// RecurrentCell is the Module (owns the weights); CellRun is the
// short-lived state for one graph and borrows the weights.
//
// All vectors are row tensors of shape [1, dim].

use burn::{
    nn::gru::{Gru, GruConfig},
    prelude::*,
};

#[derive(Module, Debug)]
pub struct RecurrentCell<B: Backend> {
    layers:     Vec<Gru<B>>,
    hidden_dim: usize,
}

impl<B: Backend> RecurrentCell<B> {
    /// # Panics
    /// Panics if `layers` is 0.
    pub fn new(layers: usize, input_dim: usize, hidden_dim: usize, device: &B::Device) -> Self {
        assert!(layers > 0, "a recurrent cell needs at least one layer");
        let layers = (0..layers)
            .map(|l| {
                let d_input = if l == 0 { input_dim } else { hidden_dim };
                GruConfig::new(d_input, hidden_dim, true).init(device)
            })
            .collect();
        Self { layers, hidden_dim }
    }

    /// Start a new graph: no state carried from any earlier run.
    pub fn run(&self, device: &B::Device) -> CellRun<'_, B> {
        CellRun {
            cell:   self,
            states: None,
            device: device.clone(),
        }
    }
}

/// Per-graph recurrent state.
pub struct CellRun<'a, B: Backend> {
    cell:   &'a RecurrentCell<B>,
    /// One [1, hidden] row per layer; `None` right after a reset or
    /// a sequence boundary.
    states: Option<Vec<Tensor<B, 2>>>,
    device: B::Device,
}

impl<'a, B: Backend> CellRun<'a, B> {
    pub fn start_sequence(&mut self) {
        self.states = None;
    }

    /// Feed one [1, input] row through every layer.
    pub fn add_input(&mut self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let hidden = self.cell.hidden_dim;
        let mut x = input;
        let mut next = Vec::with_capacity(self.cell.layers.len());

        for (l, gru) in self.cell.layers.iter().enumerate() {
            let prev = self.states.as_ref().map(|s| s[l].clone());
            // [1, d] → [batch=1, seq=1, d]
            let out = gru.forward(x.unsqueeze_dim::<3>(1), prev);
            let h = out.reshape([1, hidden]);
            next.push(h.clone());
            x = h;
        }

        self.states = Some(next);
        x
    }

    /// Top-layer hidden state; zeros before the first input.
    pub fn final_hidden(&self) -> Tensor<B, 2> {
        match &self.states {
            Some(states) => states[states.len() - 1].clone(),
            None => Tensor::zeros([1, self.cell.hidden_dim], &self.device),
        }
    }

    /// All layers' hidden states side by side, [1, layers * hidden].
    pub fn final_states(&self) -> Tensor<B, 2> {
        match &self.states {
            Some(states) => Tensor::cat(states.clone(), 1),
            None => Tensor::zeros(
                [1, self.cell.layers.len() * self.cell.hidden_dim],
                &self.device,
            ),
        }
    }
}
