// ============================================================
// Layer 5 - Output-context strategy
// ============================================================
// The recurrence itself sees only the words. The previous
// sentence's final state instead shifts the output layer:
//
//   shift_k  = bias + R2 c_k          (once per sentence)
//   logits_t = R h_t + shift_k
//
// with c_0 a learned default and c_{k+1} = h_last(sentence k).

use burn::{
    module::Param,
    nn::{Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
    tensor::Distribution,
};

use crate::domain::document::Document;
use crate::ml::{
    cell::RecurrentCell,
    config::ModelConfig,
    model::{device_of, embed_tokens, neg_log_likelihood, row, sum_losses, DocumentModel},
};

#[derive(Module, Debug)]
pub struct OutputContextModel<B: Backend> {
    embedding:       Embedding<B>,
    cell:            RecurrentCell<B>,
    /// R: hidden → vocab, no bias of its own.
    output:          Linear<B>,
    /// R2: context → vocab.
    context_output:  Linear<B>,
    bias:            Param<Tensor<B, 2>>,
    default_context: Param<Tensor<B, 2>>,
}

/// Per-sentence record of one document pass.
pub struct OutputTrace<B: Backend> {
    /// c_k, the context sentence k was conditioned on.
    pub contexts: Vec<Tensor<B, 2>>,
    /// bias + R2 c_k, shared by every position of sentence k.
    pub shifts:   Vec<Tensor<B, 2>>,
    /// Top-layer state after the last input of sentence k.
    pub finals:   Vec<Tensor<B, 2>>,
    /// Loss of sentence k alone.
    pub losses:   Vec<Tensor<B, 1>>,
}

impl ModelConfig {
    pub fn init_output<B: Backend>(&self, device: &B::Device) -> OutputContextModel<B> {
        OutputContextModel {
            embedding: EmbeddingConfig::new(self.vocab_size, self.input_dim).init(device),
            cell: RecurrentCell::new(self.layers, self.input_dim, self.hidden_dim, device),
            output: LinearConfig::new(self.hidden_dim, self.vocab_size)
                .with_bias(false)
                .init(device),
            context_output: LinearConfig::new(self.hidden_dim, self.vocab_size)
                .with_bias(false)
                .init(device),
            bias: Param::from_tensor(Tensor::zeros([1, self.vocab_size], device)),
            default_context: Param::from_tensor(Tensor::random(
                [1, self.hidden_dim],
                Distribution::Uniform(-0.1, 0.1),
                device,
            )),
        }
    }
}

impl<B: Backend> OutputContextModel<B> {
    /// Per-sentence logit offset contributed by the context vector.
    pub fn context_shift(&self, context: Tensor<B, 2>) -> Tensor<B, 2> {
        self.bias.val() + self.context_output.forward(context)
    }

    pub fn forward_document(&self, document: &Document) -> (Tensor<B, 1>, OutputTrace<B>) {
        let device = device_of(&self.embedding);
        let mut run = self.cell.run(&device);
        let mut context = self.default_context.val();
        let mut trace = OutputTrace {
            contexts: Vec::new(),
            shifts:   Vec::new(),
            finals:   Vec::new(),
            losses:   Vec::with_capacity(document.len()),
        };

        for sentence in document.sentences() {
            run.start_sequence();
            let shift  = self.context_shift(context.clone());
            let tokens = sentence.tokens();
            let inputs = embed_tokens(&self.embedding, &tokens[..tokens.len() - 1], &device);

            let logits: Vec<Tensor<B, 2>> = (0..sentence.target_count())
                .map(|t| self.output.forward(run.add_input(row(&inputs, t))) + shift.clone())
                .collect();
            trace.losses.push(neg_log_likelihood(Tensor::cat(logits, 0), &tokens[1..]));

            let last = run.final_hidden();
            trace.contexts.push(context);
            trace.shifts.push(shift);
            trace.finals.push(last.clone());
            context = last;
        }

        (sum_losses(trace.losses.clone(), &device), trace)
    }
}

impl<B: Backend> DocumentModel<B> for OutputContextModel<B> {
    fn document_loss(&self, document: &Document) -> Tensor<B, 1> {
        self.forward_document(document).0
    }
}
