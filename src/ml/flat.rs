// ============================================================
// Layer 5 - Flat strategy
// ============================================================
// Baseline: each sentence is an independent sequence. Nothing
// flows from one sentence to the next.
//
//   logits_t = R h_t + bias

use burn::{
    nn::{Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
};

use crate::domain::document::Document;
use crate::ml::{
    cell::RecurrentCell,
    config::ModelConfig,
    model::{device_of, embed_tokens, neg_log_likelihood, row, sum_losses, DocumentModel},
};

#[derive(Module, Debug)]
pub struct FlatModel<B: Backend> {
    embedding: Embedding<B>,
    cell:      RecurrentCell<B>,
    output:    Linear<B>,
}

impl ModelConfig {
    pub fn init_flat<B: Backend>(&self, device: &B::Device) -> FlatModel<B> {
        FlatModel {
            embedding: EmbeddingConfig::new(self.vocab_size, self.input_dim).init(device),
            cell:      RecurrentCell::new(self.layers, self.input_dim, self.hidden_dim, device),
            output:    LinearConfig::new(self.hidden_dim, self.vocab_size).init(device),
        }
    }
}

impl<B: Backend> DocumentModel<B> for FlatModel<B> {
    fn document_loss(&self, document: &Document) -> Tensor<B, 1> {
        let device = device_of(&self.embedding);
        let mut run = self.cell.run(&device);
        let mut losses = Vec::with_capacity(document.len());

        for sentence in document.sentences() {
            run.start_sequence();
            let tokens = sentence.tokens();
            let inputs = embed_tokens(&self.embedding, &tokens[..tokens.len() - 1], &device);

            let logits: Vec<Tensor<B, 2>> = (0..sentence.target_count())
                .map(|t| self.output.forward(run.add_input(row(&inputs, t))))
                .collect();
            losses.push(neg_log_likelihood(Tensor::cat(logits, 0), &tokens[1..]));
        }

        sum_losses(losses, &device)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::Sentence;
    use crate::ml::{model::scalar, TrainBackend};

    type B = TrainBackend;

    fn config() -> ModelConfig {
        ModelConfig::new(8).with_layers(1).with_input_dim(4).with_hidden_dim(5)
    }

    #[test]
    fn test_sentence_order_does_not_matter() {
        let device = Default::default();
        let model  = config().init_flat::<B>(&device);
        let a = Sentence::from_content([3, 4]);
        let b = Sentence::from_content([5]);

        let ab = scalar(model.document_loss(&Document::new(vec![a.clone(), b.clone()])));
        let ba = scalar(model.document_loss(&Document::new(vec![b, a])));
        assert!((ab - ba).abs() < 1e-4);
    }

    #[test]
    fn test_loss_is_sum_of_sentence_losses() {
        let device = Default::default();
        let model  = config().init_flat::<B>(&device);
        let a = Sentence::from_content([3, 4, 6]);
        let b = Sentence::from_content([7]);

        let whole = scalar(model.document_loss(&Document::new(vec![a.clone(), b.clone()])));
        let parts = scalar(model.document_loss(&Document::new(vec![a])))
                  + scalar(model.document_loss(&Document::new(vec![b])));
        assert!((whole - parts).abs() < 1e-4);
        assert!(whole > 0.0);
    }
}
