// ============================================================
// Layer 5 - Document Model seam + shared graph helpers
// ============================================================
// Every context strategy is a burn Module that can turn one
// Document into a single summed negative log-likelihood:
//
//   loss = Σ_sentences Σ_{t=1..n-1} -log softmax(logits_t)[w_t]
//
// The helpers below are the pieces all five strategies share:
// looking tokens up, slicing rows, and the pick-and-sum loss.

use anyhow::{anyhow, Result};
use burn::{
    nn::Embedding,
    prelude::*,
    tensor::{activation::log_softmax, TensorData},
};

use crate::domain::document::Document;
use crate::domain::vocabulary::TokenId;

/// A trainable model that scores whole documents.
pub trait DocumentModel<B: Backend> {
    /// Summed negative log-likelihood of every next-token target in
    /// the document, as a one-element tensor.
    fn document_loss(&self, document: &Document) -> Tensor<B, 1>;
}

/// Token ids as a 1-D Int tensor.
pub fn token_tensor<B: Backend>(tokens: &[TokenId], device: &B::Device) -> Tensor<B, 1, Int> {
    let ids: Vec<i32> = tokens.iter().map(|&t| t as i32).collect();
    Tensor::<B, 1, Int>::from_ints(ids.as_slice(), device)
}

/// Embeds `tokens` as an [n, dim] matrix, one row per token.
pub fn embed_tokens<B: Backend>(
    embedding: &Embedding<B>,
    tokens:    &[TokenId],
    device:    &B::Device,
) -> Tensor<B, 2> {
    // [n] → [1, n] → [1, n, dim] → [n, dim]
    let ids = token_tensor::<B>(tokens, device).unsqueeze::<2>();
    embedding.forward(ids).flatten::<2>(0, 1)
}

/// Row `i` of a matrix, kept 2-D as [1, cols].
pub fn row<B: Backend>(matrix: &Tensor<B, 2>, i: usize) -> Tensor<B, 2> {
    let [_, cols] = matrix.dims();
    matrix.clone().slice([i..i + 1, 0..cols])
}

/// Device the embedding table lives on.
pub fn device_of<B: Backend>(embedding: &Embedding<B>) -> B::Device {
    embedding.weight.val().device()
}

/// -Σ_i log softmax(logits_i)[targets_i] for logits of shape
/// [n, vocab] and exactly n targets.
pub fn neg_log_likelihood<B: Backend>(logits: Tensor<B, 2>, targets: &[TokenId]) -> Tensor<B, 1> {
    let device = logits.device();
    let n = targets.len();
    let index = token_tensor::<B>(targets, &device).reshape([n, 1]);
    log_softmax(logits, 1).gather(1, index).sum().neg()
}

/// Same loss, with a single [1, vocab] distribution scored against
/// every target in `targets`.
pub fn neg_log_likelihood_shared<B: Backend>(
    logits:  Tensor<B, 2>,
    targets: &[TokenId],
) -> Tensor<B, 1> {
    let device = logits.device();
    let n = targets.len();
    let index = token_tensor::<B>(targets, &device).reshape([1, n]);
    log_softmax(logits, 1).gather(1, index).sum().neg()
}

/// Adds up per-sentence losses. An empty list sums to zero.
pub fn sum_losses<B: Backend>(losses: Vec<Tensor<B, 1>>, device: &B::Device) -> Tensor<B, 1> {
    if losses.is_empty() {
        return Tensor::zeros([1], device);
    }
    Tensor::cat(losses, 0).sum()
}

pub fn scalar<B: Backend>(loss: Tensor<B, 1>) -> f64 {
    loss.into_scalar().elem::<f64>()
}

/// Copies a [1, dim] row out of the graph into plain floats.
pub fn row_to_vec<B: Backend>(row: Tensor<B, 2>) -> Result<Vec<f32>> {
    row.into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("cannot read tensor values: {e:?}"))
}

/// Plain floats back into a fresh [1, dim] row with no history.
pub fn vec_to_row<B: Backend>(values: &[f32], device: &B::Device) -> Tensor<B, 2> {
    Tensor::from_data(TensorData::new(values.to_vec(), [1, values.len()]), device)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::TrainBackend;

    type B = TrainBackend;

    #[test]
    fn test_uniform_logits_give_log_vocab_per_target() {
        let device = Default::default();
        let logits = Tensor::<B, 2>::zeros([3, 4], &device);
        let loss   = scalar(neg_log_likelihood(logits, &[0, 1, 3]));
        assert!((loss - 3.0 * 4f64.ln()).abs() < 1e-4);
    }

    #[test]
    fn test_shared_logits_count_every_target() {
        let device = Default::default();
        let logits = Tensor::<B, 2>::zeros([1, 5], &device);
        let loss   = scalar(neg_log_likelihood_shared(logits, &[2, 2]));
        assert!((loss - 2.0 * 5f64.ln()).abs() < 1e-4);
    }

    #[test]
    fn test_confident_correct_logits_give_small_loss() {
        let device = Default::default();
        let logits = Tensor::<B, 2>::from_floats([[10.0, -10.0], [-10.0, 10.0]], &device);
        let loss   = scalar(neg_log_likelihood(logits, &[0, 1]));
        assert!(loss < 1e-3);
    }

    #[test]
    fn test_row_roundtrip() {
        let device = Default::default();
        let m = Tensor::<B, 2>::from_floats([[1.0, 2.0], [3.0, 4.0]], &device);
        let r = row_to_vec(row(&m, 1)).unwrap();
        assert_eq!(r, vec![3.0, 4.0]);
        let back = vec_to_row::<B>(&r, &device);
        assert_eq!(back.dims(), [1, 2]);
    }

    #[test]
    fn test_sum_of_no_losses_is_zero() {
        let device = Default::default();
        assert_eq!(scalar(sum_losses::<B>(Vec::new(), &device)), 0.0);
    }
}
