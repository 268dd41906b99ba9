// ============================================================
// Layer 5 - Sampling Driver
// ============================================================
// Generates alternative continuations of a document with the
// hidden-context model:
//
//   document = s_1 … s_{n-1} s_n
//              └── context ──┘ └ dropped
//
//   for each seed word:  <s> seed w w w … </s>
//
// One continuation per seed, so the default seed menu ("but",
// "so") gives two alternative completions per document.

use anyhow::Result;
use burn::prelude::*;
use rand::{
    distributions::{Distribution, WeightedIndex},
    Rng,
};

use crate::domain::{
    document::Document,
    vocabulary::{TokenId, Vocabulary, END_ID, START_ID},
};
use crate::ml::hidden::HiddenContextModel;

pub const DEFAULT_SEEDS: [&str; 2] = ["but", "so"];
pub const DEFAULT_MAX_LEN: usize = 100;

/// Draws the next token from a softmax distribution. The start
/// sentinel (id 0) can never be drawn. A distribution with no usable
/// mass left ends the sentence.
pub fn draw_token<R: Rng>(probs: &[f32], rng: &mut R) -> TokenId {
    let mut weights = probs.to_vec();
    if let Some(start) = weights.get_mut(START_ID as usize) {
        *start = 0.0;
    }
    match WeightedIndex::new(&weights) {
        Ok(dist) => dist.sample(rng) as TokenId,
        Err(e) => {
            tracing::debug!("Cannot sample from distribution ({e}), ending sentence");
            END_ID
        }
    }
}

/// Maps seed words to ids. Unknown seeds fall back to `UNK`.
pub fn resolve_seeds(vocab: &Vocabulary, words: &[String]) -> Vec<TokenId> {
    words
        .iter()
        .map(|w| {
            if !vocab.contains(w) {
                tracing::warn!("Seed word '{}' is not in the vocabulary, using UNK", w);
            }
            vocab.lookup(w)
        })
        .collect()
}

pub struct Sampler<'a, B: Backend> {
    model:   &'a HiddenContextModel<B>,
    seeds:   Vec<TokenId>,
    max_len: usize,
}

impl<'a, B: Backend> Sampler<'a, B> {
    pub fn new(model: &'a HiddenContextModel<B>, seeds: Vec<TokenId>, max_len: usize) -> Self {
        Self { model, seeds, max_len }
    }

    /// One continuation per seed for the sentences of `document` minus
    /// its last one.
    pub fn continue_document<R: Rng>(&self, document: &Document, rng: &mut R) -> Result<Vec<Vec<TokenId>>> {
        let context = document
            .split_last()
            .map(|(prefix, _)| prefix)
            .unwrap_or_default();

        self.seeds
            .iter()
            .map(|&seed| self.model.sample(&context, seed, self.max_len, rng))
            .collect()
    }
}

/// Renders a continuation without its closing sentinel.
pub fn render_continuation(vocab: &Vocabulary, tokens: &[TokenId]) -> String {
    let body = match tokens.split_last() {
        Some((&END_ID, rest)) => rest,
        _ => tokens,
    };
    vocab.render(body)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    use crate::domain::{document::Sentence, vocabulary::UNK_ID};
    use crate::ml::{config::ModelConfig, TrainBackend};

    #[test]
    fn test_start_sentinel_is_never_drawn() {
        let mut rng = StdRng::seed_from_u64(3);
        let probs = [0.97, 0.01, 0.01, 0.01];
        for _ in 0..200 {
            assert_ne!(draw_token(&probs, &mut rng), START_ID);
        }
    }

    #[test]
    fn test_one_hot_distribution_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(draw_token(&[0.0, 0.0, 0.0, 1.0], &mut rng), 3);
    }

    #[test]
    fn test_degenerate_distribution_ends_sentence() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(draw_token(&[1.0, 0.0, 0.0], &mut rng), END_ID);
        assert_eq!(draw_token(&[f32::NAN, 0.5], &mut rng), END_ID);
    }

    #[test]
    fn test_unknown_seed_maps_to_unk() {
        let mut vocab = Vocabulary::new();
        let but = vocab.convert("but");
        vocab.freeze();
        let ids = resolve_seeds(&vocab, &["but".to_string(), "zzz".to_string()]);
        assert_eq!(ids, vec![but, UNK_ID]);
    }

    #[test]
    fn test_render_drops_closing_sentinel() {
        let mut vocab = Vocabulary::new();
        let but = vocab.convert("but");
        let yes = vocab.convert("yes");
        assert_eq!(render_continuation(&vocab, &[but, yes, END_ID]), "but yes");
        assert_eq!(render_continuation(&vocab, &[but]), "but");
    }

    #[test]
    fn test_one_continuation_per_seed() {
        let device = Default::default();
        let model  = ModelConfig::new(6)
            .with_layers(1)
            .with_input_dim(3)
            .with_hidden_dim(3)
            .init_hidden::<TrainBackend>(&device);
        let sampler = Sampler::new(&model, vec![3, 4], 5);
        let doc = Document::new(vec![Sentence::from_content([3]), Sentence::from_content([5])]);
        let mut rng = StdRng::seed_from_u64(11);

        let out = sampler.continue_document(&doc, &mut rng).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0][0], 3);
        assert_eq!(out[1][0], 4);
    }
}
