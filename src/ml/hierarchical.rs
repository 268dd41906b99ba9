// ============================================================
// Layer 5 - Hierarchical strategy
// ============================================================
// Two separately trained recurrences:
//
//   SentenceLevelModel  reads one bag-of-words vector per sentence
//                       (sum of its content embeddings) and predicts
//                       the content words of the next sentence.
//
//   WordLevelModel      an ordinary word recurrence whose inputs are
//                       [ E(w_t) ; c_k ], where c_k is the sentence
//                       level's state after reading sentence k-1.
//
// Training one document is an explicit two-phase pipeline:
//
//   phase 1  sentence level forward → its own loss → its own update,
//            and every per-sentence state copied out as plain floats
//            (SentenceCache)
//   phase 2  word level forward, reading contexts from the cache
//
// The cache has no graph history, so word-level gradients never
// reach the sentence-level parameters.
//
// Reference: Lin et al. (2015) Hierarchical Recurrent Neural Network
//            for Document Modeling

use anyhow::Result;
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
    model::{
        device_of, embed_tokens, neg_log_likelihood, neg_log_likelihood_shared, row,
        row_to_vec, sum_losses, vec_to_row, DocumentModel,
    },
};

// ─── Sentence level ───────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct SentenceLevelModel<B: Backend> {
    embedding: Embedding<B>,
    cell:      RecurrentCell<B>,
    output:    Linear<B>,
}

/// Sentence-level state after each sentence but the last, as plain
/// floats. Entry k is the context for sentence k + 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentenceCache {
    states: Vec<Vec<f32>>,
}

impl SentenceCache {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Context for sentence `k`; sentence 0 has none.
    pub fn context_for(&self, k: usize) -> Option<&[f32]> {
        k.checked_sub(1)
            .and_then(|i| self.states.get(i))
            .map(Vec::as_slice)
    }
}

/// Output of phase 1.
pub struct SentencePass<B: Backend> {
    /// `None` when nothing was predicted: a single-sentence document,
    /// or later sentences with no content words.
    pub loss:  Option<Tensor<B, 1>>,
    pub cache: SentenceCache,
}

impl ModelConfig {
    pub fn init_sentence_level<B: Backend>(&self, device: &B::Device) -> SentenceLevelModel<B> {
        SentenceLevelModel {
            embedding: EmbeddingConfig::new(self.vocab_size, self.input_dim).init(device),
            cell:      RecurrentCell::new(self.layers, self.input_dim, self.hidden_dim, device),
            output:    LinearConfig::new(self.hidden_dim, self.vocab_size)
                .with_bias(false)
                .init(device),
        }
    }

    pub fn init_word_level<B: Backend>(&self, device: &B::Device) -> WordLevelModel<B> {
        WordLevelModel {
            embedding: EmbeddingConfig::new(self.vocab_size, self.input_dim).init(device),
            cell: RecurrentCell::new(
                self.layers,
                self.input_dim + self.hidden_dim,
                self.hidden_dim,
                device,
            ),
            output: LinearConfig::new(self.hidden_dim, self.vocab_size)
                .with_bias(false)
                .init(device),
            default_context: Param::from_tensor(Tensor::random(
                [1, self.hidden_dim],
                Distribution::Uniform(-0.1, 0.1),
                device,
            )),
        }
    }
}

impl<B: Backend> SentenceLevelModel<B> {
    pub fn forward_document(&self, document: &Document) -> Result<SentencePass<B>> {
        let device = device_of(&self.embedding);
        let sentences = document.sentences();
        if sentences.len() < 2 {
            return Ok(SentencePass { loss: None, cache: SentenceCache::default() });
        }

        let input_dim = self.embedding.weight.val().dims()[1];
        let mut run = self.cell.run(&device);
        let mut losses = Vec::new();
        let mut states = Vec::with_capacity(sentences.len() - 1);

        for pair in sentences.windows(2) {
            let (current, next) = (&pair[0], &pair[1]);
            let bag = if current.content().is_empty() {
                Tensor::zeros([1, input_dim], &device)
            } else {
                embed_tokens(&self.embedding, current.content(), &device).sum_dim(0)
            };

            let h = run.add_input(bag);
            if !next.content().is_empty() {
                let logits = self.output.forward(h.clone());
                losses.push(neg_log_likelihood_shared(logits, next.content()));
            }
            states.push(row_to_vec(h)?);
        }

        let loss = (!losses.is_empty()).then(|| sum_losses(losses, &device));
        Ok(SentencePass { loss, cache: SentenceCache { states } })
    }
}

#[cfg(test)]
impl<B: Backend> SentenceLevelModel<B> {
    /// Embedding and output weights, flattened.
    pub(crate) fn parameter_snapshot(&self) -> Vec<f32> {
        let mut values: Vec<f32> = self.embedding.weight.val().into_data().to_vec().unwrap();
        values.extend(self.output.weight.val().into_data().to_vec::<f32>().unwrap());
        values
    }
}

// ─── Word level ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct WordLevelModel<B: Backend> {
    embedding:       Embedding<B>,
    cell:            RecurrentCell<B>,
    output:          Linear<B>,
    default_context: Param<Tensor<B, 2>>,
}

impl<B: Backend> WordLevelModel<B> {
    pub fn document_loss_with_cache(&self, document: &Document, cache: &SentenceCache) -> Tensor<B, 1> {
        let device = device_of(&self.embedding);
        let mut run = self.cell.run(&device);
        let mut losses = Vec::with_capacity(document.len());

        for (k, sentence) in document.sentences().iter().enumerate() {
            let context = match cache.context_for(k) {
                Some(values) => vec_to_row(values, &device),
                None => self.default_context.val(),
            };

            run.start_sequence();
            let tokens = sentence.tokens();
            let inputs = embed_tokens(&self.embedding, &tokens[..tokens.len() - 1], &device);
            let logits: Vec<Tensor<B, 2>> = (0..sentence.target_count())
                .map(|t| {
                    let x = Tensor::cat(vec![row(&inputs, t), context.clone()], 1);
                    self.output.forward(run.add_input(x))
                })
                .collect();
            losses.push(neg_log_likelihood(Tensor::cat(logits, 0), &tokens[1..]));
        }

        sum_losses(losses, &device)
    }
}

/// Without a cache every sentence reads the default context.
impl<B: Backend> DocumentModel<B> for WordLevelModel<B> {
    fn document_loss(&self, document: &Document) -> Tensor<B, 1> {
        self.document_loss_with_cache(document, &SentenceCache::default())
    }
}
