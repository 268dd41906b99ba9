// ============================================================
// Layer 5 - Attentional context strategy
// ============================================================
// Every earlier sentence leaves one memory entry: the concatenation
// of all layers' final states. Before each word the model attends
// over that memory:
//
//   memory size 0  → c = learned empty vector
//   memory size 1  → c = the single entry
//   memory size n  → e_i = va · tanh(Ua m_i + Wa s_{t-1})
//                    a   = softmax(e)
//                    c   = Σ a_i m_i
//
// At t = 0 there is no decoder state yet, so the Wa term is left
// out. The cell input is [E(w_t) ; c_t] and the output is
//
//   logits_t = R tanh(h_t + Q c_t + P x_t) + bias
//
// Reference: Bahdanau et al. (2015) Neural Machine Translation by
//            Jointly Learning to Align and Translate

use burn::{
    module::Param,
    nn::{Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
    tensor::{
        activation::{softmax, tanh},
        Distribution,
    },
};

use crate::domain::document::Document;
use crate::ml::{
    cell::RecurrentCell,
    config::ModelConfig,
    model::{device_of, embed_tokens, neg_log_likelihood, row, sum_losses, DocumentModel},
};

#[derive(Module, Debug)]
pub struct AttentionalModel<B: Backend> {
    embedding:     Embedding<B>,
    cell:          RecurrentCell<B>,
    /// R (with bias): hidden → vocab
    output:        Linear<B>,
    /// Q: context → hidden
    context_out:   Linear<B>,
    /// P: input → hidden
    input_out:     Linear<B>,
    /// Wa: decoder state → alignment
    state_align:   Linear<B>,
    /// Ua: memory entry → alignment
    memory_align:  Linear<B>,
    /// va: alignment → score
    score:         Linear<B>,
    empty_context: Param<Tensor<B, 2>>,
}

/// Memory entries stacked once per sentence, with their alignment
/// projection precomputed when attention will actually be used.
pub struct SentenceMemory<B: Backend> {
    entries: Vec<Tensor<B, 2>>,
    /// ([n, ctx], Ua·memory as [n, align]); set when n ≥ 2.
    stacked: Option<(Tensor<B, 2>, Tensor<B, 2>)>,
}

impl<B: Backend> SentenceMemory<B> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Context vector for one step plus the attention weights that
/// produced it, when attention ran.
pub struct Attended<B: Backend> {
    pub context: Tensor<B, 2>,
    /// [n, 1]; `None` for memories of size 0 or 1.
    pub weights: Option<Tensor<B, 2>>,
}

impl ModelConfig {
    pub fn init_attention<B: Backend>(&self, device: &B::Device) -> AttentionalModel<B> {
        let ctx = self.stacked_state_dim();
        let no_bias = |d_in: usize, d_out: usize| {
            LinearConfig::new(d_in, d_out).with_bias(false).init(device)
        };
        AttentionalModel {
            embedding:    EmbeddingConfig::new(self.vocab_size, self.input_dim).init(device),
            cell:         RecurrentCell::new(self.layers, self.input_dim + ctx, self.hidden_dim, device),
            output:       LinearConfig::new(self.hidden_dim, self.vocab_size).init(device),
            context_out:  no_bias(ctx, self.hidden_dim),
            input_out:    no_bias(self.input_dim, self.hidden_dim),
            state_align:  no_bias(ctx, self.align_dim),
            memory_align: no_bias(ctx, self.align_dim),
            score:        no_bias(self.align_dim, 1),
            empty_context: Param::from_tensor(Tensor::random(
                [1, ctx],
                Distribution::Uniform(-0.1, 0.1),
                device,
            )),
        }
    }
}

impl<B: Backend> AttentionalModel<B> {
    /// Freezes the memory for the sentence about to be read.
    pub fn prepare_memory(&self, entries: &[Tensor<B, 2>]) -> SentenceMemory<B> {
        let stacked = (entries.len() >= 2).then(|| {
            let memory = Tensor::cat(entries.to_vec(), 0);
            let projected = self.memory_align.forward(memory.clone());
            (memory, projected)
        });
        SentenceMemory { entries: entries.to_vec(), stacked }
    }

    /// `previous` is the concatenated decoder state of the last step,
    /// or `None` at the first word of a sentence.
    pub fn attend(&self, memory: &SentenceMemory<B>, previous: Option<Tensor<B, 2>>) -> Attended<B> {
        let Some((stacked, projected)) = &memory.stacked else {
            let context = match memory.entries.first() {
                Some(only) => only.clone(),
                None => self.empty_context.val(),
            };
            return Attended { context, weights: None };
        };

        let [n, align] = projected.dims();
        let mut energy = projected.clone();
        if let Some(state) = previous {
            energy = energy + self.state_align.forward(state).expand([n, align]);
        }
        let scores  = self.score.forward(tanh(energy)); // [n, 1]
        let weights = softmax(scores, 0);
        let context = weights.clone().transpose().matmul(stacked.clone()); // [1, ctx]

        Attended { context, weights: Some(weights) }
    }

    /// Loss together with the attention weights used at every word
    /// of every sentence.
    pub fn forward_document(
        &self,
        document: &Document,
    ) -> (Tensor<B, 1>, Vec<Vec<Option<Tensor<B, 2>>>>) {
        let device = device_of(&self.embedding);
        let mut run = self.cell.run(&device);
        let mut entries: Vec<Tensor<B, 2>> = Vec::with_capacity(document.len());
        let mut losses = Vec::with_capacity(document.len());
        let mut trace = Vec::with_capacity(document.len());

        for (k, sentence) in document.sentences().iter().enumerate() {
            if k > 0 {
                entries.push(run.final_states());
            }
            run.start_sequence();
            let memory = self.prepare_memory(&entries);

            let tokens = sentence.tokens();
            let inputs = embed_tokens(&self.embedding, &tokens[..tokens.len() - 1], &device);
            let mut logits = Vec::with_capacity(sentence.target_count());
            let mut weights = Vec::with_capacity(sentence.target_count());

            for t in 0..sentence.target_count() {
                let previous = (t > 0).then(|| run.final_states());
                let attended = self.attend(&memory, previous);
                let x = row(&inputs, t);

                let h = run.add_input(Tensor::cat(vec![x.clone(), attended.context.clone()], 1));
                let mixed = tanh(
                    h + self.context_out.forward(attended.context) + self.input_out.forward(x),
                );
                logits.push(self.output.forward(mixed));
                weights.push(attended.weights);
            }

            losses.push(neg_log_likelihood(Tensor::cat(logits, 0), &tokens[1..]));
            trace.push(weights);
        }

        (sum_losses(losses, &device), trace)
    }
}

impl<B: Backend> DocumentModel<B> for AttentionalModel<B> {
    fn document_loss(&self, document: &Document) -> Tensor<B, 1> {
        self.forward_document(document).0
    }
}
