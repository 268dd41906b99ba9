// ============================================================
// Layer 5 - Learners
// ============================================================
// A learner pairs a strategy's parameters with their optimiser(s)
// and implements the burn-free DocumentLearner seam the control
// loop drives:
//
//   ModelLearner         one parameter set, one schedule
//                        (flat, hidden, output, attention)
//
//   HierarchicalLearner  two parameter sets, two schedules,
//                        stepped sentence level first
//
// `build_learner` is the only place a ContextStrategy is matched
// on to pick an implementation.

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::marker::PhantomData;

use crate::domain::{document::Document, strategy::ContextStrategy, traits::DocumentLearner};
use crate::infra::checkpoint::{
    CheckpointManager, MODEL_FILE, SENTENCE_MODEL_FILE, WORD_MODEL_FILE,
};
use crate::ml::{
    config::{ModelConfig, OptimConfig},
    hierarchical::{SentenceLevelModel, WordLevelModel},
    model::{scalar, DocumentModel},
    schedule::LearningSchedule,
    InnerBackend, TrainBackend,
};

// ─── Single parameter set ─────────────────────────────────────────────────────
pub struct ModelLearner<B, M, O> {
    model:       M,
    schedule:    LearningSchedule<O>,
    checkpoints: CheckpointManager,
    _backend:    PhantomData<B>,
}

impl<B, M, O> ModelLearner<B, M, O>
where
    B: AutodiffBackend,
    M: DocumentModel<B> + AutodiffModule<B>,
    M::InnerModule: DocumentModel<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    pub fn new(model: M, schedule: LearningSchedule<O>, checkpoints: CheckpointManager) -> Self {
        Self { model, schedule, checkpoints, _backend: PhantomData }
    }
}

impl<B, M, O> DocumentLearner for ModelLearner<B, M, O>
where
    B: AutodiffBackend,
    M: DocumentModel<B> + AutodiffModule<B>,
    M::InnerModule: DocumentModel<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    fn train_document(&mut self, document: &Document) -> Result<f64> {
        let loss  = self.model.document_loss(document);
        let value = scalar(loss.clone());

        let grads = GradientsParams::from_grads(loss.backward(), &self.model);
        self.model = self.schedule.update::<B, M>(self.model.clone(), grads);
        Ok(value)
    }

    fn evaluate(&self, documents: &[Document]) -> Result<Vec<f64>> {
        let model = self.model.valid();
        Ok(documents.iter().map(|d| scalar(model.document_loss(d))).collect())
    }

    fn end_epoch(&mut self) {
        self.schedule.update_epoch();
    }

    fn checkpoint(&self) -> Result<()> {
        self.checkpoints.save_module::<B, M>(MODEL_FILE, &self.model)
    }
}

// ─── Two parameter sets ───────────────────────────────────────────────────────
pub struct HierarchicalLearner<B: AutodiffBackend, OS, OW> {
    sentence:          SentenceLevelModel<B>,
    word:              WordLevelModel<B>,
    sentence_schedule: LearningSchedule<OS>,
    word_schedule:     LearningSchedule<OW>,
    checkpoints:       CheckpointManager,
}

impl<B, OS, OW> HierarchicalLearner<B, OS, OW>
where
    B: AutodiffBackend,
    OS: Optimizer<SentenceLevelModel<B>, B>,
    OW: Optimizer<WordLevelModel<B>, B>,
{
    pub fn new(
        sentence:          SentenceLevelModel<B>,
        word:              WordLevelModel<B>,
        sentence_schedule: LearningSchedule<OS>,
        word_schedule:     LearningSchedule<OW>,
        checkpoints:       CheckpointManager,
    ) -> Self {
        Self { sentence, word, sentence_schedule, word_schedule, checkpoints }
    }

    pub fn sentence_model(&self) -> &SentenceLevelModel<B> {
        &self.sentence
    }
}

impl<B, OS, OW> DocumentLearner for HierarchicalLearner<B, OS, OW>
where
    B: AutodiffBackend,
    OS: Optimizer<SentenceLevelModel<B>, B>,
    OW: Optimizer<WordLevelModel<B>, B>,
{
    /// Reports the word-level loss.
    fn train_document(&mut self, document: &Document) -> Result<f64> {
        // Phase 1: sentence level, stepped first; its states are copied
        // out before the word level reads them.
        let pass = self.sentence.forward_document(document)?;
        if let Some(loss) = pass.loss {
            let grads = GradientsParams::from_grads(loss.backward(), &self.sentence);
            self.sentence = self
                .sentence_schedule
                .update::<B, SentenceLevelModel<B>>(self.sentence.clone(), grads);
        }

        // Phase 2: word level
        let loss  = self.word.document_loss_with_cache(document, &pass.cache);
        let value = scalar(loss.clone());
        let grads = GradientsParams::from_grads(loss.backward(), &self.word);
        self.word = self
            .word_schedule
            .update::<B, WordLevelModel<B>>(self.word.clone(), grads);

        Ok(value)
    }

    fn evaluate(&self, documents: &[Document]) -> Result<Vec<f64>> {
        let sentence = self.sentence.valid();
        let word = self.word.valid();
        documents
            .iter()
            .map(|d| {
                let pass = sentence.forward_document(d)?;
                Ok(scalar(word.document_loss_with_cache(d, &pass.cache)))
            })
            .collect()
    }

    fn end_epoch(&mut self) {
        self.sentence_schedule.update_epoch();
        self.word_schedule.update_epoch();
    }

    fn checkpoint(&self) -> Result<()> {
        self.checkpoints
            .save_module::<B, SentenceLevelModel<B>>(SENTENCE_MODEL_FILE, &self.sentence)?;
        self.checkpoints
            .save_module::<B, WordLevelModel<B>>(WORD_MODEL_FILE, &self.word)
    }
}

// ─── Factory ──────────────────────────────────────────────────────────────────
type TrainDevice = <TrainBackend as Backend>::Device;

fn single<M>(
    model:       M,
    optim:       &OptimConfig,
    checkpoints: CheckpointManager,
    resume:      bool,
    device:      &TrainDevice,
) -> Result<Box<dyn DocumentLearner>>
where
    M: DocumentModel<TrainBackend> + AutodiffModule<TrainBackend> + 'static,
    M::InnerModule: DocumentModel<InnerBackend>,
{
    let model = if resume {
        checkpoints.load_module::<TrainBackend, M>(MODEL_FILE, model, device)?
    } else {
        model
    };
    let schedule = LearningSchedule::new(
        optim.sgd().init::<TrainBackend, M>(),
        optim.lr,
        optim.lr_decay,
    );
    Ok(Box::new(ModelLearner::new(model, schedule, checkpoints)))
}

/// Builds the learner for `strategy`. With `resume`, parameters are
/// restored from `checkpoints` before the learner is returned.
pub fn build_learner(
    strategy:    ContextStrategy,
    model:       &ModelConfig,
    optim:       &OptimConfig,
    checkpoints: CheckpointManager,
    resume:      bool,
    device:      &TrainDevice,
) -> Result<Box<dyn DocumentLearner>> {
    tracing::info!(
        "Building {} model: layers={} input={} hidden={} vocab={}",
        strategy, model.layers, model.input_dim, model.hidden_dim, model.vocab_size,
    );
    match strategy {
        ContextStrategy::Flat      => single(model.init_flat::<TrainBackend>(device), optim, checkpoints, resume, device),
        ContextStrategy::Hidden    => single(model.init_hidden::<TrainBackend>(device), optim, checkpoints, resume, device),
        ContextStrategy::Output    => single(model.init_output::<TrainBackend>(device), optim, checkpoints, resume, device),
        ContextStrategy::Attention => single(model.init_attention::<TrainBackend>(device), optim, checkpoints, resume, device),
        ContextStrategy::Hierarchical => {
            let mut sentence = model.init_sentence_level::<TrainBackend>(device);
            let mut word = model.init_word_level::<TrainBackend>(device);
            if resume {
                sentence = checkpoints.load_module::<TrainBackend, _>(SENTENCE_MODEL_FILE, sentence, device)?;
                word = checkpoints.load_module::<TrainBackend, _>(WORD_MODEL_FILE, word, device)?;
            }
            let sentence_schedule = LearningSchedule::new(
                optim.sgd().init::<TrainBackend, SentenceLevelModel<TrainBackend>>(),
                optim.lr,
                optim.lr_decay,
            );
            let word_schedule = LearningSchedule::new(
                optim.sgd().init::<TrainBackend, WordLevelModel<TrainBackend>>(),
                optim.lr,
                optim.lr_decay,
            );
            Ok(Box::new(HierarchicalLearner::new(
                sentence,
                word,
                sentence_schedule,
                word_schedule,
                checkpoints,
            )))
        }
    }
}
