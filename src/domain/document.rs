// ============================================================
// Layer 3 - Corpus Domain Types
// ============================================================
// The three-level structure every model in this crate consumes:
//
//   Corpus   = ordered list of Documents
//   Document = ordered list of Sentences (discourse order matters)
//   Sentence = token ids, always <s> ... </s>
//
// Sentence order inside a document is the order the context
// strategies thread information in, so it is never reordered.
// Document order inside a corpus is not meaningful; the trainer
// shuffles it every epoch.

use serde::{Deserialize, Serialize};

use crate::domain::vocabulary::{TokenId, END_ID, START_ID};

/// One sentence as token ids, wrapped in start/end sentinels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    tokens: Vec<TokenId>,
}

impl Sentence {
    /// Wrap already-resolved content tokens with `<s>` and `</s>`.
    pub fn from_content(content: impl IntoIterator<Item = TokenId>) -> Self {
        let mut tokens = vec![START_ID];
        tokens.extend(content);
        tokens.push(END_ID);
        Self { tokens }
    }

    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens between the sentinels.
    pub fn content(&self) -> &[TokenId] {
        &self.tokens[1..self.tokens.len() - 1]
    }

    /// Number of positions that are prediction targets.
    /// The first token is only ever an input, never a target.
    pub fn target_count(&self) -> usize {
        self.tokens.len() - 1
    }
}

/// An ordered run of sentences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    sentences: Vec<Sentence>,
}

impl Document {
    pub fn new(sentences: Vec<Sentence>) -> Self {
        Self { sentences }
    }

    pub fn push(&mut self, sentence: Sentence) {
        self.sentences.push(sentence);
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    pub fn into_sentences(self) -> Vec<Sentence> {
        self.sentences
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Sum of (sentence length - 1): the word count perplexity is
    /// normalised by.
    pub fn target_count(&self) -> usize {
        self.sentences.iter().map(Sentence::target_count).sum()
    }

    /// Split into (context, held-out last sentence).
    /// Returns `None` for an empty document.
    pub fn split_last(&self) -> Option<(Document, &Sentence)> {
        let (last, rest) = self.sentences.split_last()?;
        Some((Document::new(rest.to_vec()), last))
    }
}

pub type Corpus = Vec<Document>;

/// Total prediction targets across a corpus.
pub fn corpus_target_count(corpus: &[Document]) -> usize {
    corpus.iter().map(Document::target_count).sum()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_content_adds_sentinels() {
        let s = Sentence::from_content([5, 6]);
        assert_eq!(s.tokens(), &[START_ID, 5, 6, END_ID]);
        assert_eq!(s.content(), &[5, 6]);
        assert_eq!(s.target_count(), 3);
    }

    #[test]
    fn test_empty_content_is_still_a_sentence() {
        let s = Sentence::from_content(std::iter::empty());
        assert_eq!(s.len(), 2);
        assert!(s.content().is_empty());
        assert_eq!(s.target_count(), 1);
    }

    #[test]
    fn test_document_target_count() {
        let doc = Document::new(vec![
            Sentence::from_content([3, 4]),
            Sentence::from_content([5]),
        ]);
        // (4 - 1) + (3 - 1)
        assert_eq!(doc.target_count(), 5);
        assert_eq!(corpus_target_count(&[doc.clone(), doc]), 10);
    }

    #[test]
    fn test_split_last() {
        let doc = Document::new(vec![
            Sentence::from_content([3]),
            Sentence::from_content([4]),
        ]);
        let (context, last) = doc.split_last().unwrap();
        assert_eq!(context.len(), 1);
        assert_eq!(last.content(), &[4]);
        assert!(Document::default().split_last().is_none());
    }
}
