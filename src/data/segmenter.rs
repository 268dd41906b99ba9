// ============================================================
// Layer 4 - Document Segmenter
// ============================================================
// Splits long documents into consecutive, non-overlapping runs
// of at most `max_sentences` sentences.
//
// Why segment?
//   Every document becomes one computation graph. A 200-sentence
//   document means a 200-sentence-deep chain of context vectors
//   and one very long gradient path. Bounding the document length
//   bounds both graph size and back-propagation depth.
//
// Example with max_sentences = 2:
//   Document: s1 s2 s3 s4 s5
//   Chunk 1:  s1 s2
//   Chunk 2:  s3 s4
//   Chunk 3:  s5            (last chunk may be shorter)
//
// Unlike a sliding window there is no overlap: sentence order is
// preserved inside each chunk and no sentence appears twice.

use crate::domain::document::{Corpus, Document};

pub struct Segmenter {
    /// Upper bound on sentences per output document
    max_sentences: usize,
}

impl Segmenter {
    /// # Panics
    /// Panics if `max_sentences` is 0, since no chunk could hold a sentence.
    pub fn new(max_sentences: usize) -> Self {
        assert!(max_sentences > 0, "segment threshold must be at least 1");
        Self { max_sentences }
    }

    pub fn max_sentences(&self) -> usize {
        self.max_sentences
    }

    /// Split one document. Documents at or under the threshold come
    /// back unchanged as a single chunk.
    pub fn segment_document(&self, doc: Document) -> Vec<Document> {
        if doc.len() <= self.max_sentences {
            return vec![doc];
        }
        doc.into_sentences()
            .chunks(self.max_sentences)
            .map(|chunk| Document::new(chunk.to_vec()))
            .collect()
    }

    /// Segment every document of a corpus, keeping corpus order.
    pub fn segment(&self, corpus: Corpus) -> Corpus {
        corpus
            .into_iter()
            .flat_map(|doc| self.segment_document(doc))
            .collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::Sentence;

    fn doc_of(n: u32) -> Document {
        Document::new((0..n).map(|i| Sentence::from_content([10 + i])).collect())
    }

    #[test]
    fn test_long_document_is_chunked() {
        let seg    = Segmenter::new(2);
        let chunks = seg.segment(vec![doc_of(5)]);
        let sizes: Vec<usize> = chunks.iter().map(Document::len).collect();
        assert_eq!(sizes, [2, 2, 1]);
    }

    #[test]
    fn test_short_document_is_untouched() {
        let seg = Segmenter::new(5);
        let doc = doc_of(3);
        assert_eq!(seg.segment(vec![doc.clone()]), vec![doc]);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_tail() {
        let seg    = Segmenter::new(3);
        let chunks = seg.segment(vec![doc_of(6)]);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|d| d.len() == 3));
    }

    #[test]
    fn test_order_and_count_preserved() {
        let seg      = Segmenter::new(2);
        let original = doc_of(7);
        let rejoined: Vec<Sentence> = seg
            .segment(vec![original.clone()])
            .into_iter()
            .flat_map(Document::into_sentences)
            .collect();
        assert_eq!(rejoined, original.sentences());
    }

    #[test]
    fn test_segmentation_is_idempotent() {
        let seg    = Segmenter::new(3);
        let corpus = vec![doc_of(1), doc_of(4), doc_of(10)];
        let once   = seg.segment(corpus);
        let twice  = seg.segment(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_corpus_order_is_kept() {
        let seg    = Segmenter::new(1);
        let chunks = seg.segment(vec![doc_of(2), doc_of(1)]);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].sentences()[0].content(), &[10]);
        assert_eq!(chunks[1].sentences()[0].content(), &[11]);
        assert_eq!(chunks[2].sentences()[0].content(), &[10]);
    }

    #[test]
    #[should_panic]
    fn test_zero_threshold_is_rejected() {
        let _ = Segmenter::new(0);
    }
}
