// ============================================================
// Layer 4 - Corpus Loader
// ============================================================
// Reads a plain-text corpus file, one sentence per line:
//
//   whitespace-tokenised text             → one Sentence
//   a line starting with the delimiter    → end of the current Document
//   blank line                            → skipped (logged)
//
// Example with delimiter '=':
//
//   a b          ┐
//   c            ┘ document 1
//   =
//   d            ┐ document 2 (no trailing delimiter needed)
//
// Loading is best-effort: empty documents and blank lines are
// warned about and skipped, never fatal. A missing file is fatal.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
};

use anyhow::{Context, Result};

use crate::domain::document::{Corpus, Document, Sentence};
use crate::domain::traits::DocumentSource;
use crate::domain::vocabulary::{Vocabulary, END_TOKEN, START_TOKEN};

/// Default document delimiter character.
pub const DEFAULT_DELIMITER: char = '=';

/// Loads one delimited corpus file.
/// Implements the DocumentSource trait from Layer 3.
pub struct CorpusLoader {
    path: PathBuf,
    delimiter: char,
}

impl CorpusLoader {
    pub fn new(path: impl Into<PathBuf>, delimiter: char) -> Self {
        Self { path: path.into(), delimiter }
    }

    /// Parse an already-open reader. Split out from `load_all` so the
    /// parsing rules can be exercised on in-memory text.
    pub fn parse<R: BufRead>(
        &self,
        reader: R,
        vocab: &mut Vocabulary,
        update: bool,
    ) -> Result<Corpus> {
        let mut corpus = Corpus::new();
        let mut doc = Document::default();
        let mut lines = 0usize;
        let mut tokens = 0usize;

        for (lineno, line) in reader.lines().enumerate() {
            let line = line.with_context(|| {
                format!("Cannot read line {} of '{}'", lineno + 1, self.path.display())
            })?;
            lines += 1;

            if line.starts_with(self.delimiter) {
                if doc.is_empty() {
                    tracing::warn!("Empty document before line {}", lineno + 1);
                } else {
                    corpus.push(std::mem::take(&mut doc));
                }
                continue;
            }

            if line.trim().is_empty() {
                tracing::warn!("Skipping blank line {}", lineno + 1);
                continue;
            }

            let sentence = read_sentence(&line, vocab, update);
            tokens += sentence.len();
            doc.push(sentence);
        }

        // A trailing document without a closing delimiter still counts
        if !doc.is_empty() {
            corpus.push(doc);
        }

        tracing::info!(
            "{} docs, {} lines, {} tokens, {} types",
            corpus.len(),
            lines,
            tokens,
            vocab.len()
        );
        Ok(corpus)
    }
}

impl DocumentSource for CorpusLoader {
    fn load_all(&self, vocab: &mut Vocabulary, update: bool) -> Result<Corpus> {
        tracing::info!("Reading data from '{}'", self.path.display());
        let file = File::open(&self.path)
            .with_context(|| format!("Cannot open corpus file '{}'", self.path.display()))?;
        self.parse(BufReader::new(file), vocab, update)
    }
}

/// Whitespace-split a line, resolve every word, and wrap the result
/// in sentinels. With `update` off, unseen words become UNK even when
/// the vocabulary itself is still mutable.
///
/// Lines that already spell out `<s>` / `</s>` at their edges are
/// not wrapped a second time.
pub fn read_sentence(line: &str, vocab: &mut Vocabulary, update: bool) -> Sentence {
    let mut words: Vec<&str> = line.split_whitespace().collect();
    if words.last() == Some(&END_TOKEN) {
        words.pop();
    }
    if words.first() == Some(&START_TOKEN) {
        words.remove(0);
    }

    let ids: Vec<_> = words
        .into_iter()
        .map(|word| {
            if update {
                vocab.convert(word)
            } else {
                vocab.lookup(word)
            }
        })
        .collect();
    Sentence::from_content(ids)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vocabulary::UNK_ID;

    fn words(vocab: &Vocabulary, sentence: &Sentence) -> Vec<String> {
        sentence
            .tokens()
            .iter()
            .map(|&id| vocab.word(id).unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_two_documents_split_on_delimiter() {
        let text = "a b\nc\n=\nd\n";
        let loader = CorpusLoader::new("inline", '=');
        let mut vocab = Vocabulary::new();
        let corpus = loader.parse(text.as_bytes(), &mut vocab, true).unwrap();

        assert_eq!(corpus.len(), 2);
        let doc1 = &corpus[0];
        assert_eq!(doc1.len(), 2);
        assert_eq!(words(&vocab, &doc1.sentences()[0]), ["<s>", "a", "b", "</s>"]);
        assert_eq!(words(&vocab, &doc1.sentences()[1]), ["<s>", "c", "</s>"]);
        let doc2 = &corpus[1];
        assert_eq!(doc2.len(), 1);
        assert_eq!(words(&vocab, &doc2.sentences()[0]), ["<s>", "d", "</s>"]);
    }

    #[test]
    fn test_pre_wrapped_lines_are_not_wrapped_twice() {
        let text = "<s> a b </s>\n<s> c </s>\n=\n<s> d </s>\n";
        let loader = CorpusLoader::new("inline", '=');
        let mut vocab = Vocabulary::new();
        let corpus = loader.parse(text.as_bytes(), &mut vocab, true).unwrap();

        assert_eq!(corpus.len(), 2);
        assert_eq!(words(&vocab, &corpus[0].sentences()[0]), ["<s>", "a", "b", "</s>"]);
        assert_eq!(words(&vocab, &corpus[0].sentences()[1]), ["<s>", "c", "</s>"]);
        assert_eq!(corpus[1].len(), 1);
        assert_eq!(words(&vocab, &corpus[1].sentences()[0]), ["<s>", "d", "</s>"]);
        // reserved entries plus a, b, c, d
        assert_eq!(vocab.len(), 3 + 4);
    }

    #[test]
    fn test_bare_sentinel_line_is_an_empty_sentence() {
        let mut vocab = Vocabulary::new();
        let s = read_sentence("<s> </s>", &mut vocab, true);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_empty_documents_are_dropped() {
        let text = "=\n=\na\n=\n=\n";
        let loader = CorpusLoader::new("inline", '=');
        let mut vocab = Vocabulary::new();
        let corpus = loader.parse(text.as_bytes(), &mut vocab, true).unwrap();
        assert_eq!(corpus.len(), 1);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let text = "a\n\n   \nb\n";
        let loader = CorpusLoader::new("inline", '=');
        let mut vocab = Vocabulary::new();
        let corpus = loader.parse(text.as_bytes(), &mut vocab, true).unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus[0].len(), 2);
    }

    #[test]
    fn test_no_update_maps_unseen_to_unk() {
        let loader = CorpusLoader::new("inline", '=');
        let mut vocab = Vocabulary::new();
        loader.parse("seen\n".as_bytes(), &mut vocab, true).unwrap();
        vocab.freeze();

        let corpus = loader.parse("seen unseen\n".as_bytes(), &mut vocab, false).unwrap();
        let tokens = corpus[0].sentences()[0].tokens();
        assert_eq!(tokens[1], vocab.lookup("seen"));
        assert_eq!(tokens[2], UNK_ID);
        assert_eq!(vocab.len(), 4);
    }

    #[test]
    fn test_custom_delimiter() {
        let text = "a\n# doc end\nb\n";
        let loader = CorpusLoader::new("inline", '#');
        let mut vocab = Vocabulary::new();
        let corpus = loader.parse(text.as_bytes(), &mut vocab, true).unwrap();
        assert_eq!(corpus.len(), 2);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let loader = CorpusLoader::new("/definitely/not/here.txt", '=');
        let mut vocab = Vocabulary::new();
        assert!(loader.load_all(&mut vocab, true).is_err());
    }
}
