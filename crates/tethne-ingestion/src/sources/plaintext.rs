//! Directories of plain-text documents, one `.txt` file per paper.
//!
//! The file stem is the paper's identifier (its `ayjid` and title); the
//! full text is kept in the `text` extra so it can be indexed as a feature.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tethne_common::{Paper, Result, TethneError, Value};
use tethne_corpus::{Corpus, StructuredFeature, StructuredFeatureSet, WordTokenizer};
use tracing::{debug, instrument, warn};

use super::Reader;

/// Extra field holding the document text.
pub const TEXT_FIELD: &str = "text";

pub struct PlainTextReader {
    tokenizer: WordTokenizer,
    sentence_end: Regex,
    paragraph_break: Regex,
}

impl PlainTextReader {
    pub fn new() -> Result<Self> {
        Self::with_tokenizer(WordTokenizer::new()?)
    }

    pub fn with_tokenizer(tokenizer: WordTokenizer) -> Result<Self> {
        let compile = |p: &str| Regex::new(p).map_err(|e| TethneError::Config(e.to_string()));
        Ok(Self {
            tokenizer,
            sentence_end: compile(r"[.!?]+(?:\s+|$)")?,
            paragraph_break: compile(r"\n\s*\n")?,
        })
    }

    fn text_files(dir: &Path) -> Result<Vec<PathBuf>> {
        if dir.is_file() {
            return Ok(vec![dir.to_path_buf()]);
        }
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("txt")))
            .collect();
        files.sort();
        Ok(files)
    }

    fn stem(path: &Path) -> Option<String> {
        path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
    }

    /// Tokens of one document with `paragraph` and `sentence` contexts.
    pub fn structure(&self, text: &str) -> Result<StructuredFeature> {
        let mut tokens = Vec::new();
        let mut paragraphs = Vec::new();
        let mut sentences = Vec::new();
        for paragraph in self.paragraph_break.split(text) {
            let start = tokens.len();
            for sentence in self.sentence_end.split(paragraph) {
                let words = self.tokenizer.words(sentence);
                if !words.is_empty() {
                    sentences.push(tokens.len());
                    tokens.extend(words);
                }
            }
            if tokens.len() > start {
                paragraphs.push(start);
            }
        }
        StructuredFeature::new(tokens)
            .with_context("paragraph", paragraphs)?
            .with_context("sentence", sentences)
    }

    /// Structured token sequences for every file, keyed by file stem.
    /// Unreadable files are skipped with a warning.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub fn structured_text(&self, dir: &Path) -> Result<StructuredFeatureSet> {
        let mut set = StructuredFeatureSet::new();
        for file in Self::text_files(dir)? {
            let Some(stem) = Self::stem(&file) else { continue };
            match fs::read_to_string(&file) {
                Ok(text) => set.add(stem, self.structure(&text)?)?,
                Err(e) => warn!(file = %file.display(), error = %e, "skipping unreadable text file"),
            }
        }
        debug!(documents = set.len(), vocabulary = set.vocabulary().len(), "built structured text");
        Ok(set)
    }

    /// Attach the structured `text` set and its bag-of-words `wordcounts`
    /// view, re-keyed from file stem to the corpus's primary key.
    pub fn attach_text(&self, corpus: &mut Corpus, dir: &Path) -> Result<()> {
        let by_stem = self.structured_text(dir)?;
        let keys: HashMap<String, String> = corpus
            .entries()
            .map(|(key, paper)| (paper.fingerprint(), key.to_string()))
            .collect();
        let mut set = StructuredFeatureSet::new();
        for (stem, feature) in by_stem.iter() {
            match keys.get(stem) {
                Some(key) => set.add(key.clone(), feature.clone())?,
                None => debug!(%stem, "text for a document outside the corpus"),
            }
        }
        let counts = set.to_feature_set()?;
        corpus.add_structured_feature_set(TEXT_FIELD, set)?;
        corpus.add_feature_set("wordcounts", counts)
    }
}

impl Reader for PlainTextReader {
    fn name(&self) -> &'static str {
        "plaintext"
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn parse(&self, path: &Path) -> Result<Vec<Paper>> {
        let mut papers = Vec::new();
        for file in Self::text_files(path)? {
            let Some(stem) = Self::stem(&file) else {
                warn!(file = %file.display(), "file name is not valid UTF-8");
                continue;
            };
            let text = fs::read_to_string(&file)?;
            let mut paper = Paper::new();
            paper.ayjid = Some(stem.clone());
            paper.atitle = Some(stem);
            paper.uri = Some(file.display().to_string());
            paper.extras.insert(TEXT_FIELD.into(), Value::Text(text));
            papers.push(paper);
        }
        Ok(papers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tethne_common::Field;
    use tethne_test_utils::{scratch_dir, write_file};

    #[test]
    fn test_structure_records_sentences_and_paragraphs() {
        let reader = PlainTextReader::new().unwrap();
        let feature = reader
            .structure("Embryos grow. Cells divide quickly!\n\nGenes regulate development.")
            .unwrap();
        assert_eq!(feature.tokens(), ["embryos", "grow", "cells", "divide", "quickly", "genes", "regulate", "development"]);
        let sentences = feature.context_chunks("sentence").unwrap();
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[1], ["cells", "divide", "quickly"]);
        let paragraphs = feature.context_chunks("paragraph").unwrap();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[1], ["genes", "regulate", "development"]);
    }

    #[test]
    fn test_read_directory_and_attach_text() {
        let dir = scratch_dir();
        write_file(dir.path(), "alpha.txt", "Networks of genes.\n\nNetworks of cells.");
        write_file(dir.path(), "beta.txt", "Fossil records.");
        write_file(dir.path(), "notes.md", "ignored");

        let reader = PlainTextReader::new().unwrap();
        let mut corpus = reader.read_corpus(dir.path(), &Default::default()).unwrap();
        assert_eq!(corpus.len(), 2);
        assert!(corpus.contains_key("alpha"));
        assert!(corpus.get("beta").unwrap().get(&Field::Extra(TEXT_FIELD.into())).is_some());

        reader.attach_text(&mut corpus, dir.path()).unwrap();
        let counts = corpus.feature_set("wordcounts").unwrap();
        assert_eq!(counts.get("alpha").unwrap().get(&Value::text("networks")), Some(2.0));
        assert_eq!(corpus.structured_feature_set(TEXT_FIELD).unwrap().len(), 2);
    }
}
