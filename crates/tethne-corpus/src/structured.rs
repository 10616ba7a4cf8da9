//! Token sequences that keep word order and named contexts.

use std::collections::{BTreeMap, HashMap};

use tethne_common::{Result, TethneError, Value};

use crate::feature::Feature;
use crate::featureset::FeatureSet;

/// A token sequence with named ranges ("sentence", "paragraph", ...).
///
/// Each context is a sorted list of start indices; a chunk runs from one
/// start to the next (or to the end of the sequence).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredFeature {
    tokens: Vec<String>,
    contexts: BTreeMap<String, Vec<usize>>,
}

impl StructuredFeature {
    pub fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens,
            contexts: BTreeMap::new(),
        }
    }

    pub fn with_context(mut self, name: &str, starts: Vec<usize>) -> Result<Self> {
        self.add_context(name, starts)?;
        Ok(self)
    }

    pub fn add_context(&mut self, name: &str, mut starts: Vec<usize>) -> Result<()> {
        starts.sort_unstable();
        starts.dedup();
        if let Some(&last) = starts.last() {
            if last >= self.tokens.len() {
                return Err(TethneError::Inconsistency(format!(
                    "context {name} starts at {last}, past the end of {} tokens",
                    self.tokens.len()
                )));
            }
        }
        self.contexts.insert(name.to_string(), starts);
        Ok(())
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn context_names(&self) -> impl Iterator<Item = &str> {
        self.contexts.keys().map(String::as_str)
    }

    /// Token slices for each range of the named context.
    pub fn context_chunks(&self, name: &str) -> Option<Vec<&[String]>> {
        let starts = self.contexts.get(name)?;
        let mut chunks = Vec::with_capacity(starts.len());
        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(self.tokens.len());
            chunks.push(&self.tokens[start..end]);
        }
        Some(chunks)
    }

    /// Bag-of-tokens view; one count per occurrence.
    pub fn to_feature(&self) -> Feature {
        Feature::from_tokens(self.tokens.iter().map(|t| Value::Text(t.clone())))
    }
}

/// Document id → [`StructuredFeature`], with the same vocabulary and count
/// bookkeeping as [`FeatureSet`].
#[derive(Debug, Clone, Default)]
pub struct StructuredFeatureSet {
    order: Vec<String>,
    features: HashMap<String, StructuredFeature>,
    index: HashMap<String, usize>,
    lookup: Vec<String>,
    counts: Vec<usize>,
    documents: Vec<Vec<String>>,
}

impl StructuredFeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, doc_id: impl Into<String>, feature: StructuredFeature) -> Result<()> {
        let doc_id = doc_id.into();
        if doc_id.is_empty() {
            return Err(TethneError::Inconsistency("feature document id must not be empty".into()));
        }
        if let Some(previous) = self.features.remove(&doc_id) {
            for token in previous.tokens() {
                let id = self.index[token];
                self.counts[id] -= 1;
                self.documents[id].retain(|d| d != &doc_id);
            }
        } else {
            self.order.push(doc_id.clone());
        }
        for token in feature.tokens() {
            let id = match self.index.get(token) {
                Some(&id) => id,
                None => {
                    let id = self.lookup.len();
                    self.index.insert(token.clone(), id);
                    self.lookup.push(token.clone());
                    self.counts.push(0);
                    self.documents.push(Vec::new());
                    id
                }
            };
            self.counts[id] += 1;
            if self.documents[id].last() != Some(&doc_id) {
                self.documents[id].push(doc_id.clone());
            }
        }
        self.features.insert(doc_id, feature);
        Ok(())
    }

    pub fn get(&self, doc_id: &str) -> Option<&StructuredFeature> {
        self.features.get(doc_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StructuredFeature)> {
        self.order.iter().map(move |d| (d.as_str(), &self.features[d]))
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.lookup
    }

    pub fn count(&self, token: &str) -> usize {
        self.index.get(token).map_or(0, |&id| self.counts[id])
    }

    pub fn document_count(&self, token: &str) -> usize {
        self.index.get(token).map_or(0, |&id| self.documents[id].len())
    }

    /// Collapse to an unordered [`FeatureSet`] on the same document ids.
    pub fn to_feature_set(&self) -> Result<FeatureSet> {
        FeatureSet::from_features(self.iter().map(|(doc, f)| (doc.to_string(), f.to_feature())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_context_chunks_split_at_starts() {
        let f = StructuredFeature::new(tokens("a b c d e"))
            .with_context("sentence", vec![3, 0])
            .unwrap();
        let chunks = f.context_chunks("sentence").unwrap();
        let (first, second) = (tokens("a b c"), tokens("d e"));
        assert_eq!(chunks, vec![first.as_slice(), second.as_slice()]);
        assert!(f.context_chunks("paragraph").is_none());
    }

    #[test]
    fn test_context_out_of_bounds_rejected() {
        let result = StructuredFeature::new(tokens("a b")).with_context("sentence", vec![0, 5]);
        assert!(result.is_err());
    }

    #[test]
    fn test_set_counts_occurrences_and_documents() {
        let mut set = StructuredFeatureSet::new();
        set.add("d1", StructuredFeature::new(tokens("the cat the hat"))).unwrap();
        set.add("d2", StructuredFeature::new(tokens("the dog"))).unwrap();
        assert_eq!(set.count("the"), 3);
        assert_eq!(set.document_count("the"), 2);
        assert_eq!(set.vocabulary()[0], "the");
    }

    #[test]
    fn test_to_feature_set_preserves_counts() {
        let mut set = StructuredFeatureSet::new();
        set.add("d1", StructuredFeature::new(tokens("x y x"))).unwrap();
        let flat = set.to_feature_set().unwrap();
        assert_eq!(flat.count(&Value::from("x")), 2.0);
        assert_eq!(flat.doc_ids().collect::<Vec<_>>(), vec!["d1"]);
    }
}
