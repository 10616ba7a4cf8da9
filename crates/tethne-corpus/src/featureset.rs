//! Sparse per-document features with a shared vocabulary.
//!
//! A `FeatureSet` maps document ids (always the primary keys of the owning
//! corpus) to [`Feature`]s, and maintains alongside them:
//!
//! - a vocabulary `element → id` and its inverse, ids assigned in
//!   first-encounter order,
//! - `counts[e]`, the sum of `e`'s count over all documents,
//! - `documents[e]`, the documents containing `e` (and its length, the
//!   document frequency).

use std::collections::{HashMap, HashSet};

use tethne_common::{Result, TethneError, Value};

use crate::feature::Feature;

/// How elements are scored by [`FeatureSet::top`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ranking {
    #[default]
    Count,
    TfIdf,
}

/// `(row, column, value)` triplets plus the row and column labels.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    pub triplets: Vec<(usize, usize, f64)>,
    pub rows: Vec<String>,
    pub columns: Vec<Value>,
}

impl SparseMatrix {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    order: Vec<String>,
    features: HashMap<String, Feature>,
    index: HashMap<Value, usize>,
    lookup: Vec<Value>,
    counts: Vec<f64>,
    documents: Vec<Vec<String>>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_features<I, S>(features: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Feature)>,
        S: Into<String>,
    {
        let mut set = FeatureSet::new();
        for (doc, feature) in features {
            set.add(doc, feature)?;
        }
        Ok(set)
    }

    /// Register (or replace) a document's feature.
    ///
    /// All checks run before any state changes, so a failed call leaves the
    /// set untouched.
    pub fn add(&mut self, doc_id: impl Into<String>, feature: Feature) -> Result<()> {
        let doc_id = doc_id.into();
        if doc_id.is_empty() {
            return Err(TethneError::Inconsistency("feature document id must not be empty".into()));
        }
        for (element, count) in feature.iter() {
            if !count.is_finite() || count < 0.0 {
                return Err(TethneError::Inconsistency(format!(
                    "document {doc_id}: count for {element} must be non-negative, got {count}"
                )));
            }
        }

        if let Some(previous) = self.features.remove(&doc_id) {
            for (element, count) in previous.iter() {
                let id = self.index[element];
                self.counts[id] -= count;
                self.documents[id].retain(|d| d != &doc_id);
            }
        } else {
            self.order.push(doc_id.clone());
        }

        for (element, count) in feature.iter() {
            let id = self.intern(element);
            self.counts[id] += count;
            self.documents[id].push(doc_id.clone());
        }
        self.features.insert(doc_id, feature);
        Ok(())
    }

    fn intern(&mut self, element: &Value) -> usize {
        if let Some(&id) = self.index.get(element) {
            return id;
        }
        let id = self.lookup.len();
        self.index.insert(element.clone(), id);
        self.lookup.push(element.clone());
        self.counts.push(0.0);
        self.documents.push(Vec::new());
        id
    }

    pub fn get(&self, doc_id: &str) -> Option<&Feature> {
        self.features.get(doc_id)
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.features.contains_key(doc_id)
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Document ids in insertion order.
    pub fn doc_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Feature)> {
        self.order.iter().map(move |d| (d.as_str(), &self.features[d]))
    }

    pub fn vocabulary_len(&self) -> usize {
        self.lookup.len()
    }

    pub fn element_id(&self, element: &Value) -> Option<usize> {
        self.index.get(element).copied()
    }

    pub fn element(&self, id: usize) -> Option<&Value> {
        self.lookup.get(id)
    }

    /// Vocabulary in id order.
    pub fn elements(&self) -> &[Value] {
        &self.lookup
    }

    pub fn count(&self, element: &Value) -> f64 {
        self.element_id(element).map_or(0.0, |id| self.counts[id])
    }

    pub fn document_count(&self, element: &Value) -> usize {
        self.element_id(element).map_or(0, |id| self.documents[id].len())
    }

    pub fn documents_with(&self, element: &Value) -> &[String] {
        match self.element_id(element) {
            Some(id) => &self.documents[id],
            None => &[],
        }
    }

    /// Smoothed inverse document frequency, `ln((1 + N) / (1 + df)) + 1`.
    pub fn idf(&self, element: &Value) -> f64 {
        let n = self.len() as f64;
        let df = self.document_count(element) as f64;
        ((1.0 + n) / (1.0 + df)).ln() + 1.0
    }

    /// Pointwise rewrite: `f(element, count, total, df)`. `None`, zero or a
    /// negative result drops the pair; documents left empty are kept empty.
    pub fn transform<F>(&self, f: F) -> FeatureSet
    where
        F: Fn(&Value, f64, f64, usize) -> Option<f64>,
    {
        let mut out = FeatureSet::new();
        for (doc, feature) in self.iter() {
            let pairs: Vec<(Value, f64)> = feature
                .iter()
                .filter_map(|(element, count)| {
                    let id = self.index[element];
                    f(element, count, self.counts[id], self.documents[id].len())
                        .filter(|v| v.is_finite() && *v > 0.0)
                        .map(|v| (element.clone(), v))
                })
                .collect();
            // Elements are unique and values validated above, so this cannot fail.
            if let Ok(feature) = Feature::new(pairs) {
                let _ = out.add(doc, feature);
            }
        }
        out
    }

    /// `tf * idf` reweighting.
    pub fn tfidf(&self) -> FeatureSet {
        let n = self.len() as f64;
        self.transform(|_, tf, _, df| Some(tf * (((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)))
    }

    /// The `n` highest-scoring elements; ties go to the lower vocabulary id.
    pub fn top(&self, n: usize, ranking: Ranking) -> Vec<(Value, f64)> {
        let mut scored: Vec<(usize, f64)> = (0..self.lookup.len())
            .map(|id| {
                let score = match ranking {
                    Ranking::Count => self.counts[id],
                    Ranking::TfIdf => self.counts[id] * self.idf(&self.lookup[id]),
                };
                (id, score)
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored
            .into_iter()
            .take(n)
            .map(|(id, score)| (self.lookup[id].clone(), score))
            .collect()
    }

    /// Sparse export with rows in document order and columns in vocabulary order.
    pub fn as_matrix(&self) -> SparseMatrix {
        let mut triplets = Vec::new();
        for (row, (_, feature)) in self.iter().enumerate() {
            for (element, count) in feature.iter() {
                triplets.push((row, self.index[element], count));
            }
        }
        SparseMatrix {
            triplets,
            rows: self.order.clone(),
            columns: self.lookup.clone(),
        }
    }

    /// A new set holding only the listed documents.
    pub fn restrict<'a>(&self, doc_ids: impl IntoIterator<Item = &'a str>) -> FeatureSet {
        let wanted: HashSet<&str> = doc_ids.into_iter().collect();
        let mut out = FeatureSet::new();
        for (doc, feature) in self.iter() {
            if wanted.contains(doc) {
                let _ = out.add(doc, feature.clone());
            }
        }
        out
    }
}
