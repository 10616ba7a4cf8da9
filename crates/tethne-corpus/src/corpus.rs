//! The indexed paper collection and its slicing views.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tethne_common::{Field, Paper, Result, TethneError, Value, UNKNOWN_PAPER};
use tracing::{debug, info, warn};

use crate::feature::Feature;
use crate::featureset::{FeatureSet, Ranking};
use crate::structured::{StructuredFeature, StructuredFeatureSet};
use crate::tokenize::{ListTokenizer, Tokenizer};

/// Secondary index: value → positions of the papers holding it.
pub type FieldIndex = BTreeMap<Value, Vec<usize>>;

/// How [`Corpus::slice`] walks an indexed axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceSpec {
    pub key: Field,
    pub window_size: usize,
    /// Defaults to `window_size` (contiguous periods).
    pub step_size: Option<usize>,
    pub cumulative: bool,
}

impl Default for SliceSpec {
    fn default() -> Self {
        Self {
            key: Field::Date,
            window_size: 1,
            step_size: None,
            cumulative: false,
        }
    }
}

impl SliceSpec {
    pub fn yearly() -> Self {
        Self::default()
    }

    pub fn window(window_size: usize) -> Self {
        Self {
            window_size,
            ..Self::default()
        }
    }

    pub fn step(mut self, step_size: usize) -> Self {
        self.step_size = Some(step_size);
        self
    }

    pub fn cumulative(mut self) -> Self {
        self.cumulative = true;
        self
    }

    /// `Point` keys only arise for single-value, non-cumulative windows.
    pub fn is_pointwise(&self) -> bool {
        self.window_size == 1 && !self.cumulative
    }
}

/// Identifies one slice: a single axis value, or the half-open range
/// `[start, end)` a window covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SliceKey {
    Point(i64),
    Range(i64, i64),
}

impl SliceKey {
    pub fn start(&self) -> i64 {
        match *self {
            SliceKey::Point(v) => v,
            SliceKey::Range(start, _) => start,
        }
    }

    /// Exclusive upper bound.
    pub fn end(&self) -> i64 {
        match *self {
            SliceKey::Point(v) => v + 1,
            SliceKey::Range(_, end) => end,
        }
    }
}

impl fmt::Display for SliceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SliceKey::Point(v) => write!(f, "{v}"),
            SliceKey::Range(start, end) => write!(f, "{start}-{end}"),
        }
    }
}

/// Builder for [`Corpus`]; mirrors the construction keywords.
#[derive(Debug, Clone)]
pub struct CorpusBuilder {
    index_by: Field,
    index_fields: Vec<Field>,
    index_features: Vec<Field>,
}

impl Default for CorpusBuilder {
    fn default() -> Self {
        Self {
            index_by: Field::Ayjid,
            index_fields: Vec::new(),
            index_features: Vec::new(),
        }
    }
}

impl CorpusBuilder {
    pub fn index_by(mut self, field: Field) -> Self {
        self.index_by = field;
        self
    }

    pub fn index_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.index_fields = fields.into_iter().collect();
        self
    }

    /// Multi-valued fields (authors, citations, ...) to turn into feature sets.
    pub fn index_features(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.index_features = fields.into_iter().collect();
        self
    }

    pub fn build(self, papers: Vec<Paper>) -> Result<Corpus> {
        for paper in &papers {
            paper.validate()?;
        }
        let mut corpus = Corpus::from_shared(self.index_by, papers.into_iter().map(Arc::new).collect());
        for field in &self.index_fields {
            corpus.index(field)?;
        }
        for field in &self.index_features {
            corpus.index_feature(field, &ListTokenizer, false)?;
        }
        info!(
            papers = corpus.len(),
            duplicates = corpus.duplicate_papers.values().sum::<usize>(),
            index_by = %corpus.index_by,
            "built corpus"
        );
        Ok(corpus)
    }
}

/// An ordered, indexed set of papers with attached feature sets.
///
/// Papers are shared (`Arc`) with every slice taken from this corpus, as are
/// feature sets; slices never mutate either.
#[derive(Debug, Clone)]
pub struct Corpus {
    index_by: Field,
    papers: Vec<Arc<Paper>>,
    keys: Vec<String>,
    primary: HashMap<String, usize>,
    indices: BTreeMap<Field, FieldIndex>,
    features: BTreeMap<String, Arc<FeatureSet>>,
    structured: BTreeMap<String, Arc<StructuredFeatureSet>>,
    duplicate_papers: BTreeMap<String, usize>,
}

impl Corpus {
    /// Index by `ayjid`, no secondary indices, no feature sets.
    pub fn new(papers: Vec<Paper>) -> Result<Self> {
        Self::builder().build(papers)
    }

    pub fn builder() -> CorpusBuilder {
        CorpusBuilder::default()
    }

    fn from_shared(index_by: Field, papers: Vec<Arc<Paper>>) -> Self {
        let mut corpus = Corpus {
            index_by,
            papers: Vec::with_capacity(papers.len()),
            keys: Vec::with_capacity(papers.len()),
            primary: HashMap::new(),
            indices: BTreeMap::new(),
            features: BTreeMap::new(),
            structured: BTreeMap::new(),
            duplicate_papers: BTreeMap::new(),
        };
        for paper in papers {
            let key = corpus.primary_key(&paper);
            let position = corpus.papers.len();
            if corpus.primary.contains_key(&key) {
                debug!(%key, "duplicate primary key");
                *corpus.duplicate_papers.entry(key.clone()).or_insert(0) += 1;
            } else {
                corpus.primary.insert(key.clone(), position);
            }
            corpus.keys.push(key);
            corpus.papers.push(paper);
        }
        corpus
    }

    /// The `index_by` value of a paper, or `UNKNOWN PAPER`.
    pub fn primary_key(&self, paper: &Paper) -> String {
        match paper.get(&self.index_by) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => UNKNOWN_PAPER.to_string(),
        }
    }

    pub fn index_by(&self) -> &Field {
        &self.index_by
    }

    /// First paper registered under `key`.
    pub fn get(&self, key: &str) -> Option<&Paper> {
        self.primary.get(key).map(|&i| self.papers[i].as_ref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.primary.contains_key(key)
    }

    /// All papers, duplicates included, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Paper> {
        self.papers.iter().map(|p| p.as_ref())
    }

    /// `(primary key, paper)` for every paper, duplicates included.
    pub fn iter_keyed(&self) -> impl Iterator<Item = (&str, &Paper)> {
        self.keys.iter().map(String::as_str).zip(self.papers.iter().map(|p| p.as_ref()))
    }

    /// `(primary key, paper)` for the paper each key resolves to, in
    /// insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Paper)> {
        self.keys
            .iter()
            .enumerate()
            .filter(move |(i, key)| self.primary.get(key.as_str()) == Some(i))
            .map(move |(i, key)| (key.as_str(), self.papers[i].as_ref()))
    }

    pub fn paper_at(&self, position: usize) -> Option<&Paper> {
        self.papers.get(position).map(|p| p.as_ref())
    }

    pub fn key_at(&self, position: usize) -> Option<&str> {
        self.keys.get(position).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    pub fn duplicate_papers(&self) -> &BTreeMap<String, usize> {
        &self.duplicate_papers
    }

    fn build_index(&self, field: &Field) -> Result<FieldIndex> {
        let mut index: FieldIndex = BTreeMap::new();
        let mut seen = false;
        for (position, paper) in self.papers.iter().enumerate() {
            let Some(value) = paper.get(field) else { continue };
            seen = true;
            for v in value.flatten() {
                if !v.is_empty() {
                    index.entry(v).or_default().push(position);
                }
            }
        }
        if field.is_extra() && !seen && !self.papers.is_empty() {
            return Err(TethneError::UnknownField(field.to_string()));
        }
        for positions in index.values_mut() {
            positions.dedup();
        }
        Ok(index)
    }

    /// Build (or rebuild) the secondary index on `field`.
    pub fn index(&mut self, field: &Field) -> Result<&FieldIndex> {
        let index = self.build_index(field)?;
        debug!(%field, values = index.len(), "indexed field");
        self.indices.insert(field.clone(), index);
        Ok(&self.indices[field])
    }

    pub fn indices(&self) -> &BTreeMap<Field, FieldIndex> {
        &self.indices
    }

    pub fn index_of(&self, field: &Field) -> Option<&FieldIndex> {
        self.indices.get(field)
    }

    /// Papers whose `field` holds `value` (list members count).
    pub fn papers_by(&self, field: &Field, value: &Value) -> Result<Vec<&Paper>> {
        let positions = match self.indices.get(field) {
            Some(index) => index.get(value).cloned().unwrap_or_default(),
            None => self.build_index(field)?.remove(value).unwrap_or_default(),
        };
        Ok(positions.into_iter().map(|i| self.papers[i].as_ref()).collect())
    }

    /// Source value for a feature on `field`; the `authors` feature uses full
    /// forenames when available.
    fn feature_source(paper: &Paper, field: &Field) -> Option<Value> {
        match field {
            Field::Authors => {
                let elements = paper.author_elements();
                (!elements.is_empty()).then_some(Value::List(elements))
            }
            other => paper.get(other),
        }
    }

    /// Tokenize `field` on every paper and register the result under the
    /// field's name.
    pub fn index_feature<T>(&mut self, field: &Field, tokenizer: &T, structured: bool) -> Result<()>
    where
        T: Tokenizer + ?Sized,
    {
        let name = field.to_string();
        let mut features = FeatureSet::new();
        let mut structured_features = StructuredFeatureSet::new();
        for (key, paper) in self.entries() {
            let Some(value) = Self::feature_source(paper, field) else { continue };
            let tokens = tokenizer.tokenize(&value).map_err(|e| TethneError::Construction {
                paper: key.to_string(),
                message: format!("tokenizing {field}: {e}"),
            })?;
            if structured {
                let tokens = tokens.iter().map(Value::to_string).collect();
                structured_features.add(key, StructuredFeature::new(tokens))?;
            } else {
                features.add(key, Feature::from_tokens(tokens))?;
            }
        }
        if structured {
            debug!(feature = %name, documents = structured_features.len(), "indexed structured feature");
            self.structured.insert(name, Arc::new(structured_features));
        } else {
            debug!(feature = %name, documents = features.len(), vocabulary = features.vocabulary_len(), "indexed feature");
            self.features.insert(name, Arc::new(features));
        }
        Ok(())
    }

    fn check_keys<'a>(&self, name: &str, mut ids: impl Iterator<Item = &'a str>) -> Result<()> {
        if let Some(stray) = ids.find(|id| !self.primary.contains_key(*id)) {
            return Err(TethneError::Inconsistency(format!(
                "feature set {name} has document {stray}, which is not a paper of this corpus"
            )));
        }
        Ok(())
    }

    /// Attach a derived feature set, e.g. a model's `theta`.
    pub fn add_feature_set(&mut self, name: impl Into<String>, set: FeatureSet) -> Result<()> {
        let name = name.into();
        self.check_keys(&name, set.doc_ids())?;
        self.features.insert(name, Arc::new(set));
        Ok(())
    }

    pub fn add_structured_feature_set(&mut self, name: impl Into<String>, set: StructuredFeatureSet) -> Result<()> {
        let name = name.into();
        self.check_keys(&name, set.doc_ids())?;
        self.structured.insert(name, Arc::new(set));
        Ok(())
    }

    pub fn feature_set(&self, name: &str) -> Option<&FeatureSet> {
        self.features.get(name).map(|f| f.as_ref())
    }

    fn require_feature_set(&self, name: &str) -> Result<&FeatureSet> {
        self.feature_set(name)
            .ok_or_else(|| TethneError::NotFound(format!("feature set {name}")))
    }

    pub fn structured_feature_set(&self, name: &str) -> Option<&StructuredFeatureSet> {
        self.structured.get(name).map(|f| f.as_ref())
    }

    pub fn feature_set_names(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    pub fn structured_feature_set_names(&self) -> impl Iterator<Item = &str> {
        self.structured.keys().map(String::as_str)
    }

    /// A feature set restricted to this corpus's own papers. Slices share
    /// their parent's sets, which may cover more documents.
    pub fn local_feature_set(&self, name: &str) -> Result<FeatureSet> {
        let set = self.require_feature_set(name)?;
        Ok(set.restrict(self.primary.keys().map(String::as_str)))
    }

    fn covers_all(&self, set: &FeatureSet) -> bool {
        set.doc_ids().all(|id| self.primary.contains_key(id))
    }

    /// Windows over the sorted integer values of `spec.key`, as paper
    /// positions in insertion order.
    pub(crate) fn windows(&self, spec: &SliceSpec) -> Result<Vec<(SliceKey, Vec<usize>)>> {
        if spec.window_size == 0 {
            return Err(TethneError::Inconsistency("slice window_size must be at least 1".into()));
        }
        let step = spec.step_size.unwrap_or(spec.window_size);
        if step == 0 {
            return Err(TethneError::Inconsistency("slice step_size must be at least 1".into()));
        }

        let built;
        let index = match self.indices.get(&spec.key) {
            Some(index) => index,
            None => {
                debug!(key = %spec.key, "auto-indexing slice axis");
                built = self.build_index(&spec.key)?;
                &built
            }
        };

        let mut axis: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (value, positions) in index {
            match value.as_int() {
                Some(v) => axis.entry(v).or_default().extend(positions),
                None => warn!(key = %spec.key, %value, "skipping non-integer slice value"),
            }
        }
        let (Some(&min), Some(&max)) = (axis.keys().next(), axis.keys().next_back()) else {
            return Ok(Vec::new());
        };

        let window = spec.window_size as i64;
        let mut windows = Vec::new();
        let mut start = min;
        loop {
            let end = start + window;
            let lower = if spec.cumulative { min } else { start };
            let mut positions: Vec<usize> = axis.range(lower..end).flat_map(|(_, p)| p.iter().copied()).collect();
            positions.sort_unstable();
            positions.dedup();
            let key = if spec.is_pointwise() {
                SliceKey::Point(start)
            } else {
                SliceKey::Range(lower, end)
            };
            windows.push((key, positions));
            start += step as i64;
            if start + window - 1 > max {
                break;
            }
        }
        Ok(windows)
    }

    /// Sub-corpus over the given positions, sharing papers and feature sets.
    fn subset(&self, positions: &[usize]) -> Result<Corpus> {
        let papers = positions.iter().map(|&i| Arc::clone(&self.papers[i])).collect();
        let mut sub = Corpus::from_shared(self.index_by.clone(), papers);
        for field in self.indices.keys() {
            let index = sub.build_index(field)?;
            sub.indices.insert(field.clone(), index);
        }
        sub.features = self.features.clone();
        sub.structured = self.structured.clone();
        Ok(sub)
    }

    /// Slice along `spec.key`, in ascending key order. Empty windows are kept.
    pub fn slice(&self, spec: &SliceSpec) -> Result<Vec<(SliceKey, Corpus)>> {
        let windows = self.windows(spec)?;
        let mut slices = Vec::with_capacity(windows.len());
        for (key, positions) in windows {
            let mut sub = self.subset(&positions)?;
            if !sub.indices.contains_key(&spec.key) {
                sub.index(&spec.key)?;
            }
            slices.push((key, sub));
        }
        debug!(key = %spec.key, slices = slices.len(), "sliced corpus");
        Ok(slices)
    }

    /// Number of papers in each slice.
    pub fn distribution(&self, spec: &SliceSpec) -> Result<Vec<(SliceKey, usize)>> {
        Ok(self
            .windows(spec)?
            .into_iter()
            .map(|(key, positions)| (key, positions.len()))
            .collect())
    }

    fn slice_documents(&self, positions: &[usize]) -> BTreeSet<&str> {
        positions.iter().map(|&i| self.keys[i].as_str()).collect()
    }

    /// Per-slice sum of `element`'s count in the named feature set.
    pub fn feature_distribution(&self, set_name: &str, element: &Value, spec: &SliceSpec) -> Result<Vec<(SliceKey, f64)>> {
        let set = self.require_feature_set(set_name)?;
        let mut out = Vec::new();
        for (key, positions) in self.windows(spec)? {
            let total = self
                .slice_documents(&positions)
                .into_iter()
                .filter_map(|doc| set.get(doc).and_then(|f| f.get(element)))
                .sum();
            out.push((key, total));
        }
        Ok(out)
    }

    /// Per-slice number of documents containing `element`.
    pub fn document_distribution(&self, set_name: &str, element: &Value, spec: &SliceSpec) -> Result<Vec<(SliceKey, usize)>> {
        let set = self.require_feature_set(set_name)?;
        let containing: HashSet<&str> = set.documents_with(element).iter().map(String::as_str).collect();
        let mut out = Vec::new();
        for (key, positions) in self.windows(spec)? {
            let n = self
                .slice_documents(&positions)
                .into_iter()
                .filter(|doc| containing.contains(doc))
                .count();
            out.push((key, n));
        }
        Ok(out)
    }

    /// Highest-ranked elements of the named set over this corpus's papers.
    pub fn top_features(&self, set_name: &str, n: usize, ranking: Ranking) -> Result<Vec<(Value, f64)>> {
        let set = self.require_feature_set(set_name)?;
        if self.covers_all(set) {
            Ok(set.top(n, ranking))
        } else {
            Ok(self.local_feature_set(set_name)?.top(n, ranking))
        }
    }

    /// Install `new_name` as a pointwise rewrite of `set_name`.
    pub fn transform<F>(&mut self, set_name: &str, new_name: impl Into<String>, f: F) -> Result<()>
    where
        F: Fn(&Value, f64, f64, usize) -> Option<f64>,
    {
        let set = self.require_feature_set(set_name)?;
        let derived = if self.covers_all(set) {
            set.transform(f)
        } else {
            self.local_feature_set(set_name)?.transform(f)
        };
        self.features.insert(new_name.into(), Arc::new(derived));
        Ok(())
    }

    /// Papers satisfying `pred`, as a sub-corpus sharing storage.
    pub fn filter<P>(&self, pred: P) -> Result<Corpus>
    where
        P: Fn(&Paper) -> bool,
    {
        let positions: Vec<usize> = self
            .papers
            .iter()
            .enumerate()
            .filter(|(_, p)| pred(p))
            .map(|(i, _)| i)
            .collect();
        self.subset(&positions)
    }

    /// Owned copies of the papers, e.g. for merging or re-indexing.
    pub fn to_papers(&self) -> Vec<Paper> {
        self.papers.iter().map(|p| p.as_ref().clone()).collect()
    }
}
