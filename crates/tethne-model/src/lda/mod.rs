//! Latent Dirichlet allocation: the fitted model and its two backends.
//!
//! `theta` maps each document to `Int(topic) → probability`; `phi` has one
//! pseudo-document per topic (id `"0"`, `"1"`, ...) mapping words to
//! probabilities. Both sum to one per document.

pub mod gibbs;
pub mod mallet;

use std::collections::BTreeMap;

use tethne_common::{Result, TethneError, Value};
use tethne_corpus::{Corpus, FeatureSet, SliceKey, SliceSpec};
use tracing::debug;

pub use gibbs::{GibbsLdaManager, GibbsParams};
pub use mallet::{parse_doc_topics, parse_word_topic_counts, MalletManager, MalletParams};

/// How [`LdaModel::topic_over_time`] aggregates a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TopicMode {
    /// Documents whose share of the topic is at least `1 / Z`.
    Documents,
    /// Sum of the topic's share over documents.
    #[default]
    Proportions,
}

#[derive(Debug, Clone)]
pub struct LdaModel {
    pub theta: FeatureSet,
    pub phi: FeatureSet,
    pub vocabulary: Vec<Value>,
    /// Topic assignment of every token, per document, when the backend
    /// exposes it.
    pub z: BTreeMap<String, Vec<usize>>,
    pub num_topics: usize,
}

impl LdaModel {
    fn check_topic(&self, k: usize) -> Result<()> {
        if k >= self.num_topics {
            return Err(TethneError::NotFound(format!("topic {k} (model has {})", self.num_topics)));
        }
        Ok(())
    }

    /// The `n` most probable words of topic `k`.
    pub fn list_topic(&self, k: usize, n: usize) -> Result<Vec<(Value, f64)>> {
        self.check_topic(k)?;
        let topic = self
            .phi
            .get(&k.to_string())
            .ok_or_else(|| TethneError::NotFound(format!("phi row for topic {k}")))?;
        Ok(topic.top(n))
    }

    pub fn print_topic(&self, k: usize, n: usize) -> Result<String> {
        let words: Vec<String> = self.list_topic(k, n)?.into_iter().map(|(w, _)| w.to_string()).collect();
        Ok(words.join(", "))
    }

    /// The `n` largest topic shares of one document.
    pub fn topics_in(&self, doc: &str, n: usize) -> Result<Vec<(usize, f64)>> {
        let feature = self
            .theta
            .get(doc)
            .ok_or_else(|| TethneError::NotFound(format!("document {doc} in theta")))?;
        Ok(feature
            .top(n)
            .into_iter()
            .filter_map(|(topic, p)| topic.as_int().map(|k| (k as usize, p)))
            .collect())
    }

    /// Topic `k` per slice of `corpus`; `normed` divides by the number of
    /// documents with a topic distribution in the slice.
    pub fn topic_over_time(
        &self,
        corpus: &Corpus,
        k: usize,
        mode: TopicMode,
        normed: bool,
        spec: &SliceSpec,
    ) -> Result<Vec<(SliceKey, f64)>> {
        self.check_topic(k)?;
        let topic = Value::Int(k as i64);
        let presence = 1.0 / self.num_topics as f64;
        let mut out = Vec::new();
        for (key, sub) in corpus.slice(spec)? {
            let shares: Vec<f64> = sub
                .entries()
                .filter_map(|(doc, _)| self.theta.get(doc))
                .map(|feature| feature.get(&topic).unwrap_or(0.0))
                .collect();
            let value = match mode {
                TopicMode::Documents => shares.iter().filter(|&&p| p >= presence).count() as f64,
                TopicMode::Proportions => shares.iter().sum(),
            };
            let value = if normed && !shares.is_empty() { value / shares.len() as f64 } else { value };
            out.push((key, value));
        }
        Ok(out)
    }

    /// Install `theta` on `corpus` as `theta`, or `{prefix}_theta`.
    ///
    /// `phi` stays on the model: its documents are topics, not papers.
    pub fn attach(&self, corpus: &mut Corpus, prefix: &str) -> Result<String> {
        let name = if prefix.is_empty() { "theta".to_string() } else { format!("{prefix}_theta") };
        corpus.add_feature_set(name.clone(), self.theta.clone())?;
        debug!(name = %name, documents = self.theta.len(), "attached topic distribution");
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tethne_corpus::Feature;
    use tethne_test_utils::paper;

    fn model(corpus: &Corpus) -> LdaModel {
        let keys: Vec<String> = corpus.entries().map(|(k, _)| k.to_string()).collect();
        let t = |k: i64| Value::Int(k);
        let theta = FeatureSet::from_features([
            (keys[0].clone(), Feature::new([(t(0), 0.9), (t(1), 0.1)]).unwrap()),
            (keys[1].clone(), Feature::new([(t(0), 0.2), (t(1), 0.8)]).unwrap()),
            (keys[2].clone(), Feature::new([(t(0), 0.6), (t(1), 0.4)]).unwrap()),
        ])
        .unwrap();
        let phi = FeatureSet::from_features([
            ("0", Feature::new([(Value::from("gene"), 0.7), (Value::from("cell"), 0.3)]).unwrap()),
            ("1", Feature::new([(Value::from("fossil"), 0.6), (Value::from("gene"), 0.4)]).unwrap()),
        ])
        .unwrap();
        LdaModel {
            theta,
            phi,
            vocabulary: vec!["gene".into(), "cell".into(), "fossil".into()],
            z: BTreeMap::new(),
            num_topics: 2,
        }
    }

    fn corpus() -> Corpus {
        Corpus::new(vec![
            paper(&[("A", "A")], 2000, "J"),
            paper(&[("B", "B")], 2000, "J"),
            paper(&[("C", "C")], 2001, "J"),
        ])
        .unwrap()
    }

    #[test]
    fn test_topic_queries() {
        let corpus = corpus();
        let model = model(&corpus);
        assert_eq!(model.print_topic(0, 2).unwrap(), "gene, cell");
        let first = corpus.key_at(0).unwrap();
        assert_eq!(model.topics_in(first, 1).unwrap(), vec![(0, 0.9)]);
        assert!(matches!(model.list_topic(5, 1), Err(TethneError::NotFound(_))));
    }

    #[test]
    fn test_topic_over_time_modes() {
        let corpus = corpus();
        let model = model(&corpus);
        let spec = SliceSpec::yearly();
        let sums = model.topic_over_time(&corpus, 0, TopicMode::Proportions, false, &spec).unwrap();
        assert_eq!(sums.len(), 2);
        assert!((sums[0].1 - 1.1).abs() < 1e-12);
        let docs = model.topic_over_time(&corpus, 0, TopicMode::Documents, true, &spec).unwrap();
        assert_eq!(docs, vec![(SliceKey::Point(2000), 0.5), (SliceKey::Point(2001), 1.0)]);
    }

    #[test]
    fn test_attach_installs_theta() {
        let mut corpus = corpus();
        let model = model(&corpus);
        let name = model.attach(&mut corpus, "lda").unwrap();
        assert_eq!(name, "lda_theta");
        assert_eq!(corpus.feature_set("lda_theta").unwrap().len(), 3);
    }
}
