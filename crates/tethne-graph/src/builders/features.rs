//! Networks over feature sets: term co-occurrence and topic coupling.

use std::collections::{BTreeMap, HashSet};

use tethne_common::{Result, Value};
use tethne_corpus::{Corpus, Ranking};
use tracing::{debug, warn};

use super::count_pairs;
use crate::network::{Attr, UndirectedNetwork};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Weighting {
    /// Number of documents containing both elements.
    #[default]
    Count,
    /// Pointwise mutual information over document frequencies.
    Pmi,
}

#[derive(Debug, Clone)]
pub struct CooccurrenceOptions {
    /// Minimum number of documents in which a pair co-occurs.
    pub threshold: usize,
    pub weighting: Weighting,
    /// Restrict to the most frequent elements.
    pub topn: Option<usize>,
}

impl Default for CooccurrenceOptions {
    fn default() -> Self {
        Self {
            threshold: 1,
            weighting: Weighting::Count,
            topn: None,
        }
    }
}

/// Elements of `set_name` linked when they occur in the same document.
pub fn term_cooccurrence(corpus: &Corpus, set_name: &str, options: &CooccurrenceOptions) -> Result<UndirectedNetwork> {
    let set = corpus.local_feature_set(set_name)?;
    let allowed: Option<HashSet<Value>> = options
        .topn
        .map(|n| set.top(n, Ranking::Count).into_iter().map(|(e, _)| e).collect());
    let keep = |e: &Value| allowed.as_ref().map_or(true, |a| a.contains(e));

    let groups: Vec<Vec<usize>> = set
        .iter()
        .map(|(_, feature)| {
            let mut ids: Vec<usize> = feature
                .iter()
                .filter(|(e, c)| *c > 0.0 && keep(*e))
                .filter_map(|(e, _)| set.element_id(e))
                .collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        })
        .collect();

    let mut net = UndirectedNetwork::new();
    let mut used: Vec<usize> = groups.iter().flatten().copied().collect();
    used.sort_unstable();
    used.dedup();
    let label = |id: usize| set.element(id).map(|e| e.to_string()).unwrap_or_default();
    for &id in &used {
        if let Some(element) = set.element(id) {
            net.add_node_with(&label(id), [("documents".to_string(), Attr::Int(set.document_count(element) as i64))]);
        }
    }

    let n_docs = set.len() as f64;
    let mut skipped = 0usize;
    for ((i, j), together) in count_pairs(&groups) {
        if together < options.threshold.max(1) {
            continue;
        }
        let weight = match options.weighting {
            Weighting::Count => Attr::Int(together as i64),
            Weighting::Pmi => {
                let df = |id: usize| set.element(id).map_or(0, |e| set.document_count(e)) as f64;
                let (df_i, df_j) = (df(i), df(j));
                let pmi = (together as f64 * n_docs / (df_i * df_j)).ln();
                if !pmi.is_finite() {
                    skipped += 1;
                    continue;
                }
                Attr::Float(pmi)
            }
        };
        net.add_or_update_edge(
            &label(i),
            &label(j),
            [("weight".to_string(), weight), ("count".to_string(), Attr::Int(together as i64))],
        );
    }
    if skipped > 0 {
        warn!(set = set_name, skipped, "skipped pairs with undefined PMI");
    }
    debug!(order = net.order(), size = net.size(), "built co-occurrence network");
    Ok(net)
}

#[derive(Debug, Clone)]
pub struct TopicCouplingOptions {
    /// Minimum topic proportion for a paper to count as carrying a topic.
    pub threshold: f64,
}

impl Default for TopicCouplingOptions {
    fn default() -> Self {
        Self { threshold: 0.1 }
    }
}

/// Papers linked when they carry the same topics in a `theta` set. Edge
/// weight sums the mean proportion of each shared topic.
pub fn topic_coupling(corpus: &Corpus, theta_name: &str, options: &TopicCouplingOptions) -> Result<UndirectedNetwork> {
    let theta = corpus.local_feature_set(theta_name)?;
    let docs: Vec<&str> = theta.doc_ids().collect();

    let mut carriers: BTreeMap<Value, Vec<(usize, f64)>> = BTreeMap::new();
    for (i, doc) in docs.iter().enumerate() {
        let Some(feature) = theta.get(doc) else { continue };
        for (topic, p) in feature.iter() {
            if p >= options.threshold {
                carriers.entry(topic.clone()).or_default().push((i, p));
            }
        }
    }

    let mut net = UndirectedNetwork::new();
    for doc in &docs {
        net.add_node(doc);
    }
    for (topic, papers) in &carriers {
        for (a, &(i, pi)) in papers.iter().enumerate() {
            for &(j, pj) in &papers[a + 1..] {
                let edge = net.add_or_update_edge(docs[i], docs[j], std::iter::empty());
                let previous = edge.attrs.get("weight").and_then(Attr::as_f64).unwrap_or(0.0);
                edge.attrs.insert("weight".into(), Attr::Float(previous + (pi + pj) / 2.0));
                edge.accumulate("topics", Attr::from(topic));
            }
        }
    }
    Ok(net)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tethne_common::Field;
    use tethne_corpus::{Feature, FeatureSet, ListTokenizer};
    use tethne_test_utils::paper;

    fn keyworded() -> Corpus {
        let keywords = [
            vec!["gene", "network"],
            vec!["gene", "network", "cell"],
            vec!["cell", "fossil"],
        ];
        let papers = keywords
            .iter()
            .enumerate()
            .map(|(i, words)| {
                let mut p = paper(&[("A", "A")], 2000 + i as i64, "J");
                p.extras.insert("keywords".into(), Value::tuple(words.iter().copied()));
                p
            })
            .collect();
        let mut corpus = Corpus::new(papers).unwrap();
        corpus
            .index_feature(&Field::Extra("keywords".into()), &ListTokenizer, false)
            .unwrap();
        corpus
    }

    #[test]
    fn test_cooccurrence_counts() {
        let corpus = keyworded();
        let net = term_cooccurrence(&corpus, "keywords", &CooccurrenceOptions::default()).unwrap();
        assert_eq!(net.order(), 4);
        assert_eq!(net.edge("gene", "network").unwrap().attrs["weight"], Attr::Int(2));
        let strict = term_cooccurrence(
            &corpus,
            "keywords",
            &CooccurrenceOptions {
                threshold: 2,
                ..CooccurrenceOptions::default()
            },
        )
        .unwrap();
        assert_eq!(strict.size(), 1);
    }

    #[test]
    fn test_cooccurrence_pmi() {
        let corpus = keyworded();
        let options = CooccurrenceOptions {
            weighting: Weighting::Pmi,
            ..CooccurrenceOptions::default()
        };
        let net = term_cooccurrence(&corpus, "keywords", &options).unwrap();
        // gene and network always co-occur: ln(2 * 3 / (2 * 2)).
        let w = net.edge("gene", "network").unwrap().weight();
        assert!((w - 1.5f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_topic_coupling_sums_shared_topics() {
        let mut corpus = keyworded();
        let keys: Vec<String> = corpus.entries().map(|(k, _)| k.to_string()).collect();
        let mut theta = FeatureSet::new();
        let topic = |k: i64| Value::Int(k);
        theta.add(keys[0].clone(), Feature::new([(topic(0), 0.6), (topic(1), 0.4)]).unwrap()).unwrap();
        theta.add(keys[1].clone(), Feature::new([(topic(0), 0.5), (topic(1), 0.5)]).unwrap()).unwrap();
        theta.add(keys[2].clone(), Feature::new([(topic(0), 0.05), (topic(2), 0.95)]).unwrap()).unwrap();
        corpus.add_feature_set("theta", theta).unwrap();

        let net = topic_coupling(&corpus, "theta", &TopicCouplingOptions::default()).unwrap();
        assert_eq!(net.size(), 1);
        let w = net.edge(&keys[0], &keys[1]).unwrap().weight();
        assert!((w - 1.0).abs() < 1e-12);
    }
}
