//! Quantified corpus and feature-set invariants.

use std::collections::HashMap;

use proptest::prelude::*;
use tethne_common::{Field, Value};
use tethne_corpus::{Corpus, Feature, FeatureSet};
use tethne_test_utils::{paper, synthetic_papers};

fn documents() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(0u8..12, 0..15), 1..20)
}

proptest! {
    #[test]
    fn counts_equal_sum_over_features(docs in documents()) {
        let set = FeatureSet::from_features(docs.iter().enumerate().map(|(i, tokens)| {
            (format!("d{i}"), Feature::from_tokens(tokens.iter().map(|t| Value::Int(*t as i64))))
        }))
        .unwrap();

        let mut expected: HashMap<Value, (f64, usize)> = HashMap::new();
        for (_, feature) in set.iter() {
            for (element, count) in feature.iter() {
                let entry = expected.entry(element.clone()).or_insert((0.0, 0));
                entry.0 += count;
                entry.1 += 1;
            }
        }
        prop_assert_eq!(expected.len(), set.vocabulary_len());
        for (element, (count, df)) in expected {
            prop_assert!((set.count(&element) - count).abs() < 1e-9);
            prop_assert_eq!(set.document_count(&element), df);
            prop_assert_eq!(set.documents_with(&element).len(), df);
        }
    }

    #[test]
    fn replacing_documents_keeps_counts_consistent(docs in documents(), replacement in prop::collection::vec(0u8..12, 0..10)) {
        let mut set = FeatureSet::new();
        for (i, tokens) in docs.iter().enumerate() {
            set.add(format!("d{i}"), Feature::from_tokens(tokens.iter().map(|t| Value::Int(*t as i64)))).unwrap();
        }
        set.add("d0", Feature::from_tokens(replacement.iter().map(|t| Value::Int(*t as i64)))).unwrap();
        for element in set.elements().to_vec() {
            let total: f64 = set.iter().filter_map(|(_, f)| f.get(&element)).sum();
            prop_assert!((set.count(&element) - total).abs() < 1e-9);
        }
    }

    #[test]
    fn index_is_idempotent(years in prop::collection::vec(1990i64..2000, 1..30)) {
        let papers = years
            .iter()
            .enumerate()
            .map(|(i, y)| paper(&[(format!("AUTHOR{i}").as_str(), "A")], *y, "JOURNAL"))
            .collect();
        let mut corpus = Corpus::new(papers).unwrap();
        let once = corpus.index(&Field::Date).unwrap().clone();
        let twice = corpus.index(&Field::Date).unwrap().clone();
        prop_assert_eq!(once, twice);
    }
}

#[test]
fn primary_lookup_is_exact_for_unique_papers() {
    let corpus = Corpus::new(synthetic_papers(40, "P", 2000..=2010, 11)).unwrap();
    for (key, paper) in corpus.entries() {
        assert_eq!(corpus.primary_key(paper), key);
        assert!(std::ptr::eq(corpus.get(key).unwrap(), paper));
    }
    assert!(corpus.duplicate_papers().is_empty());
}
