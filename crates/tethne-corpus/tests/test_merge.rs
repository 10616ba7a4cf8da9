//! Merging corpora from two sources.

use tethne_common::{Field, Value};
use tethne_corpus::{merge, Corpus, Feature, FeatureSet, MatchBy, MergeOptions};
use tethne_test_utils::synthetic_papers;

fn with_words(papers: Vec<tethne_common::Paper>, set: &str, word: &str) -> Corpus {
    let mut corpus = Corpus::builder()
        .index_fields([Field::Date])
        .build(papers)
        .unwrap();
    let features: Vec<(String, Feature)> = corpus
        .entries()
        .map(|(key, _)| (key.to_string(), Feature::from_tokens([Value::text(word)])))
        .collect();
    corpus.add_feature_set(set, FeatureSet::from_features(features).unwrap()).unwrap();
    corpus
}

#[test]
fn merge_disjoint_sources_keeps_every_paper() {
    let dfr = with_words(synthetic_papers(241, "DFR", 1990..=2000, 1), "wordcounts", "evolution");
    let wos = with_words(synthetic_papers(231, "WOS", 1990..=2000, 2), "citations", "darwin");

    let merged = merge(
        &dfr,
        &wos,
        &MergeOptions {
            match_by: MatchBy::Fields(vec![Field::Ayjid]),
            ..MergeOptions::default()
        },
    )
    .unwrap();

    assert_eq!(merged.len(), 472);
    let names: Vec<&str> = merged.feature_set_names().collect();
    assert_eq!(names, vec!["citations", "wordcounts"]);
    assert_eq!(merged.feature_set("wordcounts").unwrap().len(), 241);
    assert_eq!(merged.feature_set("citations").unwrap().len(), 231);
    assert!(merged.index_of(&Field::Date).is_some());
}

#[test]
fn merged_fields_prefer_the_first_corpus() {
    let mut left = synthetic_papers(5, "SAME", 2001..=2001, 3);
    let mut right = left.clone();
    for (l, r) in left.iter_mut().zip(right.iter_mut()) {
        l.atitle = Some("from the first source".into());
        r.atitle = Some("from the second source".into());
        r.doi = Some("10.1000/right".into());
    }
    let merged = merge(
        &Corpus::new(left).unwrap(),
        &Corpus::new(right).unwrap(),
        &MergeOptions::default(),
    )
    .unwrap();
    assert_eq!(merged.len(), 5);
    for paper in merged.iter() {
        assert_eq!(paper.atitle.as_deref(), Some("from the first source"));
        assert_eq!(paper.doi.as_deref(), Some("10.1000/right"));
    }
}
