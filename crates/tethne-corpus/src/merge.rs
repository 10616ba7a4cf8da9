//! Combining two corpora, preferring values from the first.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use anyhow::Context;
use tethne_common::{Field, Paper, Result, TethneError};
use tracing::{debug, info};

use crate::corpus::Corpus;
use crate::featureset::FeatureSet;

pub type MatchPredicate = Box<dyn Fn(&Paper, &Paper) -> anyhow::Result<bool> + Send + Sync>;

/// How two papers are recognised as the same work.
pub enum MatchBy {
    /// Compare these fields after whitespace collapse and lower-casing.
    Fields(Vec<Field>),
    Predicate(MatchPredicate),
}

impl fmt::Debug for MatchBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchBy::Fields(fields) => f.debug_tuple("Fields").field(fields).finish(),
            MatchBy::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

#[derive(Debug)]
pub struct MergeOptions {
    pub match_by: MatchBy,
    /// Fraction of compared fields that must agree.
    pub match_threshold: f64,
    pub index_by: Field,
    /// Only compare papers with equal `date`.
    pub block_by_date: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            match_by: MatchBy::Fields(vec![Field::Ayjid]),
            match_threshold: 1.0,
            index_by: Field::Ayjid,
            block_by_date: false,
        }
    }
}

fn normalized(paper: &Paper, field: &Field) -> Option<String> {
    paper.get(field).filter(|v| !v.is_empty()).map(|v| v.normalized())
}

fn fields_match(a: &Paper, b: &Paper, fields: &[Field], threshold: f64) -> bool {
    let equal = fields
        .iter()
        .filter(|f| match (normalized(a, f), normalized(b, f)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        })
        .count();
    equal as f64 / fields.len() as f64 >= threshold
}

fn is_match(a: &Paper, b: &Paper, options: &MergeOptions) -> Result<bool> {
    match &options.match_by {
        MatchBy::Fields(fields) => Ok(fields_match(a, b, fields, options.match_threshold)),
        MatchBy::Predicate(predicate) => predicate(a, b)
            .with_context(|| format!("match predicate failed on {} / {}", a.fingerprint(), b.fingerprint()))
            .map_err(TethneError::Other),
    }
}

/// Merge `a` and `b` into a new corpus indexed by `options.index_by`.
///
/// Each paper of `a` is paired with the first still-unmatched paper of `b`
/// that matches; the merged record is `b` overlaid with `a`'s non-empty
/// fields. Unmatched papers from both sides follow as-is. Feature sets are
/// rebuilt per document under the new keys, taking `a`'s feature first.
pub fn merge(a: &Corpus, b: &Corpus, options: &MergeOptions) -> Result<Corpus> {
    if let MatchBy::Fields(fields) = &options.match_by {
        if fields.is_empty() {
            return Err(TethneError::Config("merge needs at least one field to match on".into()));
        }
    }

    let a_entries: Vec<(&str, &Paper)> = a.iter_keyed().collect();
    let b_entries: Vec<(&str, &Paper)> = b.iter_keyed().collect();

    let mut blocks: HashMap<Option<i64>, Vec<usize>> = HashMap::new();
    for (j, (_, paper)) in b_entries.iter().enumerate() {
        let block = if options.block_by_date { paper.date } else { None };
        blocks.entry(block).or_default().push(j);
    }

    let mut taken = vec![false; b_entries.len()];
    // (paper, key in a, key in b)
    let mut merged: Vec<(Paper, Option<&str>, Option<&str>)> = Vec::new();
    for (a_key, a_paper) in &a_entries {
        let block = if options.block_by_date { a_paper.date } else { None };
        let mut partner = None;
        for &j in blocks.get(&block).map(Vec::as_slice).unwrap_or(&[]) {
            if !taken[j] && is_match(a_paper, b_entries[j].1, options)? {
                partner = Some(j);
                break;
            }
        }
        match partner {
            Some(j) => {
                taken[j] = true;
                let (b_key, b_paper) = b_entries[j];
                let mut paper = b_paper.clone();
                paper.overlay(a_paper);
                merged.push((paper, Some(*a_key), Some(b_key)));
            }
            None => merged.push(((*a_paper).clone(), Some(*a_key), None)),
        }
    }
    let matches = taken.iter().filter(|t| **t).count();
    for (j, (b_key, b_paper)) in b_entries.iter().enumerate() {
        if !taken[j] {
            merged.push(((*b_paper).clone(), None, Some(*b_key)));
        }
    }

    let mut papers = Vec::with_capacity(merged.len());
    let mut origins = Vec::with_capacity(merged.len());
    for (paper, a_key, b_key) in merged {
        papers.push(paper);
        origins.push((a_key, b_key));
    }

    let mut corpus = Corpus::builder().index_by(options.index_by.clone()).build(papers)?;

    let fields: BTreeSet<Field> = a.indices().keys().chain(b.indices().keys()).cloned().collect();
    for field in &fields {
        corpus.index(field)?;
    }

    let names: BTreeSet<String> = a
        .feature_set_names()
        .chain(b.feature_set_names())
        .map(String::from)
        .collect();
    for name in names {
        let (fa, fb) = (a.feature_set(&name), b.feature_set(&name));
        let mut set = FeatureSet::new();
        for (position, (a_key, b_key)) in origins.iter().enumerate() {
            let Some(key) = corpus.key_at(position) else { continue };
            if set.contains(key) {
                continue;
            }
            let feature = a_key
                .and_then(|k| fa.and_then(|f| f.get(k)))
                .or_else(|| b_key.and_then(|k| fb.and_then(|f| f.get(k))));
            if let Some(feature) = feature {
                set.add(key, feature.clone())?;
            }
        }
        debug!(feature = %name, documents = set.len(), "merged feature set");
        corpus.add_feature_set(name, set)?;
    }

    info!(
        left = a.len(),
        right = b.len(),
        matches,
        merged = corpus.len(),
        "merged corpora"
    );
    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Feature;
    use tethne_common::Value;
    use pretty_assertions::assert_eq;

    fn paper(last: &str, year: i64, journal: &str, title: &str) -> Paper {
        let mut p = Paper::new();
        p.aulast = vec![last.into()];
        p.auinit = vec!["J".into()];
        p.date = Some(year);
        p.jtitle = Some(journal.into());
        p.atitle = Some(title.into());
        p
    }

    #[test]
    fn test_first_corpus_wins_conflicts() {
        let mut left = paper("Smith", 2010, "Nature", "Left title");
        left.doi = Some("10.1/a".into());
        let mut right = paper("Smith", 2010, "Nature", "Right title");
        right.volume = Some("12".into());
        let a = Corpus::new(vec![left]).unwrap();
        let b = Corpus::new(vec![right, paper("Other", 2011, "Cell", "x")]).unwrap();
        let merged = merge(&a, &b, &MergeOptions::default()).unwrap();
        assert_eq!(merged.len(), 2);
        let p = merged.get("SMITH J 2010 NATURE").unwrap();
        assert_eq!(p.atitle.as_deref(), Some("Left title"));
        assert_eq!(p.volume.as_deref(), Some("12"));
        assert_eq!(p.doi.as_deref(), Some("10.1/a"));
    }

    #[test]
    fn test_fractional_threshold() {
        let fields = vec![Field::Jtitle, Field::Date, Field::Atitle];
        let a = paper("Smith", 2010, "Nature ", "One");
        let b = paper("Jones", 2010, "nature", "Two");
        assert!(fields_match(&a, &b, &fields, 0.6));
        assert!(!fields_match(&a, &b, &fields, 0.7));
    }

    #[test]
    fn test_failing_predicate_aborts() {
        let a = Corpus::new(vec![paper("Smith", 2010, "Nature", "t")]).unwrap();
        let b = Corpus::new(vec![paper("Smith", 2010, "Nature", "t")]).unwrap();
        let options = MergeOptions {
            match_by: MatchBy::Predicate(Box::new(|_: &Paper, _: &Paper| -> anyhow::Result<bool> {
                anyhow::bail!("no comparison")
            })),
            ..MergeOptions::default()
        };
        assert!(matches!(merge(&a, &b, &options), Err(TethneError::Other(_))));
    }

    #[test]
    fn test_feature_sets_merged_by_name() {
        let mut a = Corpus::new(vec![paper("Smith", 2010, "Nature", "t")]).unwrap();
        let mut b = Corpus::new(vec![
            paper("Smith", 2010, "Nature", "t"),
            paper("Jones", 2012, "Cell", "u"),
        ])
        .unwrap();
        let words = |w: &str| Feature::from_tokens([Value::text(w)]);
        a.add_feature_set("wordcounts", FeatureSet::from_features([("SMITH J 2010 NATURE", words("left"))]).unwrap())
            .unwrap();
        b.add_feature_set(
            "wordcounts",
            FeatureSet::from_features([("SMITH J 2010 NATURE", words("right")), ("JONES J 2012 CELL", words("other"))])
                .unwrap(),
        )
        .unwrap();
        b.add_feature_set("citations", FeatureSet::new()).unwrap();
        let merged = merge(&a, &b, &MergeOptions::default()).unwrap();
        let names: Vec<&str> = merged.feature_set_names().collect();
        assert_eq!(names, vec!["citations", "wordcounts"]);
        let set = merged.feature_set("wordcounts").unwrap();
        assert_eq!(set.get("SMITH J 2010 NATURE").unwrap().get(&Value::text("left")), Some(1.0));
        assert!(set.contains("JONES J 2012 CELL"));
    }

    #[test]
    fn test_blocking_by_date_skips_other_years() {
        let a = Corpus::new(vec![paper("Smith", 2010, "Nature", "t")]).unwrap();
        let b = Corpus::new(vec![paper("Smith", 2011, "Nature", "t")]).unwrap();
        let options = MergeOptions {
            match_by: MatchBy::Fields(vec![Field::Aulast, Field::Jtitle]),
            block_by_date: true,
            ..MergeOptions::default()
        };
        assert_eq!(merge(&a, &b, &options).unwrap().len(), 2);
    }
}
