//! Graph builders. Each is a pure function of a corpus (and options) that
//! returns a fresh network; paper nodes are labelled with the corpus's
//! primary key and appear in paper insertion order.

pub mod authors;
pub mod features;
pub mod papers;

use std::collections::BTreeMap;

use tethne_common::{Field, Paper};

use crate::network::Attr;

pub use authors::{author_coinstitution, author_institution, coauthors, CoauthorOptions};
pub use features::{term_cooccurrence, topic_coupling, CooccurrenceOptions, TopicCouplingOptions, Weighting};
pub use papers::{
    author_coupling, author_papers, bibliographic_coupling, cocitation, direct_citation, internal_citation,
    AuthorCouplingOptions, CitationGraphs, CitationOptions, CocitationOptions, CouplingOptions,
};

/// String identifier of a paper under `field`.
pub(crate) fn identifier(paper: &Paper, field: &Field) -> Option<String> {
    match field {
        Field::Ayjid => Some(paper.fingerprint()),
        other => paper.get(other).map(|v| v.to_string()).filter(|s| !s.trim().is_empty()),
    }
}

/// Attributes copied from `paper` onto its node.
pub(crate) fn paper_attrs(paper: &Paper, fields: &[Field]) -> Vec<(String, Attr)> {
    fields
        .iter()
        .filter_map(|f| paper.get(f).map(|v| (f.to_string(), Attr::from(&v))))
        .collect()
}

/// Count every unordered pair `(i, j)`, `i < j`, of each group.
pub(crate) fn count_pairs<'a, I>(groups: I) -> BTreeMap<(usize, usize), usize>
where
    I: IntoIterator<Item = &'a Vec<usize>>,
{
    let mut counts = BTreeMap::new();
    for group in groups {
        for (a, &i) in group.iter().enumerate() {
            for &j in &group[a + 1..] {
                let key = if i < j { (i, j) } else { (j, i) };
                *counts.entry(key).or_insert(0) += 1;
            }
        }
    }
    counts
}
