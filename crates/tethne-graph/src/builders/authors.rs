//! Author-centred networks.

use std::collections::{BTreeMap, BTreeSet};

use tethne_common::{Addresses, Field, Paper, Result};
use tethne_corpus::Corpus;
use tracing::debug;

use super::count_pairs;
use crate::network::{Attr, UndirectedNetwork};

#[derive(Debug, Clone, Default)]
pub struct CoauthorOptions {
    /// Paper fields recorded on each co-authorship edge; repeats accumulate
    /// into lists.
    pub edge_attrs: Vec<Field>,
}

/// Distinct `"SURNAME INITIAL"` keys of a paper, in author order.
fn author_keys(paper: &Paper) -> Vec<String> {
    let mut seen = BTreeSet::new();
    paper
        .authors()
        .into_iter()
        .filter(|a| !a.is_empty() && seen.insert(a.clone()))
        .collect()
}

/// One node per author; an edge per pair of co-authors weighted by the
/// number of papers they share.
pub fn coauthors(corpus: &Corpus, options: &CoauthorOptions) -> Result<UndirectedNetwork> {
    let mut net = UndirectedNetwork::new();
    for (_, paper) in corpus.entries() {
        let authors = author_keys(paper);
        for author in &authors {
            net.add_node(author);
            let count = net
                .node(author)
                .and_then(|n| n.attrs.get("count"))
                .and_then(Attr::as_f64)
                .unwrap_or(0.0) as i64;
            net.set_node_attr(author, "count", count + 1);
        }
        let attrs: Vec<(String, Attr)> = options
            .edge_attrs
            .iter()
            .filter_map(|f| paper.get(f).map(|v| (f.to_string(), Attr::from(&v))))
            .collect();
        for (i, a) in authors.iter().enumerate() {
            for b in &authors[i + 1..] {
                let edge = net.increment_edge(a, b, 1);
                for (key, value) in &attrs {
                    edge.accumulate(key, value.clone());
                }
            }
        }
    }
    debug!(order = net.order(), size = net.size(), "built coauthor network");
    Ok(net)
}

/// `(author key, institution)` pairs of one paper.
///
/// Per-author addresses are matched to authors by full name, then by
/// surname; the ambiguous form links every author to every institution.
fn affiliations(paper: &Paper) -> Vec<(String, String)> {
    let keys = paper.authors();
    let institution = |raw: &str| raw.trim().to_uppercase();
    match &paper.addresses {
        Addresses::None => Vec::new(),
        Addresses::All(list) => keys
            .iter()
            .flat_map(|a| list.iter().map(move |aff| (a.clone(), institution(&aff.institution))))
            .filter(|(_, inst)| !inst.is_empty())
            .collect(),
        Addresses::ByAuthor(map) => {
            let mut out = Vec::new();
            for (name, affs) in map {
                let position = paper
                    .authors_full
                    .iter()
                    .position(|(last, first)| format!("{last} {first}").trim() == name)
                    .or_else(|| keys.iter().position(|k| k == name))
                    .or_else(|| paper.aulast.iter().position(|last| name.starts_with(&format!("{last} "))));
                let author = match position.and_then(|i| keys.get(i)) {
                    Some(key) => key.clone(),
                    None => name.clone(),
                };
                for aff in affs {
                    let inst = institution(&aff.institution);
                    if !inst.is_empty() {
                        out.push((author.clone(), inst));
                    }
                }
            }
            out
        }
    }
}

/// Bipartite author–institution network; `type` distinguishes the
/// partitions and edge weight counts papers.
pub fn author_institution(corpus: &Corpus) -> Result<UndirectedNetwork> {
    let mut net = UndirectedNetwork::new();
    for (_, paper) in corpus.entries() {
        let pairs: BTreeSet<(String, String)> = affiliations(paper).into_iter().collect();
        for (author, inst) in pairs {
            net.add_node_with(&author, [("type".to_string(), Attr::from("author"))]);
            net.add_node_with(&inst, [("type".to_string(), Attr::from("institution"))]);
            net.increment_edge(&author, &inst, 1);
        }
    }
    debug!(order = net.order(), size = net.size(), "built author-institution network");
    Ok(net)
}

/// Authors linked when they share an institution; weight is the number of
/// shared institutions.
pub fn author_coinstitution(corpus: &Corpus) -> Result<UndirectedNetwork> {
    let mut members: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut authors: Vec<String> = Vec::new();
    let mut position: BTreeMap<String, usize> = BTreeMap::new();
    for (_, paper) in corpus.entries() {
        for (author, inst) in affiliations(paper) {
            if !position.contains_key(&author) {
                position.insert(author.clone(), authors.len());
                authors.push(author.clone());
            }
            members.entry(inst).or_default().insert(author);
        }
    }

    let groups: Vec<Vec<usize>> = members
        .values()
        .map(|set| set.iter().map(|a| position[a]).collect())
        .collect();
    let mut net = UndirectedNetwork::new();
    for author in &authors {
        net.add_node(author);
    }
    for ((i, j), shared) in count_pairs(&groups) {
        net.increment_edge(&authors[i], &authors[j], shared as i64);
    }
    Ok(net)
}
