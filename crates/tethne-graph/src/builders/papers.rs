//! Paper-centred networks: citation, coupling and co-citation.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use tethne_common::{Field, Paper, Result, TethneError};
use tethne_corpus::Corpus;
use tracing::{debug, warn};

use super::{count_pairs, identifier, paper_attrs};
use crate::network::{Attr, DirectedNetwork, UndirectedNetwork};

#[derive(Debug, Clone)]
pub struct CitationOptions {
    /// Field identifying cited references.
    pub id_field: Field,
    pub node_attrs: Vec<Field>,
}

impl Default for CitationOptions {
    fn default() -> Self {
        Self {
            id_field: Field::Ayjid,
            node_attrs: vec![Field::Date],
        }
    }
}

/// Both views of the citation graph.
#[derive(Debug, Clone)]
pub struct CitationGraphs {
    /// Every paper and every cited reference.
    pub full: DirectedNetwork,
    /// Only edges whose endpoints are both corpus papers.
    pub internal: DirectedNetwork,
}

/// Directed paper → cited-reference graphs. A cycle means bad input and is
/// reported as [`TethneError::CitationCycle`].
pub fn direct_citation(corpus: &Corpus, options: &CitationOptions) -> Result<CitationGraphs> {
    let mut full = DirectedNetwork::new();
    let mut internal = DirectedNetwork::new();

    let mut papers: Vec<(String, &Paper)> = Vec::new();
    for (key, paper) in corpus.entries() {
        let Some(id) = identifier(paper, &options.id_field) else {
            debug!(paper = key, field = %options.id_field, "paper has no identifier; left out of citation graph");
            continue;
        };
        let mut attrs = paper_attrs(paper, &options.node_attrs);
        attrs.push(("in_corpus".into(), Attr::Int(1)));
        full.add_node_with(&id, attrs.clone());
        internal.add_node_with(&id, attrs);
        papers.push((id, paper));
    }
    let in_corpus: HashSet<&str> = papers.iter().map(|(id, _)| id.as_str()).collect();

    for (id, paper) in &papers {
        for cited in &paper.citations {
            let Some(target) = identifier(cited, &options.id_field) else { continue };
            if !full.contains_node(&target) {
                let mut attrs = paper_attrs(cited, &options.node_attrs);
                attrs.push(("in_corpus".into(), Attr::Int(0)));
                full.add_node_with(&target, attrs);
            }
            full.increment_edge(id, &target, 1);
            if in_corpus.contains(target.as_str()) {
                internal.increment_edge(id, &target, 1);
            }
        }
    }

    check_acyclic(&full)?;
    debug!(
        full_order = full.order(),
        full_size = full.size(),
        internal_size = internal.size(),
        "built citation graphs"
    );
    Ok(CitationGraphs { full, internal })
}

/// The internal citation graph alone, for use as a collection builder.
pub fn internal_citation(corpus: &Corpus, options: &CitationOptions) -> Result<DirectedNetwork> {
    direct_citation(corpus, options).map(|g| g.internal)
}

fn check_acyclic(net: &DirectedNetwork) -> Result<()> {
    let graph = net.graph();
    for component in tarjan_scc(graph) {
        let looped = component.len() == 1 && graph.contains_edge(component[0], component[0]);
        if component.len() > 1 || looped {
            let labels = component.iter().map(|&n| graph[n].label.clone()).collect();
            return Err(TethneError::CitationCycle(labels));
        }
    }
    Ok(())
}

/// Cited identifiers of every corpus paper that has any, in corpus order.
fn cited_sets<'a>(corpus: &'a Corpus, field: &Field) -> Vec<(String, &'a Paper, BTreeSet<String>)> {
    corpus
        .entries()
        .filter_map(|(key, paper)| {
            let cited: BTreeSet<String> = paper.citations.iter().filter_map(|c| identifier(c, field)).collect();
            (!cited.is_empty()).then(|| (key.to_string(), paper, cited))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct CouplingOptions {
    /// Minimum number of shared references.
    pub threshold: usize,
    pub citation_field: Field,
    /// Weight by `|A ∩ B| / |A ∪ B|` instead of the raw overlap.
    pub jaccard: bool,
    pub node_attrs: Vec<Field>,
}

impl Default for CouplingOptions {
    fn default() -> Self {
        Self {
            threshold: 1,
            citation_field: Field::Ayjid,
            jaccard: false,
            node_attrs: vec![Field::Date],
        }
    }
}

/// Papers linked by shared cited references.
pub fn bibliographic_coupling(corpus: &Corpus, options: &CouplingOptions) -> Result<UndirectedNetwork> {
    let papers = cited_sets(corpus, &options.citation_field);
    let mut citing: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, (_, _, cited)) in papers.iter().enumerate() {
        for reference in cited {
            citing.entry(reference.as_str()).or_default().push(i);
        }
    }

    let mut net = UndirectedNetwork::new();
    for (key, paper, _) in &papers {
        net.add_node_with(key, paper_attrs(paper, &options.node_attrs));
    }
    for ((i, j), overlap) in count_pairs(citing.values()) {
        if overlap < options.threshold.max(1) {
            continue;
        }
        let weight = if options.jaccard {
            let union = papers[i].2.union(&papers[j].2).count();
            Attr::Float(overlap as f64 / union as f64)
        } else {
            Attr::Int(overlap as i64)
        };
        net.add_or_update_edge(
            &papers[i].0,
            &papers[j].0,
            [("weight".to_string(), weight), ("overlap".to_string(), Attr::Int(overlap as i64))],
        );
    }
    debug!(order = net.order(), size = net.size(), "built bibliographic coupling network");
    Ok(net)
}

#[derive(Debug, Clone)]
pub struct CocitationOptions {
    /// Keep only the most-cited references.
    pub topn: Option<usize>,
    pub min_weight: usize,
    pub citation_field: Field,
}

impl Default for CocitationOptions {
    fn default() -> Self {
        Self {
            topn: None,
            min_weight: 1,
            citation_field: Field::Ayjid,
        }
    }
}

/// Cited references linked when cited together; weight is the number of
/// papers citing both.
pub fn cocitation(corpus: &Corpus, options: &CocitationOptions) -> Result<UndirectedNetwork> {
    let papers = cited_sets(corpus, &options.citation_field);

    // References in first-encounter order with their citation counts.
    let mut references: Vec<String> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<usize> = Vec::new();
    for (_, paper, _) in &papers {
        let mut seen = HashSet::new();
        for cited in &paper.citations {
            let Some(id) = identifier(cited, &options.citation_field) else { continue };
            if !seen.insert(id.clone()) {
                continue;
            }
            let idx = *position.entry(id.clone()).or_insert_with(|| {
                references.push(id);
                counts.push(0);
                references.len() - 1
            });
            counts[idx] += 1;
        }
    }

    let mut kept: Vec<usize> = (0..references.len()).collect();
    if let Some(n) = options.topn {
        kept.sort_by(|&a, &b| counts[b].cmp(&counts[a]).then(a.cmp(&b)));
        kept.truncate(n);
        kept.sort_unstable();
    }
    let kept_set: HashSet<usize> = kept.iter().copied().collect();

    let groups: Vec<Vec<usize>> = papers
        .iter()
        .map(|(_, _, cited)| {
            let mut group: Vec<usize> = cited.iter().map(|id| position[id]).filter(|i| kept_set.contains(i)).collect();
            group.sort_unstable();
            group
        })
        .collect();

    let mut net = UndirectedNetwork::new();
    for &i in &kept {
        net.add_node_with(&references[i], [("citations".to_string(), Attr::Int(counts[i] as i64))]);
    }
    for ((i, j), together) in count_pairs(&groups) {
        if together >= options.min_weight {
            net.increment_edge(&references[i], &references[j], together as i64);
        }
    }
    debug!(order = net.order(), size = net.size(), "built cocitation network");
    Ok(net)
}

#[derive(Debug, Clone)]
pub struct AuthorCouplingOptions {
    /// Minimum number of shared authors.
    pub threshold: usize,
    pub node_attrs: Vec<Field>,
}

impl Default for AuthorCouplingOptions {
    fn default() -> Self {
        Self {
            threshold: 1,
            node_attrs: vec![Field::Date],
        }
    }
}

/// Papers linked by shared authors.
pub fn author_coupling(corpus: &Corpus, options: &AuthorCouplingOptions) -> Result<UndirectedNetwork> {
    let papers: Vec<(String, &Paper)> = corpus.entries().map(|(k, p)| (k.to_string(), p)).collect();
    let mut by_author: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, (_, paper)) in papers.iter().enumerate() {
        let authors: BTreeSet<String> = paper.authors().into_iter().filter(|a| !a.is_empty()).collect();
        for author in authors {
            by_author.entry(author).or_default().push(i);
        }
    }

    let mut net = UndirectedNetwork::new();
    for (key, paper) in &papers {
        net.add_node_with(key, paper_attrs(paper, &options.node_attrs));
    }
    let mut shared_names: BTreeMap<(usize, usize), Vec<Attr>> = BTreeMap::new();
    for (author, group) in &by_author {
        for (a, &i) in group.iter().enumerate() {
            for &j in &group[a + 1..] {
                shared_names.entry((i, j)).or_default().push(Attr::Text(author.clone()));
            }
        }
    }
    for ((i, j), names) in shared_names {
        if names.len() < options.threshold.max(1) {
            continue;
        }
        net.add_or_update_edge(
            &papers[i].0,
            &papers[j].0,
            [
                ("weight".to_string(), Attr::Int(names.len() as i64)),
                ("authors".to_string(), Attr::List(names)),
            ],
        );
    }
    Ok(net)
}

/// Directed author → paper bipartite graph.
pub fn author_papers(corpus: &Corpus) -> Result<DirectedNetwork> {
    let mut net = DirectedNetwork::new();
    for (key, paper) in corpus.entries() {
        let authors = paper.authors();
        if authors.is_empty() {
            warn!(paper = key, "paper without authors in author-paper graph");
        }
        net.add_node_with(key, [("type".to_string(), Attr::from("paper"))]);
        for author in authors.iter().filter(|a| !a.is_empty()) {
            net.add_node_with(author, [("type".to_string(), Attr::from("author"))]);
            net.increment_edge(author, key, 1);
        }
    }
    Ok(net)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tethne_test_utils::{citation_chain, paper, paper_citing};

    #[test]
    fn test_citation_chain_is_acyclic() {
        let corpus = Corpus::new(citation_chain()).unwrap();
        let graphs = direct_citation(&corpus, &CitationOptions::default()).unwrap();
        assert_eq!(graphs.internal.size(), 2);
        assert_eq!(graphs.internal.order(), 3);
        assert!(!petgraph::algo::is_cyclic_directed(graphs.internal.graph()));
    }

    #[test]
    fn test_external_references_only_in_full_graph() {
        let outside = paper(&[("DARWIN", "C")], 1859, "ORIGIN");
        let p = paper_citing(&[("SMITH", "J")], 2010, "NATURE", "T", &[&outside]);
        let corpus = Corpus::new(vec![p]).unwrap();
        let graphs = direct_citation(&corpus, &CitationOptions::default()).unwrap();
        assert_eq!(graphs.full.size(), 1);
        assert_eq!(graphs.internal.size(), 0);
        assert_eq!(graphs.full.node("DARWIN C 1859 ORIGIN").unwrap().attrs["in_corpus"], Attr::Int(0));
    }

    #[test]
    fn test_cycle_is_reported() {
        let a = paper(&[("A", "A")], 2000, "J");
        let b = paper(&[("B", "B")], 2001, "J");
        let a_citing = paper_citing(&[("A", "A")], 2000, "J", "a", &[&b]);
        let b_citing = paper_citing(&[("B", "B")], 2001, "J", "b", &[&a]);
        let corpus = Corpus::new(vec![a_citing, b_citing]).unwrap();
        match direct_citation(&corpus, &CitationOptions::default()) {
            Err(TethneError::CitationCycle(labels)) => assert_eq!(labels.len(), 2),
            other => panic!("expected a citation cycle, got {other:?}"),
        }
    }

    fn coupled() -> Corpus {
        let refs: Vec<Paper> = (0..4)
            .map(|i| {
                let name = format!("R{i}");
                paper(&[(name.as_str(), "X")], 1990 + i, "REF")
            })
            .collect();
        let p1 = paper_citing(&[("A", "A")], 2000, "J", "1", &[&refs[0], &refs[1], &refs[2]]);
        let p2 = paper_citing(&[("B", "B")], 2001, "J", "2", &[&refs[1], &refs[2]]);
        let p3 = paper_citing(&[("C", "C")], 2002, "J", "3", &[&refs[2], &refs[3]]);
        Corpus::new(vec![p1, p2, p3]).unwrap()
    }

    #[test]
    fn test_bibliographic_coupling_threshold_and_jaccard() {
        let corpus = coupled();
        let options = CouplingOptions {
            threshold: 2,
            ..CouplingOptions::default()
        };
        let net = bibliographic_coupling(&corpus, &options).unwrap();
        assert_eq!(net.size(), 1);
        assert_eq!(net.edge("A A 2000 J", "B B 2001 J").unwrap().attrs["weight"], Attr::Int(2));

        let jaccard = bibliographic_coupling(
            &corpus,
            &CouplingOptions {
                jaccard: true,
                ..CouplingOptions::default()
            },
        )
        .unwrap();
        assert_eq!(jaccard.size(), 3);
        let w = jaccard.edge("A A 2000 J", "B B 2001 J").unwrap().weight();
        assert!((w - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_cocitation_topn() {
        let corpus = coupled();
        let net = cocitation(&corpus, &CocitationOptions::default()).unwrap();
        assert_eq!(net.order(), 4);
        assert_eq!(net.edge("R1 X 1991 REF", "R2 X 1992 REF").unwrap().weight(), 2.0);

        let top = cocitation(
            &corpus,
            &CocitationOptions {
                topn: Some(2),
                ..CocitationOptions::default()
            },
        )
        .unwrap();
        assert_eq!(top.order(), 2);
        assert!(top.contains_node("R2 X 1992 REF"));
        assert_eq!(top.node("R2 X 1992 REF").unwrap().attrs["citations"], Attr::Int(3));
    }

    #[test]
    fn test_author_coupling_and_author_papers() {
        let p1 = paper(&[("SMITH", "J"), ("DOE", "A")], 2000, "J");
        let p2 = paper(&[("DOE", "A"), ("SMITH", "J")], 2001, "J");
        let p3 = paper(&[("ROE", "B")], 2002, "J");
        let corpus = Corpus::new(vec![p1, p2, p3]).unwrap();
        let coupling = author_coupling(&corpus, &AuthorCouplingOptions::default()).unwrap();
        assert_eq!(coupling.size(), 1);
        assert_eq!(coupling.edge("SMITH J 2000 J", "DOE A 2001 J").unwrap().weight(), 2.0);

        let bipartite = author_papers(&corpus).unwrap();
        assert_eq!(bipartite.order(), 6);
        assert!(bipartite.contains_edge("ROE B", "ROE B 2002 J"));
    }
}
