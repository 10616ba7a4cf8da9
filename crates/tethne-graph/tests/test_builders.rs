//! Builders run over real reader output and hand-built citation chains.

use std::path::PathBuf;

use petgraph::algo::is_cyclic_directed;
use pretty_assertions::assert_eq;
use tethne_corpus::{Corpus, SliceSpec};
use tethne_graph::builders::{
    bibliographic_coupling, coauthors, cocitation, direct_citation, CitationOptions, CoauthorOptions,
    CocitationOptions, CouplingOptions,
};
use tethne_graph::{read_graphml, write_graphml, Attr, GraphCollection, UndirectedNetwork};
use tethne_ingestion::{ReadOptions, Reader, WosReader};
use tethne_test_utils::{citation_chain, scratch_dir};

fn wos_sample() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../tethne-ingestion/tests/data/wos.txt")
}

fn wos_corpus() -> Corpus {
    WosReader::new()
        .unwrap()
        .read_corpus(&wos_sample(), &ReadOptions::default())
        .unwrap()
}

#[test]
fn coauthor_network_of_wos_sample() {
    let net = coauthors(&wos_corpus(), &CoauthorOptions::default()).unwrap();
    assert_eq!(net.order(), 51);
    for label in net.labels() {
        assert_eq!(label, label.to_uppercase());
        assert_eq!(label.split(' ').count(), 2, "{label} is not SURNAME INIT");
    }
    for (_, _, edge) in net.edges() {
        assert!(matches!(edge.attrs["weight"], Attr::Int(w) if w > 0));
    }
}

#[test]
fn coauthor_network_survives_graphml() {
    let net = coauthors(&wos_corpus(), &CoauthorOptions::default()).unwrap();
    let dir = scratch_dir();
    let path = dir.path().join("coauthors.graphml");
    write_graphml(&net, &path).unwrap();
    let back: UndirectedNetwork = read_graphml(&path).unwrap();
    assert_eq!(back.order(), net.order());
    assert_eq!(back.size(), net.size());
    for (u, v, edge) in net.edges() {
        assert_eq!(back.edge(u, v).unwrap().attrs, edge.attrs);
    }
}

#[test]
fn citation_chain_is_acyclic() {
    let corpus = Corpus::new(citation_chain()).unwrap();
    let graphs = direct_citation(&corpus, &CitationOptions::default()).unwrap();
    assert_eq!(graphs.internal.size(), 2);
    assert_eq!(graphs.internal.order(), 3);
    assert!(!is_cyclic_directed(graphs.internal.graph()));
    assert!(!is_cyclic_directed(graphs.full.graph()));
}

#[test]
fn yearly_coauthor_collection() {
    let corpus = wos_corpus();
    let collection = GraphCollection::build(&corpus, &SliceSpec::yearly(), |sub| {
        coauthors(sub, &CoauthorOptions::default())
    })
    .unwrap();
    assert_eq!(collection.len(), 2);
    let total: usize = collection.keys().map(|k| collection.nodes_in(&k).len()).sum();
    assert!(total >= 51);
    assert_eq!(collection.labels().len(), 51);
}

#[test]
fn coupling_and_cocitation_of_wos_sample() {
    let corpus = wos_corpus();
    let coupled = bibliographic_coupling(&corpus, &CouplingOptions::default()).unwrap();
    let citing = corpus.entries().filter(|(_, paper)| !paper.citations.is_empty()).count();
    assert!(coupled.order() > 0 && coupled.order() <= citing);
    for (_, _, edge) in coupled.edges() {
        assert!(edge.weight() >= 1.0);
    }

    let cocited = cocitation(&corpus, &CocitationOptions::default()).unwrap();
    assert!(cocited.order() > 0);
    assert!(cocited.size() > 0);
}
