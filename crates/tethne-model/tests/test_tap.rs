//! TAP over random co-authorship graphs.

use std::collections::BTreeMap;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tethne_corpus::{Corpus, SliceKey, SliceSpec};
use tethne_graph::builders::{coauthors, CoauthorOptions};
use tethne_graph::{GraphCollection, UndirectedNetwork};
use tethne_model::{ModelManager, TapManager, TapModel, TapParams, TapStatus};
use tethne_test_utils::random_coauthor_papers;

fn random_theta(net: &UndirectedNetwork, topics: usize, seed: u64) -> BTreeMap<String, Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    net.labels()
        .map(|label| {
            let raw: Vec<f64> = (0..topics).map(|_| rng.gen_range(0.01..1.0)).collect();
            let total: f64 = raw.iter().sum();
            (label.to_string(), raw.into_iter().map(|p| p / total).collect())
        })
        .collect()
}

fn coauthor_graph(nodes: usize, edges: usize, seed: u64) -> UndirectedNetwork {
    let corpus = Corpus::new(random_coauthor_papers(nodes, edges, seed)).unwrap();
    coauthors(&corpus, &CoauthorOptions::default()).unwrap()
}

#[test]
fn five_topics_over_ten_authors() {
    let net = coauthor_graph(10, 20, 7);
    assert_eq!(net.size(), 20);
    let theta = random_theta(&net, 5, 11);
    let mut model = TapModel::new(&net, &theta, TapParams::default()).unwrap();
    let result = model.build().unwrap();

    assert_eq!(result.mu.len(), 5);
    let keys: Vec<SliceKey> = result.mu.keys().collect();
    assert_eq!(keys, (0..5).map(SliceKey::Point).collect::<Vec<_>>());
    for (_, graph) in result.mu.iter() {
        assert!(graph.is_directed());
        assert_eq!(graph.order(), net.order());
        for (_, _, edge) in graph.edges() {
            let w = edge.weight();
            assert!(w > 0.0 && w < 1.0, "weight {w} outside (0, 1)");
        }
    }
}

#[tokio::test]
async fn manager_runs_every_slice() {
    let corpus = Corpus::new(random_coauthor_papers(8, 12, 3)).unwrap();
    let collection = GraphCollection::build(&corpus, &SliceSpec::window(4), |sub| {
        coauthors(sub, &CoauthorOptions::default())
    })
    .unwrap();
    let everyone = coauthors(&corpus, &CoauthorOptions::default()).unwrap();
    let mut manager = TapManager::new(&collection, random_theta(&everyone, 3, 5));
    assert!(manager.load().is_err());
    manager.fit(&TapParams::default()).await.unwrap();

    let results = manager.load().unwrap();
    assert_eq!(results.len(), collection.len());
    for result in results.values() {
        assert_eq!(result.mu.len(), 3);
    }
    assert!(manager.convergence().iterations > 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn run_either_converges_or_hits_the_cap(
        nodes in 3usize..9,
        topics in 1usize..5,
        cap in 5usize..120,
        seed in any::<u64>(),
    ) {
        let edges = nodes;
        let net = coauthor_graph(nodes, edges.min(nodes * (nodes - 1) / 2), seed);
        let theta = random_theta(&net, topics, seed ^ 0x5eed);
        let params = TapParams { max_iterations: cap, stability_window: 10, ..TapParams::default() };
        let mut model = TapModel::new(&net, &theta, params).unwrap();
        let result = model.build().unwrap();

        prop_assert_eq!(result.mu.len(), topics);
        match result.status {
            TapStatus::Converged => prop_assert!(result.iterations >= 10 && result.iterations <= cap),
            TapStatus::IterationCap => prop_assert_eq!(result.iterations, cap),
        }
    }
}
