//! Named graph algorithms.
//!
//! A registry maps algorithm names to measures. Node-scoped measures return
//! one value per node (indexed by `NodeIndex::index()`); graph-scoped ones
//! return a single scalar.

use std::collections::{BTreeMap, HashSet, VecDeque};

use petgraph::algo::{connected_components, dijkstra, page_rank};
use petgraph::graph::NodeIndex;
use petgraph::visit::Reversed;
use petgraph::EdgeType;
use tethne_common::{Result, TethneError, Value};
use tethne_corpus::SliceKey;
use tracing::{debug, warn};

use crate::collection::{Analysis, GraphCollection};
use crate::network::Network;

pub const SIGMA_ATTR: &str = "sigma";

pub type NodeMeasure<Ty> = fn(&Network<Ty>) -> Vec<f64>;
pub type GraphMeasure<Ty> = fn(&Network<Ty>) -> f64;

pub enum Algorithm<Ty: EdgeType> {
    NodeScoped(NodeMeasure<Ty>),
    GraphScoped(GraphMeasure<Ty>),
}

/// Algorithms available to [`crate::GraphCollection::analyze`].
pub struct AlgorithmRegistry<Ty: EdgeType> {
    algorithms: BTreeMap<&'static str, Algorithm<Ty>>,
}

impl<Ty: EdgeType> Default for AlgorithmRegistry<Ty> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<Ty: EdgeType> AlgorithmRegistry<Ty> {
    pub fn new() -> Self {
        Self {
            algorithms: BTreeMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("degree", Algorithm::NodeScoped(degree));
        registry.register("degree_centrality", Algorithm::NodeScoped(degree_centrality));
        registry.register("betweenness_centrality", Algorithm::NodeScoped(betweenness_centrality));
        registry.register("closeness_centrality", Algorithm::NodeScoped(closeness_centrality));
        registry.register("pagerank", Algorithm::NodeScoped(pagerank));
        registry.register("clustering", Algorithm::NodeScoped(clustering));
        registry.register("density", Algorithm::GraphScoped(density));
        registry.register("order", Algorithm::GraphScoped(|net| net.order() as f64));
        registry.register("size", Algorithm::GraphScoped(|net| net.size() as f64));
        registry.register("connected_components", Algorithm::GraphScoped(components));
        registry
    }

    /// Register an algorithm, replacing any with the same name.
    pub fn register(&mut self, name: &'static str, algorithm: Algorithm<Ty>) {
        if self.algorithms.insert(name, algorithm).is_some() {
            debug!(name, "replaced graph algorithm");
        }
    }

    pub fn get(&self, name: &str) -> Result<&Algorithm<Ty>> {
        self.algorithms
            .get(name)
            .ok_or_else(|| TethneError::UnknownAlgorithm(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.algorithms.keys().copied()
    }
}

/// Number of incident edges.
pub fn degree<Ty: EdgeType>(net: &Network<Ty>) -> Vec<f64> {
    let g = net.graph();
    g.node_indices()
        .map(|n| {
            let out = g.edges_directed(n, petgraph::Direction::Outgoing).count();
            let incoming = if Ty::is_directed() {
                g.edges_directed(n, petgraph::Direction::Incoming).count()
            } else {
                0
            };
            (out + incoming) as f64
        })
        .collect()
}

pub fn degree_centrality<Ty: EdgeType>(net: &Network<Ty>) -> Vec<f64> {
    let n = net.order();
    if n <= 1 {
        return vec![1.0; n];
    }
    let scale = 1.0 / (n - 1) as f64;
    degree(net).into_iter().map(|d| d * scale).collect()
}

/// Brandes' algorithm on unweighted shortest paths, normalised by
/// `(n - 1)(n - 2)`.
pub fn betweenness_centrality<Ty: EdgeType>(net: &Network<Ty>) -> Vec<f64> {
    let g = net.graph();
    let n = g.node_count();
    let mut centrality = vec![0.0; n];
    for s in g.node_indices() {
        let mut stack = Vec::with_capacity(n);
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0f64; n];
        let mut distance = vec![-1i64; n];
        sigma[s.index()] = 1.0;
        distance[s.index()] = 0;
        let mut queue = VecDeque::from([s]);
        while let Some(v) = queue.pop_front() {
            stack.push(v.index());
            for w in g.neighbors(v) {
                let (vi, wi) = (v.index(), w.index());
                if distance[wi] < 0 {
                    distance[wi] = distance[vi] + 1;
                    queue.push_back(w);
                }
                if distance[wi] == distance[vi] + 1 {
                    sigma[wi] += sigma[vi];
                    predecessors[wi].push(vi);
                }
            }
        }
        let mut delta = vec![0.0f64; n];
        while let Some(w) = stack.pop() {
            for &v in &predecessors[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s.index() {
                centrality[w] += delta[w];
            }
        }
    }
    if n > 2 {
        let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        centrality.iter_mut().for_each(|c| *c *= scale);
    }
    centrality
}

/// Wasserman–Faust closeness: reachable nodes over total distance, scaled
/// by the reachable fraction. Directed graphs use incoming distance.
pub fn closeness_centrality<Ty: EdgeType>(net: &Network<Ty>) -> Vec<f64> {
    let g = net.graph();
    let n = g.node_count();
    g.node_indices()
        .map(|u| {
            let distances = if Ty::is_directed() {
                dijkstra(Reversed(g), u, None, |_| 1usize)
            } else {
                dijkstra(g, u, None, |_| 1usize)
            };
            let total: usize = distances.values().sum();
            let reachable = distances.len().saturating_sub(1);
            if total > 0 && n > 1 {
                (reachable as f64 / total as f64) * (reachable as f64 / (n - 1) as f64)
            } else {
                0.0
            }
        })
        .collect()
}

pub fn pagerank<Ty: EdgeType>(net: &Network<Ty>) -> Vec<f64> {
    if net.order() == 0 {
        return Vec::new();
    }
    page_rank(net.graph(), 0.85_f64, 100)
}

/// Local clustering coefficient, ignoring direction.
pub fn clustering<Ty: EdgeType>(net: &Network<Ty>) -> Vec<f64> {
    let g = net.graph();
    g.node_indices()
        .map(|v| {
            let neighbours: Vec<NodeIndex> = g
                .neighbors_undirected(v)
                .filter(|&w| w != v)
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            let k = neighbours.len();
            if k < 2 {
                return 0.0;
            }
            let mut links = 0usize;
            for (i, &a) in neighbours.iter().enumerate() {
                for &b in &neighbours[i + 1..] {
                    if g.contains_edge(a, b) || g.contains_edge(b, a) {
                        links += 1;
                    }
                }
            }
            2.0 * links as f64 / (k * (k - 1)) as f64
        })
        .collect()
}

pub fn density<Ty: EdgeType>(net: &Network<Ty>) -> f64 {
    let (n, m) = (net.order() as f64, net.size() as f64);
    if n <= 1.0 {
        return 0.0;
    }
    let possible = n * (n - 1.0);
    if Ty::is_directed() {
        m / possible
    } else {
        2.0 * m / possible
    }
}

/// Weakly connected components for directed graphs.
fn components<Ty: EdgeType>(net: &Network<Ty>) -> f64 {
    connected_components(net.graph()) as f64
}

/// Chen's sigma, `(betweenness + 1) ^ burst`, per node and slice.
///
/// `bursts` is keyed by element (as produced by burstiness over the feature
/// set whose elements label the nodes); nodes with no burst in a slice get
/// an exponent of 0. Results are stored as the `sigma` node attribute.
pub fn sigma<Ty: EdgeType>(
    collection: &mut GraphCollection<Ty>,
    bursts: &BTreeMap<Value, Vec<(SliceKey, f64)>>,
) -> Result<BTreeMap<String, Vec<(SliceKey, f64)>>> {
    let by_label: BTreeMap<String, &Vec<(SliceKey, f64)>> =
        bursts.iter().map(|(element, series)| (element.to_string(), series)).collect();
    let Analysis::Nodes { series, .. } = collection.analyze("betweenness_centrality")? else {
        return Err(TethneError::Inconsistency("betweenness must be node-scoped".into()));
    };

    let mut unmatched = 0usize;
    let mut out = BTreeMap::new();
    for (label, centrality) in series {
        let burst_series = by_label.get(&label);
        if burst_series.is_none() {
            unmatched += 1;
        }
        let values: Vec<(SliceKey, f64)> = centrality
            .into_iter()
            .map(|(key, b)| {
                let burst = burst_series
                    .and_then(|s| s.iter().find(|(k, _)| *k == key))
                    .map_or(0.0, |(_, v)| *v);
                (key, (b + 1.0).powf(burst))
            })
            .collect();
        for (key, value) in &values {
            if let Some(graph) = collection.graph_mut(key) {
                graph.set_node_attr(&label, SIGMA_ATTR, *value);
            }
        }
        out.insert(label, values);
    }
    if unmatched > 0 {
        warn!(unmatched, "nodes without burst series; sigma defaults to 1");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{DirectedNetwork, UndirectedNetwork};

    fn path() -> UndirectedNetwork {
        let mut net = UndirectedNetwork::new();
        net.increment_edge("A", "B", 1);
        net.increment_edge("B", "C", 1);
        net
    }

    #[test]
    fn test_path_measures() {
        let net = path();
        assert_eq!(degree(&net), vec![1.0, 2.0, 1.0]);
        assert_eq!(betweenness_centrality(&net), vec![0.0, 1.0, 0.0]);
        let closeness = closeness_centrality(&net);
        assert!((closeness[1] - 1.0).abs() < 1e-12);
        assert!((closeness[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((density(&net) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_triangle_clustering() {
        let mut net = path();
        net.increment_edge("C", "A", 1);
        net.increment_edge("C", "D", 1);
        let c = clustering(&net);
        assert_eq!(c[0], 1.0);
        assert!((c[2] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(c[3], 0.0);
    }

    #[test]
    fn test_pagerank_sums_to_one() {
        let mut net = DirectedNetwork::new();
        net.increment_edge("A", "B", 1);
        net.increment_edge("B", "C", 1);
        net.increment_edge("C", "A", 1);
        let ranks = pagerank(&net);
        assert!((ranks.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_algorithm() {
        let registry = AlgorithmRegistry::<petgraph::Undirected>::with_defaults();
        assert!(matches!(registry.get("eigenvector"), Err(TethneError::UnknownAlgorithm(_))));
        assert!(registry.names().any(|n| n == "connected_components"));
        assert_eq!(components(&path()), 1.0);
    }

    #[test]
    fn test_sigma_uses_burst_as_exponent() {
        let mut collection = GraphCollection::new();
        collection.insert(SliceKey::Point(2000), path());
        let bursts = BTreeMap::from([(Value::from("B"), vec![(SliceKey::Point(2000), 2.0)])]);
        let sigma = sigma(&mut collection, &bursts).unwrap();
        // B sits on the only shortest path: betweenness 1, sigma 2^2.
        assert_eq!(sigma["B"], vec![(SliceKey::Point(2000), 4.0)]);
        assert_eq!(sigma["A"], vec![(SliceKey::Point(2000), 1.0)]);
        let graph = collection.get(&SliceKey::Point(2000)).unwrap();
        assert_eq!(graph.node("B").unwrap().attrs[SIGMA_ATTR], crate::network::Attr::Float(4.0));
    }
}
