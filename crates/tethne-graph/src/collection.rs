//! Time-keyed sequence of graphs sharing one global node index.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use petgraph::{EdgeType, Undirected};
use tethne_common::Result;
use tethne_corpus::{Corpus, SliceKey, SliceSpec};
use tracing::{debug, info, instrument};

use crate::analysis::{Algorithm, AlgorithmRegistry};
use crate::network::{Attr, Network};

pub const LABEL_ATTR: &str = "label";
pub const GLOBAL_INDEX_ATTR: &str = "global_index";
pub const ATTACHMENT_ATTR: &str = "attachment_probability";

/// Per-slice and per-node output of [`GraphCollection::analyze`].
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    Graph(BTreeMap<SliceKey, f64>),
    Nodes {
        by_slice: BTreeMap<SliceKey, BTreeMap<String, f64>>,
        /// Node label → `(slice, value)` for each slice containing the node.
        series: BTreeMap<String, Vec<(SliceKey, f64)>>,
    },
}

/// Graphs ordered by slice key. A label maps to the same integer in every
/// graph; indices are assigned on first sight and never reused.
#[derive(Debug)]
pub struct GraphCollection<Ty: EdgeType = Undirected> {
    graphs: BTreeMap<SliceKey, Network<Ty>>,
    index: HashMap<String, usize>,
    labels: Vec<String>,
    members: BTreeMap<SliceKey, BTreeSet<usize>>,
}

impl<Ty: EdgeType> Clone for GraphCollection<Ty> {
    fn clone(&self) -> Self {
        Self {
            graphs: self.graphs.clone(),
            index: self.index.clone(),
            labels: self.labels.clone(),
            members: self.members.clone(),
        }
    }
}

impl<Ty: EdgeType> Default for GraphCollection<Ty> {
    fn default() -> Self {
        Self {
            graphs: BTreeMap::new(),
            index: HashMap::new(),
            labels: Vec::new(),
            members: BTreeMap::new(),
        }
    }
}

impl<Ty: EdgeType> GraphCollection<Ty> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slice `corpus` and run `builder` on every sub-corpus.
    #[instrument(skip(corpus, builder), fields(papers = corpus.len()))]
    pub fn build<F>(corpus: &Corpus, spec: &SliceSpec, mut builder: F) -> Result<Self>
    where
        F: FnMut(&Corpus) -> Result<Network<Ty>>,
    {
        let mut collection = Self::new();
        for (key, sub) in corpus.slice(spec)? {
            let network = builder(&sub)?;
            debug!(slice = %key, order = network.order(), size = network.size(), "built slice graph");
            collection.insert(key, network);
        }
        info!(graphs = collection.len(), nodes = collection.labels.len(), "built graph collection");
        Ok(collection)
    }

    /// Store `network` under `key`, registering its labels in the global
    /// index and stamping `label` / `global_index` on every node.
    pub fn insert(&mut self, key: SliceKey, mut network: Network<Ty>) {
        let labels: Vec<String> = network.labels().map(str::to_string).collect();
        let mut present = BTreeSet::new();
        for label in labels {
            let global = match self.index.get(&label) {
                Some(&i) => i,
                None => {
                    let i = self.labels.len();
                    self.index.insert(label.clone(), i);
                    self.labels.push(label.clone());
                    i
                }
            };
            network.set_node_attr(&label, LABEL_ATTR, label.as_str());
            network.set_node_attr(&label, GLOBAL_INDEX_ATTR, global as i64);
            present.insert(global);
        }
        self.members.insert(key, present);
        self.graphs.insert(key, network);
    }

    pub fn keys(&self) -> impl Iterator<Item = SliceKey> + '_ {
        self.graphs.keys().copied()
    }

    pub fn get(&self, key: &SliceKey) -> Option<&Network<Ty>> {
        self.graphs.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SliceKey, &Network<Ty>)> {
        self.graphs.iter().map(|(k, g)| (*k, g))
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    pub fn node_index(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Every label seen so far, by global index.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Global indices of the nodes present in one slice.
    pub fn nodes_in(&self, key: &SliceKey) -> Vec<usize> {
        self.members.get(key).map(|m| m.iter().copied().collect()).unwrap_or_default()
    }

    /// `(slice, value)` of a node attribute across the slices holding it.
    pub fn node_history(&self, label: &str, attr: &str) -> Vec<(SliceKey, Attr)> {
        self.graphs
            .iter()
            .filter_map(|(k, g)| g.node(label)?.attrs.get(attr).map(|v| (*k, v.clone())))
            .collect()
    }

    /// `(slice, value)` of an edge attribute across the slices holding it.
    pub fn edge_history(&self, (u, v): (&str, &str), attr: &str) -> Vec<(SliceKey, Attr)> {
        self.graphs
            .iter()
            .filter_map(|(k, g)| g.edge(u, v)?.attrs.get(attr).map(|a| (*k, a.clone())))
            .collect()
    }

    /// Run a built-in algorithm on every graph.
    pub fn analyze(&mut self, name: &str) -> Result<Analysis> {
        self.analyze_with(&AlgorithmRegistry::with_defaults(), name)
    }

    /// Run `name` from `registry` on every graph. Node-scoped results are
    /// also stored as a node attribute called `name`.
    #[instrument(skip(self, registry))]
    pub fn analyze_with(&mut self, registry: &AlgorithmRegistry<Ty>, name: &str) -> Result<Analysis> {
        match registry.get(name)? {
            Algorithm::GraphScoped(measure) => Ok(Analysis::Graph(
                self.graphs.iter().map(|(k, g)| (*k, measure(g))).collect(),
            )),
            Algorithm::NodeScoped(measure) => {
                let mut by_slice = BTreeMap::new();
                let mut series: BTreeMap<String, Vec<(SliceKey, f64)>> = BTreeMap::new();
                for (key, graph) in self.graphs.iter_mut() {
                    let values = measure(graph);
                    let labelled: Vec<(String, f64)> = graph
                        .labels()
                        .zip(values)
                        .map(|(label, v)| (label.to_string(), v))
                        .collect();
                    for (label, v) in &labelled {
                        graph.set_node_attr(label, name, *v);
                        series.entry(label.clone()).or_default().push((*key, *v));
                    }
                    by_slice.insert(*key, labelled.into_iter().collect());
                }
                Ok(Analysis::Nodes { by_slice, series })
            }
        }
    }

    /// New edges each node gained relative to the previous graph, divided
    /// by all new edges in the graph unless `raw`. Every node of the first
    /// graph gets 1.0. Also stored as `attachment_probability`.
    pub fn attachment_probability(&mut self, raw: bool) -> BTreeMap<SliceKey, BTreeMap<String, f64>> {
        let mut out = BTreeMap::new();
        let mut previous: Option<HashSet<(String, String)>> = None;
        for (key, graph) in self.graphs.iter_mut() {
            let current: HashSet<(String, String)> = graph
                .edges()
                .map(|(u, v, _)| Network::<Ty>::edge_key(u, v))
                .collect();
            let mut values: BTreeMap<String, f64> = graph.labels().map(|l| (l.to_string(), 0.0)).collect();
            match &previous {
                None => values.values_mut().for_each(|v| *v = 1.0),
                Some(before) => {
                    let fresh: Vec<&(String, String)> = current.iter().filter(|e| !before.contains(*e)).collect();
                    for (u, v) in &fresh {
                        for end in [u, v] {
                            if let Some(count) = values.get_mut(end.as_str()) {
                                *count += 1.0;
                            }
                        }
                    }
                    if !raw && !fresh.is_empty() {
                        let total = fresh.len() as f64;
                        values.values_mut().for_each(|v| *v /= total);
                    }
                }
            }
            for (label, v) in &values {
                graph.set_node_attr(label, ATTACHMENT_ATTR, *v);
            }
            out.insert(*key, values);
            previous = Some(current);
        }
        out
    }

    pub(crate) fn graph_mut(&mut self, key: &SliceKey) -> Option<&mut Network<Ty>> {
        self.graphs.get_mut(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::UndirectedNetwork;
    use tethne_common::TethneError;

    fn net(edges: &[(&str, &str)]) -> UndirectedNetwork {
        let mut n = UndirectedNetwork::new();
        for (u, v) in edges {
            n.increment_edge(u, v, 1);
        }
        n
    }

    fn collection() -> GraphCollection {
        let mut c = GraphCollection::new();
        c.insert(SliceKey::Point(2000), net(&[("A", "B")]));
        c.insert(SliceKey::Point(2001), net(&[("C", "A"), ("A", "B"), ("C", "D")]));
        c
    }

    #[test]
    fn test_global_index_is_stable() {
        let c = collection();
        assert_eq!(c.node_index("A"), Some(0));
        assert_eq!(c.node_index("C"), Some(2));
        assert_eq!(c.nodes_in(&SliceKey::Point(2000)), vec![0, 1]);
        assert_eq!(c.nodes_in(&SliceKey::Point(2001)), vec![0, 1, 2, 3]);
        let g = c.get(&SliceKey::Point(2001)).unwrap();
        assert_eq!(g.node("A").unwrap().attrs[GLOBAL_INDEX_ATTR], Attr::Int(0));
        assert_eq!(g.node("D").unwrap().attrs[LABEL_ATTR], Attr::from("D"));
    }

    #[test]
    fn test_histories() {
        let c = collection();
        assert_eq!(
            c.edge_history(("B", "A"), "weight"),
            vec![(SliceKey::Point(2000), Attr::Int(1)), (SliceKey::Point(2001), Attr::Int(1))]
        );
        assert_eq!(c.node_history("D", LABEL_ATTR).len(), 1);
    }

    #[test]
    fn test_analyze_degree_series() {
        let mut c = collection();
        let Analysis::Nodes { series, by_slice } = c.analyze("degree").unwrap() else {
            panic!("degree is node-scoped");
        };
        assert_eq!(series["A"], vec![(SliceKey::Point(2000), 1.0), (SliceKey::Point(2001), 2.0)]);
        assert_eq!(by_slice[&SliceKey::Point(2001)]["D"], 1.0);
        assert_eq!(c.node_history("A", "degree")[1].1, Attr::Float(2.0));

        let Analysis::Graph(order) = c.analyze("order").unwrap() else {
            panic!("order is graph-scoped");
        };
        assert_eq!(order[&SliceKey::Point(2001)], 4.0);
        assert!(matches!(c.analyze("nonsense"), Err(TethneError::UnknownAlgorithm(_))));
    }

    #[test]
    fn test_attachment_probability() {
        let mut c = collection();
        let probs = c.attachment_probability(false);
        assert_eq!(probs[&SliceKey::Point(2000)]["A"], 1.0);
        let second = &probs[&SliceKey::Point(2001)];
        assert_eq!(second["C"], 1.0);
        assert_eq!(second["A"], 0.5);
        assert_eq!(second["B"], 0.0);
        let raw = c.attachment_probability(true);
        assert_eq!(raw[&SliceKey::Point(2001)]["C"], 2.0);
        assert_eq!(c.node_history("C", ATTACHMENT_ATTR)[0].1, Attr::Float(2.0));
    }
}
