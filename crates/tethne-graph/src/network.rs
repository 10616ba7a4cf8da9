//! petgraph `Graph` wrapper keyed by node label.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use petgraph::graph::{EdgeIndex, Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::{Directed, EdgeType, Undirected};
use serde::{Deserialize, Serialize};
use tethne_common::Value;

/// Node or edge attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Attr {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Attr>),
}

impl Attr {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Attr::Int(i) => Some(*i as f64),
            Attr::Float(f) => Some(*f),
            Attr::Text(s) => s.trim().parse().ok(),
            Attr::List(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Attr::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attr::Int(i) => write!(f, "{i}"),
            Attr::Float(x) => write!(f, "{x}"),
            Attr::Text(s) => f.write_str(s),
            Attr::List(items) => {
                let json = serde_json::to_string(items).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<i64> for Attr {
    fn from(v: i64) -> Self {
        Attr::Int(v)
    }
}

impl From<f64> for Attr {
    fn from(v: f64) -> Self {
        Attr::Float(v)
    }
}

impl From<&str> for Attr {
    fn from(v: &str) -> Self {
        Attr::Text(v.to_string())
    }
}

impl From<String> for Attr {
    fn from(v: String) -> Self {
        Attr::Text(v)
    }
}

impl From<&Value> for Attr {
    fn from(v: &Value) -> Self {
        match v {
            Value::Int(i) => Attr::Int(*i),
            Value::Text(s) => Attr::Text(s.clone()),
            Value::List(items) => Attr::List(items.iter().map(Attr::from).collect()),
        }
    }
}

pub type Attrs = BTreeMap<String, Attr>;

#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub label: String,
    pub attrs: Attrs,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeData {
    pub attrs: Attrs,
}

impl EdgeData {
    pub const WEIGHT: &'static str = "weight";

    /// The `weight` attribute; unweighted edges weigh 1.
    pub fn weight(&self) -> f64 {
        self.attrs.get(Self::WEIGHT).and_then(Attr::as_f64).unwrap_or(1.0)
    }

    /// Record a value that may repeat: the first is stored as a scalar,
    /// later ones turn the attribute into a list.
    pub fn accumulate(&mut self, key: &str, value: Attr) {
        match self.attrs.get_mut(key) {
            None => {
                self.attrs.insert(key.to_string(), value);
            }
            Some(Attr::List(items)) => items.push(value),
            Some(existing) => {
                let first = existing.clone();
                *existing = Attr::List(vec![first, value]);
            }
        }
    }
}

/// A labelled graph. Labels are unique; node indices follow insertion order.
#[derive(Debug)]
pub struct Network<Ty: EdgeType = Undirected> {
    graph: Graph<NodeData, EdgeData, Ty>,
    index: HashMap<String, NodeIndex>,
}

pub type UndirectedNetwork = Network<Undirected>;
pub type DirectedNetwork = Network<Directed>;

impl<Ty: EdgeType> Clone for Network<Ty> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            index: self.index.clone(),
        }
    }
}

impl<Ty: EdgeType> Default for Network<Ty> {
    fn default() -> Self {
        Self {
            graph: Graph::default(),
            index: HashMap::new(),
        }
    }
}

impl<Ty: EdgeType> Network<Ty> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_directed(&self) -> bool {
        Ty::is_directed()
    }

    pub fn graph(&self) -> &Graph<NodeData, EdgeData, Ty> {
        &self.graph
    }

    /// Get or create the node for `label`.
    pub fn add_node(&mut self, label: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(label) {
            return idx;
        }
        let idx = self.graph.add_node(NodeData {
            label: label.to_string(),
            attrs: Attrs::new(),
        });
        self.index.insert(label.to_string(), idx);
        idx
    }

    /// Get or create the node and merge `attrs` into it.
    pub fn add_node_with(&mut self, label: &str, attrs: impl IntoIterator<Item = (String, Attr)>) -> NodeIndex {
        let idx = self.add_node(label);
        self.graph[idx].attrs.extend(attrs);
        idx
    }

    pub fn set_node_attr(&mut self, label: &str, key: &str, value: impl Into<Attr>) -> bool {
        match self.index.get(label) {
            Some(&idx) => {
                self.graph[idx].attrs.insert(key.to_string(), value.into());
                true
            }
            None => false,
        }
    }

    pub fn node_index(&self, label: &str) -> Option<NodeIndex> {
        self.index.get(label).copied()
    }

    pub fn node(&self, label: &str) -> Option<&NodeData> {
        self.node_index(label).map(|idx| &self.graph[idx])
    }

    pub fn contains_node(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    /// Labels in insertion order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(|n| n.label.as_str())
    }

    fn edge_index(&self, u: &str, v: &str) -> Option<EdgeIndex> {
        let (a, b) = (self.node_index(u)?, self.node_index(v)?);
        self.graph.find_edge(a, b)
    }

    pub fn edge(&self, u: &str, v: &str) -> Option<&EdgeData> {
        self.edge_index(u, v).map(|e| &self.graph[e])
    }

    pub fn contains_edge(&self, u: &str, v: &str) -> bool {
        self.edge_index(u, v).is_some()
    }

    fn ensure_edge(&mut self, u: &str, v: &str) -> EdgeIndex {
        let (a, b) = (self.add_node(u), self.add_node(v));
        match self.graph.find_edge(a, b) {
            Some(e) => e,
            None => self.graph.add_edge(a, b, EdgeData::default()),
        }
    }

    /// Create the edge if needed and overwrite the given attributes.
    pub fn add_or_update_edge(&mut self, u: &str, v: &str, attrs: impl IntoIterator<Item = (String, Attr)>) -> &mut EdgeData {
        let e = self.ensure_edge(u, v);
        let data = &mut self.graph[e];
        data.attrs.extend(attrs);
        data
    }

    /// Add `by` to the edge's integer weight, creating the edge at 0.
    pub fn increment_edge(&mut self, u: &str, v: &str, by: i64) -> &mut EdgeData {
        let e = self.ensure_edge(u, v);
        let data = &mut self.graph[e];
        let current = match data.attrs.get(EdgeData::WEIGHT) {
            Some(Attr::Int(w)) => *w,
            Some(other) => other.as_f64().unwrap_or(0.0) as i64,
            None => 0,
        };
        data.attrs.insert(EdgeData::WEIGHT.to_string(), Attr::Int(current + by));
        data
    }

    pub fn remove_edge(&mut self, u: &str, v: &str) -> Option<EdgeData> {
        let e = self.edge_index(u, v)?;
        self.graph.remove_edge(e)
    }

    /// Number of nodes.
    pub fn order(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    pub fn size(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeData> {
        self.graph.node_weights()
    }

    /// `(source label, target label, data)` for every edge.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &EdgeData)> {
        self.graph.edge_references().map(move |e| {
            (
                self.graph[e.source()].label.as_str(),
                self.graph[e.target()].label.as_str(),
                &self.graph[e.id()],
            )
        })
    }

    /// Endpoint pair identifying an edge across graphs; unordered for
    /// undirected graphs.
    pub fn edge_key(u: &str, v: &str) -> (String, String) {
        if !Ty::is_directed() && v < u {
            (v.to_string(), u.to_string())
        } else {
            (u.to_string(), v.to_string())
        }
    }

    /// Neighbour labels, ignoring direction.
    pub fn neighbors(&self, label: &str) -> Vec<&str> {
        let Some(idx) = self.node_index(label) else { return Vec::new() };
        let mut seen: Vec<&str> = self
            .graph
            .neighbors_undirected(idx)
            .map(|n| self.graph[n].label.as_str())
            .collect();
        seen.sort_unstable();
        seen.dedup();
        seen
    }

    pub(crate) fn node_attrs_mut(&mut self, label: &str) -> Option<&mut Attrs> {
        let idx = self.node_index(label)?;
        Some(&mut self.graph[idx].attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_node_is_idempotent() {
        let mut net = UndirectedNetwork::new();
        let a = net.add_node("A");
        assert_eq!(net.add_node("A"), a);
        assert_eq!(net.order(), 1);
    }

    #[test]
    fn test_increment_edge_accumulates_weight() {
        let mut net = UndirectedNetwork::new();
        net.increment_edge("A", "B", 1);
        net.increment_edge("B", "A", 2);
        assert_eq!(net.size(), 1);
        assert_eq!(net.edge("A", "B").unwrap().attrs["weight"], Attr::Int(3));
    }

    #[test]
    fn test_directed_edges_are_ordered() {
        let mut net = DirectedNetwork::new();
        net.increment_edge("A", "B", 1);
        assert!(net.contains_edge("A", "B"));
        assert!(!net.contains_edge("B", "A"));
        assert_eq!(DirectedNetwork::edge_key("B", "A"), ("B".to_string(), "A".to_string()));
        assert_eq!(UndirectedNetwork::edge_key("B", "A"), ("A".to_string(), "B".to_string()));
    }

    #[test]
    fn test_accumulate_turns_repeats_into_list() {
        let mut edge = EdgeData::default();
        edge.accumulate("date", Attr::Int(2012));
        assert_eq!(edge.attrs["date"], Attr::Int(2012));
        edge.accumulate("date", Attr::Int(2013));
        edge.accumulate("date", Attr::Int(2014));
        assert_eq!(
            edge.attrs["date"],
            Attr::List(vec![Attr::Int(2012), Attr::Int(2013), Attr::Int(2014)])
        );
    }
}
