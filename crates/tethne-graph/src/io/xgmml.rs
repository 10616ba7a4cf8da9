//! Dynamic XGMML for a whole collection: every node, edge and attribute
//! value carries the `start` / `end` of the slices it appears in.

use std::collections::BTreeMap;
use std::path::Path;

use petgraph::EdgeType;
use tethne_common::Result;
use tethne_corpus::SliceKey;
use tracing::{debug, instrument};

use super::{AttrKind, XmlOut};
use crate::collection::{GraphCollection, GLOBAL_INDEX_ATTR, LABEL_ATTR};
use crate::network::{Attr, Attrs, Network};

const NS: &str = "http://www.cs.rpi.edu/XGMML";

fn type_name(attr: &Attr) -> &'static str {
    match AttrKind::of(attr) {
        AttrKind::Long => "integer",
        AttrKind::Double => "real",
        AttrKind::Text => "string",
    }
}

/// Appearances of one element, in slice order.
type Timeline<'a> = Vec<(SliceKey, &'a Attrs)>;

fn span(timeline: &Timeline<'_>) -> (String, String) {
    let start = timeline.iter().map(|(k, _)| k.start()).min().unwrap_or_default();
    let end = timeline.iter().map(|(k, _)| k.end()).max().unwrap_or_default();
    (start.to_string(), end.to_string())
}

fn atts(out: &mut XmlOut, timeline: &Timeline<'_>) -> Result<()> {
    for (key, attrs) in timeline {
        let (start, end) = (key.start().to_string(), key.end().to_string());
        for (name, value) in attrs.iter() {
            if name == LABEL_ATTR || name == GLOBAL_INDEX_ATTR {
                continue;
            }
            let kind = type_name(value);
            let value = value.to_string();
            out.empty(
                "att",
                &[
                    ("name", name.as_str()),
                    ("type", kind),
                    ("value", value.as_str()),
                    ("start", start.as_str()),
                    ("end", end.as_str()),
                ],
            )?;
        }
    }
    Ok(())
}

#[instrument(skip(collection), fields(path = %path.display(), graphs = collection.len()))]
pub fn write_xgmml_dynamic<Ty: EdgeType>(collection: &GraphCollection<Ty>, path: &Path) -> Result<()> {
    let mut nodes: BTreeMap<usize, Timeline<'_>> = BTreeMap::new();
    let mut edges: BTreeMap<(String, String), Timeline<'_>> = BTreeMap::new();
    for (key, graph) in collection.iter() {
        for node in graph.nodes() {
            if let Some(index) = collection.node_index(&node.label) {
                nodes.entry(index).or_default().push((key, &node.attrs));
            }
        }
        for (u, v, edge) in graph.edges() {
            edges.entry(Network::<Ty>::edge_key(u, v)).or_default().push((key, &edge.attrs));
        }
    }

    let mut out = XmlOut::create(path)?;
    let directed = if Ty::is_directed() { "1" } else { "0" };
    out.start("graph", &[("label", "tethne"), ("directed", directed), ("xmlns", NS)])?;
    for (index, timeline) in &nodes {
        let id = index.to_string();
        let label = collection.label(*index).unwrap_or_default();
        let (start, end) = span(timeline);
        out.start(
            "node",
            &[("label", label), ("id", id.as_str()), ("start", start.as_str()), ("end", end.as_str())],
        )?;
        atts(&mut out, timeline)?;
        out.end("node")?;
    }
    for ((u, v), timeline) in &edges {
        let (Some(source), Some(target)) = (collection.node_index(u), collection.node_index(v)) else {
            continue;
        };
        let (source, target) = (source.to_string(), target.to_string());
        let label = format!("{u} (interacts_with) {v}");
        let (start, end) = span(timeline);
        out.start(
            "edge",
            &[
                ("label", label.as_str()),
                ("source", source.as_str()),
                ("target", target.as_str()),
                ("start", start.as_str()),
                ("end", end.as_str()),
            ],
        )?;
        atts(&mut out, timeline)?;
        out.end("edge")?;
    }
    out.end("graph")?;
    out.finish()?;
    debug!(nodes = nodes.len(), edges = edges.len(), "wrote dynamic XGMML");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::UndirectedNetwork;

    #[test]
    fn test_dynamic_spans() {
        let mut collection = GraphCollection::new();
        let mut first = UndirectedNetwork::new();
        first.increment_edge("A", "B", 1);
        let mut second = UndirectedNetwork::new();
        second.increment_edge("B", "A", 3);
        second.add_node("C");
        collection.insert(SliceKey::Point(2000), first);
        collection.insert(SliceKey::Point(2001), second);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dynamic.xgmml");
        write_xgmml_dynamic(&collection, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains(r#"<node label="A" id="0" start="2000" end="2002">"#));
        assert!(text.contains(r#"<node label="C" id="2" start="2001" end="2002">"#));
        assert!(text.contains(r#"<att name="weight" type="integer" value="3" start="2001" end="2002"/>"#));
        assert!(!text.contains(r#"name="global_index""#));
    }
}
