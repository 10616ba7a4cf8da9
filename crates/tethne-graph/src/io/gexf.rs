//! GEXF 1.2 (static graphs).

use std::collections::HashMap;
use std::path::Path;

use petgraph::EdgeType;
use tethne_common::Result;
use tracing::{debug, instrument};

use super::{attr_kinds, AttrKind, XmlOut};
use crate::network::{Attr, EdgeData, Network};

const NS: &str = "http://www.gexf.net/1.2draft";

fn type_name(kind: AttrKind) -> &'static str {
    match kind {
        AttrKind::Long => "long",
        AttrKind::Double => "double",
        AttrKind::Text => "string",
    }
}

fn declare(out: &mut XmlOut, class: &str, kinds: &[(&String, &AttrKind)]) -> Result<()> {
    if kinds.is_empty() {
        return Ok(());
    }
    out.start("attributes", &[("class", class)])?;
    for (i, (name, kind)) in kinds.iter().enumerate() {
        let id = i.to_string();
        out.empty(
            "attribute",
            &[("id", id.as_str()), ("title", name.as_str()), ("type", type_name(**kind))],
        )?;
    }
    out.end("attributes")
}

fn attvalues<'a>(
    out: &mut XmlOut,
    ids: &HashMap<&str, String>,
    attrs: impl Iterator<Item = (&'a String, &'a Attr)>,
) -> Result<()> {
    let values: Vec<(&String, String)> = attrs
        .filter(|(name, _)| ids.contains_key(name.as_str()))
        .map(|(name, value)| (name, value.to_string()))
        .collect();
    if values.is_empty() {
        return Ok(());
    }
    out.start("attvalues", &[])?;
    for (name, value) in &values {
        out.empty("attvalue", &[("for", ids[name.as_str()].as_str()), ("value", value.as_str())])?;
    }
    out.end("attvalues")
}

/// Write `net` as GEXF. A numeric `weight` goes on the edge element itself.
#[instrument(skip(net), fields(path = %path.display()))]
pub fn write_gexf<Ty: EdgeType>(net: &Network<Ty>, path: &Path) -> Result<()> {
    let node_kinds = attr_kinds(net.nodes().map(|n| &n.attrs));
    let mut edge_kinds = attr_kinds(net.edges().map(|(_, _, e)| &e.attrs));
    edge_kinds.remove(EdgeData::WEIGHT);
    let node_kinds: Vec<_> = node_kinds.iter().collect();
    let edge_kinds: Vec<_> = edge_kinds.iter().collect();
    let node_ids: HashMap<&str, String> = node_kinds.iter().enumerate().map(|(i, (n, _))| (n.as_str(), i.to_string())).collect();
    let edge_ids: HashMap<&str, String> = edge_kinds.iter().enumerate().map(|(i, (n, _))| (n.as_str(), i.to_string())).collect();

    let mut out = XmlOut::create(path)?;
    out.start("gexf", &[("xmlns", NS), ("version", "1.2")])?;
    let edgetype = if Ty::is_directed() { "directed" } else { "undirected" };
    out.start("graph", &[("mode", "static"), ("defaultedgetype", edgetype)])?;
    declare(&mut out, "node", &node_kinds)?;
    declare(&mut out, "edge", &edge_kinds)?;

    let mut position: HashMap<&str, String> = HashMap::new();
    out.start("nodes", &[])?;
    for (i, node) in net.nodes().enumerate() {
        let id = i.to_string();
        out.start("node", &[("id", id.as_str()), ("label", node.label.as_str())])?;
        attvalues(&mut out, &node_ids, node.attrs.iter())?;
        out.end("node")?;
        position.insert(node.label.as_str(), id);
    }
    out.end("nodes")?;

    out.start("edges", &[])?;
    for (i, (u, v, edge)) in net.edges().enumerate() {
        let id = i.to_string();
        let weight = edge.weight().to_string();
        out.start(
            "edge",
            &[
                ("id", id.as_str()),
                ("source", position[u].as_str()),
                ("target", position[v].as_str()),
                ("weight", weight.as_str()),
            ],
        )?;
        attvalues(&mut out, &edge_ids, edge.attrs.iter())?;
        out.end("edge")?;
    }
    out.end("edges")?;
    out.end("graph")?;
    out.end("gexf")?;
    out.finish()?;
    debug!(order = net.order(), size = net.size(), "wrote GEXF");
    Ok(())
}
