//! GraphML. Node ids are labels; list attributes travel as JSON strings and
//! are restored on read.

use std::collections::HashMap;
use std::path::Path;

use petgraph::EdgeType;
use quick_xml::events::{BytesStart, Event};
use tethne_common::{Result, TethneError};
use tracing::{debug, instrument};

use super::{attr_kinds, AttrKind, XmlOut};
use crate::network::{Attr, Attrs, Network};

const NS: &str = "http://graphml.graphdrawing.org/xmlns";

fn type_name(kind: AttrKind) -> &'static str {
    match kind {
        AttrKind::Long => "long",
        AttrKind::Double => "double",
        AttrKind::Text => "string",
    }
}

#[instrument(skip(net), fields(path = %path.display()))]
pub fn write_graphml<Ty: EdgeType>(net: &Network<Ty>, path: &Path) -> Result<()> {
    let node_kinds = attr_kinds(net.nodes().map(|n| &n.attrs));
    let edge_kinds = attr_kinds(net.edges().map(|(_, _, e)| &e.attrs));

    let mut out = XmlOut::create(path)?;
    out.start("graphml", &[("xmlns", NS)])?;
    let mut node_keys = HashMap::new();
    for (i, (name, kind)) in node_kinds.iter().enumerate() {
        let id = format!("n{i}");
        out.empty(
            "key",
            &[("id", id.as_str()), ("for", "node"), ("attr.name", name.as_str()), ("attr.type", type_name(*kind))],
        )?;
        node_keys.insert(name.as_str(), id);
    }
    let mut edge_keys = HashMap::new();
    for (i, (name, kind)) in edge_kinds.iter().enumerate() {
        let id = format!("e{i}");
        out.empty(
            "key",
            &[("id", id.as_str()), ("for", "edge"), ("attr.name", name.as_str()), ("attr.type", type_name(*kind))],
        )?;
        edge_keys.insert(name.as_str(), id);
    }

    let edgedefault = if Ty::is_directed() { "directed" } else { "undirected" };
    out.start("graph", &[("id", "G"), ("edgedefault", edgedefault)])?;
    for node in net.nodes() {
        out.start("node", &[("id", node.label.as_str())])?;
        for (name, value) in &node.attrs {
            out.text("data", &[("key", node_keys[name.as_str()].as_str())], &value.to_string())?;
        }
        out.end("node")?;
    }
    for (u, v, edge) in net.edges() {
        out.start("edge", &[("source", u), ("target", v)])?;
        for (name, value) in &edge.attrs {
            out.text("data", &[("key", edge_keys[name.as_str()].as_str())], &value.to_string())?;
        }
        out.end("edge")?;
    }
    out.end("graph")?;
    out.end("graphml")?;
    out.finish()?;
    debug!(order = net.order(), size = net.size(), "wrote GraphML");
    Ok(())
}

fn parse_value(kind: AttrKind, text: &str) -> Attr {
    match kind {
        AttrKind::Long => text.parse().map(Attr::Int).unwrap_or_else(|_| Attr::from(text)),
        AttrKind::Double => text.parse().map(Attr::Float).unwrap_or_else(|_| Attr::from(text)),
        AttrKind::Text if text.starts_with('[') => {
            serde_json::from_str::<Vec<Attr>>(text).map(Attr::List).unwrap_or_else(|_| Attr::from(text))
        }
        AttrKind::Text => Attr::from(text),
    }
}

fn attributes(tag: &BytesStart<'_>) -> Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    for attr in tag.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        out.insert(key, attr.unescape_value()?.into_owned());
    }
    Ok(out)
}

enum Owner {
    Node(String),
    Edge(String, String, Attrs),
}

/// Read a GraphML file written by [`write_graphml`] or another tool. The
/// file's `edgedefault` must match `Ty`.
#[instrument(fields(path = %path.display()))]
pub fn read_graphml<Ty: EdgeType>(path: &Path) -> Result<Network<Ty>> {
    let xml = std::fs::read_to_string(path)?;
    let mut reader = quick_xml::Reader::from_str(&xml);
    reader.config_mut().trim_text(true);

    let mut net = Network::<Ty>::new();
    let mut keys: HashMap<String, (String, AttrKind)> = HashMap::new();
    let mut owner: Option<Owner> = None;
    let mut data_key: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?;
        let is_empty = matches!(event, Event::Empty(_));
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let attrs = attributes(e)?;
                let get = |k: &str| attrs.get(k).cloned().unwrap_or_default();
                match e.name().as_ref() {
                    b"key" => {
                        let kind = match attrs.get("attr.type").map(String::as_str) {
                            Some("int" | "long") => AttrKind::Long,
                            Some("float" | "double") => AttrKind::Double,
                            _ => AttrKind::Text,
                        };
                        keys.insert(get("id"), (get("attr.name"), kind));
                    }
                    b"graph" => {
                        let directed = attrs.get("edgedefault").map(String::as_str) == Some("directed");
                        if directed != Ty::is_directed() {
                            return Err(TethneError::input_format(
                                path,
                                None,
                                format!("edgedefault is {}", get("edgedefault")),
                            ));
                        }
                    }
                    b"node" => {
                        let id = get("id");
                        net.add_node(&id);
                        if !is_empty {
                            owner = Some(Owner::Node(id));
                        }
                    }
                    b"edge" => {
                        let (source, target) = (get("source"), get("target"));
                        if is_empty {
                            net.add_or_update_edge(&source, &target, std::iter::empty());
                        } else {
                            owner = Some(Owner::Edge(source, target, Attrs::new()));
                        }
                    }
                    b"data" if !is_empty => data_key = attrs.get("key").cloned(),
                    _ => {}
                }
            }
            Event::Text(ref e) => {
                let text = e.unescape()?;
                if let (Some(key), Some(owner)) = (data_key.as_ref(), owner.as_mut()) {
                    let Some((name, kind)) = keys.get(key) else {
                        return Err(TethneError::input_format(path, None, format!("undeclared key {key}")));
                    };
                    let value = parse_value(*kind, &text);
                    match owner {
                        Owner::Node(id) => {
                            net.set_node_attr(id, name, value);
                        }
                        Owner::Edge(_, _, attrs) => {
                            attrs.insert(name.clone(), value);
                        }
                    }
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"data" => data_key = None,
                b"node" => owner = None,
                b"edge" => {
                    if let Some(Owner::Edge(source, target, attrs)) = owner.take() {
                        net.add_or_update_edge(&source, &target, attrs);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    debug!(order = net.order(), size = net.size(), "read GraphML");
    Ok(net)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{DirectedNetwork, UndirectedNetwork};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_graphml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.graphml");
        let mut net = UndirectedNetwork::new();
        net.add_node_with("SMITH J", [("count".to_string(), Attr::Int(2))]);
        let edge = net.increment_edge("SMITH J", "DOE A & CO", 2);
        edge.accumulate("date", Attr::Int(2010));
        edge.accumulate("date", Attr::Int(2011));
        net.add_or_update_edge("DOE A & CO", "ROE <B>", [("weight".to_string(), Attr::Float(0.5))]);
        write_graphml(&net, &path).unwrap();

        let back: UndirectedNetwork = read_graphml(&path).unwrap();
        assert_eq!(back.order(), 3);
        assert_eq!(back.node("SMITH J").unwrap().attrs["count"], Attr::Int(2));
        let edge = back.edge("DOE A & CO", "SMITH J").unwrap();
        // weight widens to double across edges.
        assert_eq!(edge.attrs["weight"], Attr::Float(2.0));
        assert_eq!(edge.attrs["date"], Attr::List(vec![Attr::Int(2010), Attr::Int(2011)]));
    }

    #[test]
    fn test_direction_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.graphml");
        let mut net = DirectedNetwork::new();
        net.increment_edge("A", "B", 1);
        write_graphml(&net, &path).unwrap();
        assert!(read_graphml::<petgraph::Undirected>(&path).is_err());
        let back: DirectedNetwork = read_graphml(&path).unwrap();
        assert!(back.contains_edge("A", "B"));
        assert!(!back.contains_edge("B", "A"));
    }
}
