//! Cytoscape simple interaction format, with one `.noa` / `.eda` sibling
//! file per node / edge attribute.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use petgraph::EdgeType;
use tethne_common::Result;
use tracing::{debug, instrument};

use super::{attr_kinds, AttrKind};
use crate::network::Network;

const RELATION: &str = "interacts_with";

fn class_name(kind: AttrKind) -> &'static str {
    match kind {
        AttrKind::Long => "java.lang.Integer",
        AttrKind::Double => "java.lang.Double",
        AttrKind::Text => "java.lang.String",
    }
}

fn sibling(path: &Path, attr: &str, extension: &str) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    path.with_file_name(format!("{stem}_{attr}.{extension}"))
}

/// Write `net` to `path` and its attributes alongside. Returns every file
/// written, the interaction file first.
#[instrument(skip(net), fields(path = %path.display()))]
pub fn write_sif<Ty: EdgeType>(net: &Network<Ty>, path: &Path) -> Result<Vec<PathBuf>> {
    let mut written = vec![path.to_path_buf()];
    let mut out = BufWriter::new(File::create(path)?);
    let mut connected = std::collections::HashSet::new();
    for (u, v, _) in net.edges() {
        writeln!(out, "{u}\t{RELATION}\t{v}")?;
        connected.insert(u);
        connected.insert(v);
    }
    for label in net.labels().filter(|l| !connected.contains(l)) {
        writeln!(out, "{label}")?;
    }
    out.flush()?;

    for (attr, kind) in attr_kinds(net.nodes().map(|n| &n.attrs)) {
        let file = sibling(path, &attr, "noa");
        let mut out = BufWriter::new(File::create(&file)?);
        writeln!(out, "{attr} (class={})", class_name(kind))?;
        for node in net.nodes() {
            if let Some(value) = node.attrs.get(&attr) {
                writeln!(out, "{} = {value}", node.label)?;
            }
        }
        out.flush()?;
        written.push(file);
    }

    for (attr, kind) in attr_kinds(net.edges().map(|(_, _, e)| &e.attrs)) {
        let file = sibling(path, &attr, "eda");
        let mut out = BufWriter::new(File::create(&file)?);
        writeln!(out, "{attr} (class={})", class_name(kind))?;
        for (u, v, edge) in net.edges() {
            if let Some(value) = edge.attrs.get(&attr) {
                writeln!(out, "{u} ({RELATION}) {v} = {value}")?;
            }
        }
        out.flush()?;
        written.push(file);
    }
    debug!(files = written.len(), "wrote SIF");
    Ok(written)
}
