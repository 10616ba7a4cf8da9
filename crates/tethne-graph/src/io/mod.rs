//! Graph serialisation: GraphML (read and write), GEXF, SIF and dynamic
//! XGMML.

pub mod gexf;
pub mod graphml;
pub mod sif;
pub mod xgmml;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tethne_common::Result;

use crate::network::{Attr, Attrs};

pub use gexf::write_gexf;
pub use graphml::{read_graphml, write_graphml};
pub use sif::write_sif;
pub use xgmml::write_xgmml_dynamic;

/// Declared type of an attribute column. Lists are written as JSON text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttrKind {
    Long,
    Double,
    Text,
}

impl AttrKind {
    fn of(attr: &Attr) -> Self {
        match attr {
            Attr::Int(_) => AttrKind::Long,
            Attr::Float(_) => AttrKind::Double,
            Attr::Text(_) | Attr::List(_) => AttrKind::Text,
        }
    }

    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (AttrKind::Long, AttrKind::Double) | (AttrKind::Double, AttrKind::Long) => AttrKind::Double,
            _ => AttrKind::Text,
        }
    }
}

/// Column types over every attribute map, widening on conflicts.
pub(crate) fn attr_kinds<'a>(maps: impl IntoIterator<Item = &'a Attrs>) -> BTreeMap<String, AttrKind> {
    let mut kinds: BTreeMap<String, AttrKind> = BTreeMap::new();
    for attrs in maps {
        for (name, value) in attrs {
            let kind = AttrKind::of(value);
            kinds
                .entry(name.clone())
                .and_modify(|k| *k = k.merge(kind))
                .or_insert(kind);
        }
    }
    kinds
}

pub(crate) struct XmlOut {
    writer: Writer<BufWriter<File>>,
}

impl XmlOut {
    pub(crate) fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        let mut out = Self {
            writer: Writer::new_with_indent(BufWriter::new(file), b' ', 2),
        };
        out.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(out)
    }

    pub(crate) fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let tag = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Start(tag))?;
        Ok(())
    }

    pub(crate) fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let tag = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Empty(tag))?;
        Ok(())
    }

    pub(crate) fn end(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    /// `<name attrs>text</name>`
    pub(crate) fn text(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<()> {
        self.start(name, attrs)?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    pub(crate) fn finish(self) -> Result<()> {
        self.writer.into_inner().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_kinds_widen() {
        let a: Attrs = [("w".to_string(), Attr::Int(1)), ("t".to_string(), Attr::Int(2))].into();
        let b: Attrs = [("w".to_string(), Attr::Float(0.5)), ("t".to_string(), Attr::from("x"))].into();
        let kinds = attr_kinds([&a, &b]);
        assert_eq!(kinds["w"], AttrKind::Double);
        assert_eq!(kinds["t"], AttrKind::Text);
    }
}
