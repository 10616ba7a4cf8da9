//! Reader contract and helpers shared by the format readers.

pub mod csv;
pub mod dfr;
pub mod plaintext;
pub mod pubmed;
pub mod scopus;
pub mod wos;

use std::path::Path;

use tethne_common::{Field, Paper, Result};
use tethne_corpus::Corpus;
use tracing::debug;
use uuid::Uuid;

/// Options honoured by every reader.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Primary key of the corpus built by [`Reader::read_corpus`].
    pub index_by: Field,
    /// Restrict population to these fields (`ayjid` is always kept).
    pub parse_only: Option<Vec<Field>>,
    pub index_fields: Vec<Field>,
    pub index_features: Vec<Field>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            index_by: Field::Ayjid,
            parse_only: None,
            index_fields: Vec::new(),
            index_features: Vec::new(),
        }
    }
}

/// Common interface for all bibliographic readers.
pub trait Reader: Send + Sync {
    /// Short format name used in logs.
    fn name(&self) -> &'static str;

    /// Parse `path` into raw papers.
    fn parse(&self, path: &Path) -> Result<Vec<Paper>>;

    /// Parse, then fill `ayjid`, apply `parse_only` and stamp one accession
    /// id on every paper of this call.
    fn read(&self, path: &Path, options: &ReadOptions) -> Result<Vec<Paper>> {
        let papers = self.parse(path)?;
        Ok(finalize(papers, options, self.name()))
    }

    fn read_corpus(&self, path: &Path, options: &ReadOptions) -> Result<Corpus> {
        let papers = self.read(path, options)?;
        Corpus::builder()
            .index_by(options.index_by.clone())
            .index_fields(options.index_fields.iter().cloned())
            .index_features(options.index_features.iter().cloned())
            .build(papers)
    }
}

pub(crate) fn finalize(mut papers: Vec<Paper>, options: &ReadOptions, reader: &str) -> Vec<Paper> {
    let accession = Uuid::new_v4().to_string();
    for paper in &mut papers {
        paper.fill_ayjid();
        if let Some(fields) = &options.parse_only {
            paper.retain_fields(fields);
        }
        paper.accession = Some(accession.clone());
    }
    debug!(reader, papers = papers.len(), %accession, "read batch");
    papers
}

/// Collapse whitespace and strip periods: `"Eddy  Y."` → `"EDDY Y"`.
pub(crate) fn clean_name(s: &str) -> String {
    s.replace('.', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Initials of a forename: `"Eddy Y."` → `"EY"`.
pub(crate) fn initials(forename: &str) -> String {
    forename
        .split(|c: char| c.is_whitespace() || c == '.' || c == '-')
        .filter_map(|part| part.chars().next())
        .collect::<String>()
        .to_uppercase()
}

/// Split `"Surname, Forename"`; without a comma the last token is the forename.
pub(crate) fn split_name(raw: &str) -> (String, String) {
    match raw.split_once(',') {
        Some((last, first)) => (clean_name(last), clean_name(first)),
        None => {
            let cleaned = clean_name(raw);
            match cleaned.rsplit_once(' ') {
                Some((last, first)) => (last.to_string(), first.to_string()),
                None => (cleaned, String::new()),
            }
        }
    }
}

/// `"276-277"` or `"276-77"` (PubMed abbreviates) → `(spage, epage)`.
pub(crate) fn page_range(raw: &str) -> (Option<String>, Option<String>) {
    let raw = raw.trim();
    if raw.is_empty() {
        return (None, None);
    }
    match raw.split_once('-') {
        Some((start, end)) => {
            let (start, end) = (start.trim(), end.trim());
            let end = if end.len() < start.len() && end.chars().all(|c| c.is_ascii_digit()) {
                format!("{}{}", &start[..start.len() - end.len()], end)
            } else {
                end.to_string()
            };
            (Some(start.to_string()), (!end.is_empty()).then_some(end))
        }
        None => (Some(raw.to_string()), None),
    }
}

/// The first four-digit run that looks like a year.
pub(crate) fn year_in(raw: &str) -> Option<i64> {
    let bytes = raw.as_bytes();
    (0..bytes.len().saturating_sub(3)).find_map(|i| {
        let window = &raw[i..i + 4];
        let bounded = (i == 0 || !bytes[i - 1].is_ascii_digit()) && bytes.get(i + 4).map_or(true, |b| !b.is_ascii_digit());
        if bounded && window.chars().all(|c| c.is_ascii_digit()) {
            window.parse().ok()
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tethne_common::Value;

    #[test]
    fn test_split_name_variants() {
        assert_eq!(split_name("Zeng, Eddy Y."), ("ZENG".into(), "EDDY Y".into()));
        assert_eq!(split_name("Van Valen L"), ("VAN VALEN".into(), "L".into()));
        assert_eq!(initials("Eddy Y."), "EY");
    }

    #[test]
    fn test_page_range_expands_abbreviations() {
        assert_eq!(page_range("1234-40"), (Some("1234".into()), Some("1240".into())));
        assert_eq!(page_range("e101"), (Some("e101".into()), None));
    }

    #[test]
    fn test_year_in() {
        assert_eq!(year_in("1987-06-01T00:00:00Z"), Some(1987));
        assert_eq!(year_in("Spring 12345"), None);
        assert_eq!(year_in("(2010) Nature"), Some(2010));
    }

    #[test]
    fn test_finalize_stamps_one_accession() {
        let mut a = Paper::new();
        a.aulast = vec!["SMITH".into()];
        a.auinit = vec!["J".into()];
        a.atitle = Some("Title".into());
        let papers = finalize(
            vec![a.clone(), a],
            &ReadOptions {
                parse_only: Some(vec![Field::Aulast]),
                ..ReadOptions::default()
            },
            "test",
        );
        assert_eq!(papers[0].accession, papers[1].accession);
        assert!(papers[0].accession.is_some());
        assert_eq!(papers[0].atitle, None);
        assert_eq!(papers[0].get(&Field::Ayjid), Some(Value::text("SMITH J  ")));
    }
}
