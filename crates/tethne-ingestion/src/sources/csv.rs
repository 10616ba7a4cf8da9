//! Flat CSV metadata, one row per paper.
//!
//! List fields are joined with `|`; `authors_full` entries are written as
//! `SURNAME,FORENAME`; citations are written as their `ayjid`s and read back
//! as papers carrying only that identifier.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tethne_common::{Paper, Result, TethneError};
use tracing::{debug, instrument};

use super::Reader;

const LIST_SEPARATOR: char = '|';

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct CsvRow {
    ayjid: String,
    aulast: String,
    auinit: String,
    authors_full: String,
    atitle: String,
    jtitle: String,
    volume: String,
    issue: String,
    spage: String,
    epage: String,
    date: String,
    #[serde(rename = "abstract")]
    abstract_text: String,
    doi: String,
    pmid: String,
    wosid: String,
    eid: String,
    uri: String,
    #[serde(rename = "documentType")]
    document_type: String,
    citations: String,
}

fn join(items: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    items
        .into_iter()
        .map(|s| s.as_ref().replace(LIST_SEPARATOR, " "))
        .collect::<Vec<_>>()
        .join("|")
}

fn split(raw: &str) -> Vec<String> {
    raw.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn opt(raw: String) -> Option<String> {
    (!raw.trim().is_empty()).then_some(raw)
}

impl From<&Paper> for CsvRow {
    fn from(paper: &Paper) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            ayjid: paper.fingerprint(),
            aulast: join(&paper.aulast),
            auinit: join(&paper.auinit),
            authors_full: join(paper.authors_full.iter().map(|(last, first)| format!("{last},{first}"))),
            atitle: text(&paper.atitle),
            jtitle: text(&paper.jtitle),
            volume: text(&paper.volume),
            issue: text(&paper.issue),
            spage: text(&paper.spage),
            epage: text(&paper.epage),
            date: paper.date.map(|d| d.to_string()).unwrap_or_default(),
            abstract_text: text(&paper.abstract_text),
            doi: text(&paper.doi),
            pmid: text(&paper.pmid),
            wosid: text(&paper.wosid),
            eid: text(&paper.eid),
            uri: text(&paper.uri),
            document_type: text(&paper.document_type),
            citations: join(paper.citations.iter().map(Paper::fingerprint)),
        }
    }
}

impl CsvRow {
    fn into_paper(self, path: &Path, line: usize) -> Result<Paper> {
        let mut paper = Paper::new();
        paper.aulast = split(&self.aulast);
        paper.auinit = split(&self.auinit);
        paper.authors_full = split(&self.authors_full)
            .into_iter()
            .map(|entry| match entry.split_once(',') {
                Some((last, first)) => (last.to_string(), first.to_string()),
                None => (entry, String::new()),
            })
            .collect();
        paper.atitle = opt(self.atitle);
        paper.jtitle = opt(self.jtitle);
        paper.volume = opt(self.volume);
        paper.issue = opt(self.issue);
        paper.spage = opt(self.spage);
        paper.epage = opt(self.epage);
        paper.date = match self.date.trim() {
            "" => None,
            raw => Some(
                raw.parse()
                    .map_err(|_| TethneError::input_format(path, Some(line), format!("date {raw:?} is not a year")))?,
            ),
        };
        paper.abstract_text = opt(self.abstract_text);
        paper.doi = opt(self.doi);
        paper.pmid = opt(self.pmid);
        paper.wosid = opt(self.wosid);
        paper.eid = opt(self.eid);
        paper.uri = opt(self.uri);
        paper.document_type = opt(self.document_type);
        paper.citations = split(&self.citations)
            .into_iter()
            .map(|id| Paper {
                ayjid: Some(id),
                ..Paper::default()
            })
            .collect();
        paper.ayjid = opt(self.ayjid);
        paper.validate()?;
        Ok(paper)
    }
}

/// Write paper metadata to `path`.
#[instrument(skip(papers), fields(path = %path.display()))]
pub fn write_csv<'a>(papers: impl IntoIterator<Item = &'a Paper>, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut written = 0usize;
    for paper in papers {
        writer.serialize(CsvRow::from(paper))?;
        written += 1;
    }
    writer.flush()?;
    debug!(papers = written, "wrote CSV metadata");
    Ok(())
}

/// Reads files produced by [`write_csv`].
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReader;

impl CsvReader {
    pub fn new() -> Self {
        Self
    }
}

impl Reader for CsvReader {
    fn name(&self) -> &'static str {
        "csv"
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn parse(&self, path: &Path) -> Result<Vec<Paper>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut papers = Vec::new();
        for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
            let row = row.map_err(|e| TethneError::input_format(path, Some(i + 2), e.to_string()))?;
            papers.push(row.into_paper(path, i + 2)?);
        }
        Ok(papers)
    }
}
