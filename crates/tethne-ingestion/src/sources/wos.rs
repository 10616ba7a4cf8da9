//! Web of Science field-tagged exports.
//!
//! A file is a sequence of records, each line a two-letter tag and a value,
//! with three-space continuation lines. `ER` ends a record and `EF` the file.
//!
//! ```text
//! FN Thomson Reuters Web of Science
//! VR 1.0
//! PT J
//! AU Zeng, EY
//! AF Zeng, Eddy Y.
//! TI A title that
//!    continues here
//! PY 2013
//! ER
//! EF
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use regex::Regex;
use tethne_common::{Addresses, Affiliation, Paper, Result, TethneError, Value};
use tracing::{debug, instrument, warn};

use super::{clean_name, initials, split_name, Reader};

/// Reader-specific tags kept in `Paper::extras`, under readable names.
const EXTRA_TAGS: &[(&str, &str)] = &[
    ("PT", "publication_type"),
    ("LA", "language"),
    ("DE", "keywords"),
    ("ID", "keywords_plus"),
    ("RP", "reprint_address"),
    ("EM", "emails"),
];

/// Header/footer tags that live outside records.
const FILE_TAGS: &[&str] = &["FN", "VR", "EF"];

#[derive(Debug)]
struct RawRecord {
    line: usize,
    fields: Vec<(String, Vec<String>)>,
    problem: Option<String>,
}

impl RawRecord {
    fn new(line: usize) -> Self {
        Self {
            line,
            fields: Vec::new(),
            problem: None,
        }
    }

    fn values(&self, tag: &str) -> Option<&[String]> {
        self.fields.iter().find(|(t, _)| t == tag).map(|(_, v)| v.as_slice())
    }

    fn text(&self, tag: &str) -> Option<String> {
        self.values(tag).map(|v| v.join(" ")).filter(|s| !s.trim().is_empty())
    }
}

pub struct WosReader {
    tag_line: Regex,
}

impl WosReader {
    pub fn new() -> Result<Self> {
        let tag_line = Regex::new(r"^([A-Z][A-Z0-9])(?: (.*))?$")
            .map_err(|e| TethneError::Config(format!("bad WoS tag pattern: {e}")))?;
        Ok(Self { tag_line })
    }

    /// Parse file contents; `path` is used for error context.
    pub fn parse_str(&self, text: &str, path: &Path) -> Result<Vec<Paper>> {
        let text = text.trim_start_matches('\u{feff}');
        let mut papers = Vec::new();
        let mut current: Option<RawRecord> = None;
        let mut last_tag: Option<usize> = None;
        let mut skipped = 0usize;

        for (i, raw_line) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = raw_line.trim_end();

            if line.is_empty() {
                // A blank line closes a CR block.
                last_tag = None;
                continue;
            }

            if let Some(rest) = line.strip_prefix("   ") {
                match (&mut current, last_tag) {
                    (Some(record), Some(idx)) => record.fields[idx].1.push(rest.trim().to_string()),
                    (Some(record), None) => {
                        record.problem.get_or_insert(format!("line {line_no}: continuation without a tag"));
                    }
                    (None, _) => {
                        return Err(TethneError::input_format(path, Some(line_no), "continuation line outside a record"));
                    }
                }
                continue;
            }

            let Some(caps) = self.tag_line.captures(line) else {
                match &mut current {
                    Some(record) => {
                        record.problem.get_or_insert(format!("line {line_no}: malformed tag line"));
                        last_tag = None;
                        continue;
                    }
                    None => {
                        return Err(TethneError::input_format(path, Some(line_no), format!("malformed tag line {line:?}")));
                    }
                }
            };
            let tag = &caps[1];
            let value = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();

            match (tag, current.take()) {
                ("ER", Some(record)) => {
                    last_tag = None;
                    if let Some(problem) = &record.problem {
                        warn!(path = %path.display(), record_line = record.line, %problem, "skipping malformed WoS record");
                        skipped += 1;
                        continue;
                    }
                    match self.build_paper(&record) {
                        Ok(paper) => papers.push(paper),
                        Err(problem) => {
                            warn!(path = %path.display(), record_line = record.line, %problem, "skipping malformed WoS record");
                            skipped += 1;
                        }
                    }
                }
                ("ER", None) => {
                    return Err(TethneError::input_format(path, Some(line_no), "ER outside a record"));
                }
                ("EF", Some(record)) => {
                    return Err(TethneError::input_format(
                        path,
                        Some(record.line),
                        "record is not terminated by ER before EF",
                    ));
                }
                (t, None) if FILE_TAGS.contains(&t) => {}
                (t, record) => {
                    let mut record = record.unwrap_or_else(|| RawRecord::new(line_no));
                    let idx = match record.fields.iter().position(|(existing, _)| existing == t) {
                        Some(idx) => {
                            record.fields[idx].1.push(value);
                            idx
                        }
                        None => {
                            record.fields.push((t.to_string(), vec![value]));
                            record.fields.len() - 1
                        }
                    };
                    last_tag = Some(idx);
                    current = Some(record);
                }
            }
        }

        if let Some(record) = current {
            return Err(TethneError::input_format(path, Some(record.line), "record is not terminated by ER"));
        }
        debug!(path = %path.display(), papers = papers.len(), skipped, "parsed WoS file");
        Ok(papers)
    }

    fn build_paper(&self, record: &RawRecord) -> std::result::Result<Paper, String> {
        let mut paper = Paper::new();

        if let Some(names) = record.values("AU") {
            for name in names.iter().filter(|n| !n.is_empty()) {
                let (last, first) = split_name(name);
                paper.aulast.push(last);
                paper.auinit.push(first.replace(' ', ""));
            }
        }
        if let Some(names) = record.values("AF") {
            paper.authors_full = names.iter().filter(|n| !n.is_empty()).map(|n| split_name(n)).collect();
            if paper.aulast.is_empty() {
                for (last, first) in &paper.authors_full {
                    paper.aulast.push(last.clone());
                    paper.auinit.push(initials(first));
                }
            }
            if paper.authors_full.len() != paper.aulast.len() {
                return Err(format!(
                    "{} AF names for {} AU names",
                    paper.authors_full.len(),
                    paper.aulast.len()
                ));
            }
        }

        paper.atitle = record.text("TI");
        paper.jtitle = record.text("SO");
        paper.abstract_text = record.text("AB");
        paper.document_type = record.text("DT");
        paper.doi = record.text("DI");
        paper.volume = record.text("VL");
        paper.issue = record.text("IS");
        paper.spage = record.text("BP");
        paper.epage = record.text("EP");
        paper.wosid = record.text("UT");
        if let Some(year) = record.text("PY") {
            let year = year.trim().parse::<i64>().map_err(|_| format!("unparseable year {year:?}"))?;
            paper.date = Some(year);
        }

        if let Some(lines) = record.values("C1") {
            paper.addresses = parse_addresses(lines);
        }
        if let Some(refs) = record.values("CR") {
            paper.citations = refs.iter().filter_map(|r| parse_cited_reference(r)).collect();
        }

        for (tag, name) in EXTRA_TAGS {
            let Some(values) = record.values(tag) else { continue };
            let value = match *tag {
                "DE" | "ID" => Value::List(
                    values
                        .join(" ")
                        .split(';')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(Value::text)
                        .collect(),
                ),
                "EM" => Value::List(
                    values
                        .iter()
                        .flat_map(|v| v.split(';'))
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(Value::text)
                        .collect(),
                ),
                _ => Value::text(values.join(" ")),
            };
            if !value.is_empty() {
                paper.extras.insert(name.to_string(), value);
            }
        }
        for (tag, values) in &record.fields {
            if is_known(tag) {
                continue;
            }
            let value = if values.len() == 1 {
                Value::text(values[0].clone())
            } else {
                Value::List(values.iter().cloned().map(Value::Text).collect())
            };
            if !value.is_empty() {
                paper.extras.insert(tag.clone(), value);
            }
        }

        paper.validate().map_err(|e| e.to_string())?;
        Ok(paper)
    }
}

fn is_known(tag: &str) -> bool {
    const MAPPED: &[&str] = &["AU", "AF", "TI", "SO", "AB", "DT", "DI", "VL", "IS", "BP", "EP", "UT", "PY", "C1", "CR"];
    MAPPED.contains(&tag) || EXTRA_TAGS.iter().any(|(t, _)| *t == tag)
}

impl Reader for WosReader {
    fn name(&self) -> &'static str {
        "wos"
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn parse(&self, path: &Path) -> Result<Vec<Paper>> {
        let text = fs::read_to_string(path)?;
        self.parse_str(&text, path)
    }
}

/// `"Univ Calif, Dept Biol, Davis, CA 95616 USA."` → institution, country.
fn affiliation(raw: &str) -> Affiliation {
    let raw = raw.trim().trim_end_matches('.').trim();
    let parts: Vec<&str> = raw.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    let institution = parts.first().map(|s| s.to_string()).unwrap_or_default();
    let country = if parts.len() > 1 {
        parts.last().map(|last| {
            if last.ends_with(" USA") || *last == "USA" {
                "USA".to_string()
            } else {
                last.to_string()
            }
        })
    } else {
        None
    };
    Affiliation {
        institution,
        country,
        raw: raw.to_string(),
    }
}

/// C1 lines. Bracketed author lists give a per-author mapping; any
/// unbracketed line makes the assignment ambiguous and yields `All`.
fn parse_addresses(lines: &[String]) -> Addresses {
    let mut by_author: BTreeMap<String, Vec<Affiliation>> = BTreeMap::new();
    let mut all = Vec::new();
    let mut ambiguous = false;
    for line in lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        let bracketed = line.strip_prefix('[').and_then(|rest| rest.split_once(']'));
        match bracketed {
            Some((names, address)) => {
                let aff = affiliation(address);
                for name in names.split(';').map(str::trim).filter(|n| !n.is_empty()) {
                    let key = clean_name(&name.replace(',', " "));
                    by_author.entry(key).or_default().push(aff.clone());
                }
                all.push(aff);
            }
            None => {
                ambiguous = true;
                all.push(affiliation(line));
            }
        }
    }
    if all.is_empty() {
        Addresses::None
    } else if ambiguous {
        Addresses::All(all)
    } else {
        Addresses::ByAuthor(by_author)
    }
}

/// One CR entry: `"Zeng EY, 2010, J BIOMECH, V44, P1234, DOI 10.1/x"`.
fn parse_cited_reference(raw: &str) -> Option<Paper> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        return None;
    }
    let mut cited = Paper::new();
    let mut rest = parts.as_slice();

    let first = parts[0];
    let starts_with_year = first.len() == 4 && first.chars().all(|c| c.is_ascii_digit());
    if !starts_with_year {
        rest = &parts[1..];
        if !first.starts_with('[') {
            let (last, init) = split_name(first);
            cited.aulast.push(last);
            cited.auinit.push(init.replace(' ', ""));
        }
    }

    for part in rest {
        if cited.date.is_none() && part.len() == 4 && part.chars().all(|c| c.is_ascii_digit()) {
            cited.date = part.parse().ok();
        } else if let Some(doi) = part.strip_prefix("DOI ") {
            cited.doi = Some(doi.trim().trim_start_matches("DOI").trim().to_string());
        } else if let Some(volume) = part.strip_prefix('V').filter(|v| v.chars().all(|c| c.is_ascii_digit()) && !v.is_empty()) {
            cited.volume = Some(volume.to_string());
        } else if let Some(page) = part.strip_prefix('P').filter(|p| !p.is_empty() && p.chars().next().is_some_and(|c| c.is_ascii_digit())) {
            cited.spage = Some(page.to_string());
        } else if cited.jtitle.is_none() {
            cited.jtitle = Some(part.to_string());
        }
    }
    if cited.aulast.is_empty() && cited.date.is_none() && cited.jtitle.is_none() {
        return None;
    }
    Some(cited)
}
