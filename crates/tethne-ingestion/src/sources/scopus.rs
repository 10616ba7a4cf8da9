//! Scopus CSV exports.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use tethne_common::{Addresses, Affiliation, Paper, Result, TethneError, Value};
use tracing::{debug, instrument, warn};

use super::{clean_name, year_in, Reader};

/// Columns of the export that are read. Missing columns stay empty.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScopusRow {
    #[serde(rename = "Authors")]
    authors: String,
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Year")]
    year: String,
    #[serde(rename = "Source title")]
    source_title: String,
    #[serde(rename = "Volume")]
    volume: String,
    #[serde(rename = "Issue")]
    issue: String,
    #[serde(rename = "Page start")]
    page_start: String,
    #[serde(rename = "Page end")]
    page_end: String,
    #[serde(rename = "DOI")]
    doi: String,
    #[serde(rename = "Link")]
    link: String,
    #[serde(rename = "Abstract")]
    abstract_text: String,
    #[serde(rename = "Author Keywords")]
    author_keywords: String,
    #[serde(rename = "Index Keywords")]
    index_keywords: String,
    #[serde(rename = "References")]
    references: String,
    #[serde(rename = "Document Type")]
    document_type: String,
    #[serde(rename = "Language of Original Document")]
    language: String,
    #[serde(rename = "EID")]
    eid: String,
    #[serde(rename = "Affiliations")]
    affiliations: String,
    #[serde(rename = "Authors with affiliations")]
    authors_with_affiliations: String,
}

pub struct ScopusReader {
    initials: Regex,
    cited_year: Regex,
}

impl ScopusReader {
    pub fn new() -> Result<Self> {
        Ok(Self {
            initials: Regex::new(r"^(?:\p{Lu}[\p{Ll}]?\.?\s?-?)+$")
                .map_err(|e| TethneError::Config(e.to_string()))?,
            cited_year: Regex::new(r"\((\d{4})\)").map_err(|e| TethneError::Config(e.to_string()))?,
        })
    }

    pub fn parse_str(&self, text: &str, path: &Path) -> Result<Vec<Paper>> {
        let text = text.trim_start_matches('\u{feff}');
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let mut papers = Vec::new();
        for (i, row) in reader.deserialize::<ScopusRow>().enumerate() {
            // Header is line 1.
            let row = row.map_err(|e| TethneError::input_format(path, Some(i + 2), e.to_string()))?;
            match self.build_paper(row) {
                Some(paper) => papers.push(paper),
                None => warn!(path = %path.display(), line = i + 2, "skipping empty Scopus row"),
            }
        }
        debug!(papers = papers.len(), "parsed Scopus export");
        Ok(papers)
    }

    fn build_paper(&self, row: ScopusRow) -> Option<Paper> {
        let mut paper = Paper::new();
        for (last, init) in self.split_authors(&row.authors) {
            paper.aulast.push(last);
            paper.auinit.push(init);
        }
        paper.atitle = non_empty(row.title);
        paper.jtitle = non_empty(row.source_title).map(|s| s.to_uppercase());
        paper.date = year_in(&row.year);
        paper.volume = non_empty(row.volume);
        paper.issue = non_empty(row.issue);
        paper.spage = non_empty(row.page_start);
        paper.epage = non_empty(row.page_end);
        paper.doi = non_empty(row.doi);
        paper.uri = non_empty(row.link);
        paper.abstract_text = non_empty(row.abstract_text);
        paper.document_type = non_empty(row.document_type);
        paper.eid = non_empty(row.eid);
        paper.addresses = self.addresses(&row.authors_with_affiliations, &row.affiliations);
        paper.citations = row
            .references
            .split("; ")
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .filter_map(|r| self.parse_reference(r))
            .collect();

        if let Some(keywords) = keyword_list(&row.author_keywords) {
            paper.extras.insert("keywords".into(), keywords);
        }
        if let Some(keywords) = keyword_list(&row.index_keywords) {
            paper.extras.insert("keywords_plus".into(), keywords);
        }
        if let Some(language) = non_empty(row.language) {
            paper.extras.insert("language".into(), Value::Text(language));
        }

        if paper.aulast.is_empty() && paper.atitle.is_none() && paper.eid.is_none() {
            None
        } else {
            Some(paper)
        }
    }

    /// `"Smith J., Doe A.B."` or the older `"Smith, J., Doe, A.B."`.
    fn split_authors(&self, raw: &str) -> Vec<(String, String)> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("[No author name available]") {
            return Vec::new();
        }
        let tokens: Vec<&str> = raw.split(", ").map(str::trim).filter(|t| !t.is_empty()).collect();
        let paired = tokens.len() % 2 == 0 && tokens.iter().skip(1).step_by(2).all(|t| self.initials.is_match(t));
        if paired {
            tokens
                .chunks(2)
                .map(|pair| (clean_name(pair[0]), clean_name(pair[1]).replace(' ', "")))
                .collect()
        } else {
            tokens.iter().map(|t| self.surname_initials(t)).collect()
        }
    }

    /// `"Van Valen L.M."` → `("VAN VALEN", "LM")`.
    fn surname_initials(&self, token: &str) -> (String, String) {
        let parts: Vec<&str> = token.split_whitespace().collect();
        match parts.split_last() {
            Some((last, rest)) if !rest.is_empty() && self.initials.is_match(last) => {
                (clean_name(&rest.join(" ")), clean_name(last).replace(' ', ""))
            }
            _ => (clean_name(token), String::new()),
        }
    }

    fn addresses(&self, with_authors: &str, affiliations: &str) -> Addresses {
        let mut by_author: BTreeMap<String, Vec<Affiliation>> = BTreeMap::new();
        for entry in with_authors.split("; ").map(str::trim).filter(|e| !e.is_empty()) {
            // "Smith J., Dept of Biology, Univ X, Country"
            let Some((name, address)) = entry.split_once(", ") else { continue };
            let (last, init) = self.surname_initials(name);
            let key = format!("{last} {init}").trim().to_string();
            by_author.entry(key).or_default().push(affiliation(address));
        }
        if !by_author.is_empty() {
            return Addresses::ByAuthor(by_author);
        }
        let all: Vec<Affiliation> = affiliations
            .split("; ")
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(affiliation)
            .collect();
        if all.is_empty() {
            Addresses::None
        } else {
            Addresses::All(all)
        }
    }

    /// Best effort: first author, `(YYYY)` year, and the source title that
    /// follows the year.
    fn parse_reference(&self, raw: &str) -> Option<Paper> {
        let mut cited = Paper::new();
        let (before, after) = match self.cited_year.captures(raw) {
            Some(caps) => {
                let whole = caps.get(0)?;
                cited.date = caps.get(1).and_then(|y| y.as_str().parse().ok());
                (&raw[..whole.start()], &raw[whole.end()..])
            }
            None => (raw, ""),
        };

        let tokens: Vec<&str> = before.split(", ").map(str::trim).filter(|t| !t.is_empty()).collect();
        if let Some(first) = tokens.first() {
            let (last, init) = match tokens.get(1) {
                Some(second) if self.initials.is_match(second) && !first.contains(' ') => {
                    (clean_name(first), clean_name(second).replace(' ', ""))
                }
                _ => self.surname_initials(first),
            };
            if !init.is_empty() {
                cited.aulast.push(last);
                cited.auinit.push(init);
            }
        }

        let journal = after.trim().split(',').next().map(str::trim).unwrap_or("");
        if !journal.is_empty() {
            cited.jtitle = Some(journal.to_uppercase());
        }
        if cited.aulast.is_empty() && cited.date.is_none() && cited.jtitle.is_none() {
            return None;
        }
        Some(cited)
    }
}

impl Reader for ScopusReader {
    fn name(&self) -> &'static str {
        "scopus"
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn parse(&self, path: &Path) -> Result<Vec<Paper>> {
        let text = fs::read_to_string(path)?;
        self.parse_str(&text, path)
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn keyword_list(raw: &str) -> Option<Value> {
    let items: Vec<Value> = raw
        .split(';')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(Value::text)
        .collect();
    (!items.is_empty()).then_some(Value::List(items))
}

fn affiliation(raw: &str) -> Affiliation {
    let raw = raw.trim().trim_end_matches('.');
    let parts: Vec<&str> = raw.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    let institution = parts
        .iter()
        .find(|p| p.to_lowercase().contains("univ"))
        .or(parts.first())
        .map(|s| s.to_string())
        .unwrap_or_default();
    Affiliation {
        institution,
        country: (parts.len() > 1).then(|| parts[parts.len() - 1].to_string()),
        raw: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EXPORT: &str = "\u{feff}Authors,Title,Year,Source title,Volume,Issue,Page start,Page end,DOI,Link,Affiliations,Authors with affiliations,Abstract,Author Keywords,References,Document Type,EID
\"Laubichler M.D., Maienschein J.\",Embryos and networks,2009,Journal of the History of Biology,42,3,451,470,10.1007/s10739-009-9190-5,https://www.scopus.com/x,\"Arizona State University, Tempe, United States\",\"Laubichler M.D., Arizona State University, Tempe, United States; Maienschein J., Arizona State University, Tempe, United States\",Abstract text.,embryo; network,\"Davidson, E.H., Erwin, D.H., Gene regulatory networks (2006) Science, 311 (5762), pp. 796-800.; Kauffman S. (1993) The Origins of Order\",Article,2-s2.0-123
\"Smith, J., Doe, A.B.\",Older layout,2010,Theory in Biosciences,,,,,,,,,,,,Article,2-s2.0-456
";

    fn parse() -> Vec<Paper> {
        ScopusReader::new().unwrap().parse_str(EXPORT, Path::new("scopus.csv")).unwrap()
    }

    #[test]
    fn test_parse_rows() {
        let papers = parse();
        assert_eq!(papers.len(), 2);
        let p = &papers[0];
        assert_eq!(p.aulast, vec!["LAUBICHLER", "MAIENSCHEIN"]);
        assert_eq!(p.auinit, vec!["MD", "J"]);
        assert_eq!(p.date, Some(2009));
        assert_eq!(p.jtitle.as_deref(), Some("JOURNAL OF THE HISTORY OF BIOLOGY"));
        assert_eq!(p.eid.as_deref(), Some("2-s2.0-123"));
        assert_eq!(
            p.extras["keywords"],
            Value::List(vec![Value::text("embryo"), Value::text("network")])
        );
        match &p.addresses {
            Addresses::ByAuthor(map) => assert_eq!(map["LAUBICHLER MD"][0].institution, "Arizona State University"),
            other => panic!("unexpected addresses {other:?}"),
        }
    }

    #[test]
    fn test_older_author_layout() {
        let papers = parse();
        assert_eq!(papers[1].aulast, vec!["SMITH", "DOE"]);
        assert_eq!(papers[1].auinit, vec!["J", "AB"]);
    }

    #[test]
    fn test_references() {
        let papers = parse();
        let cited = &papers[0].citations;
        assert_eq!(cited.len(), 2);
        assert_eq!(cited[0].aulast, vec!["DAVIDSON"]);
        assert_eq!(cited[0].auinit, vec!["EH"]);
        assert_eq!(cited[0].date, Some(2006));
        assert_eq!(cited[0].jtitle.as_deref(), Some("SCIENCE"));
        assert_eq!(cited[1].aulast, vec!["KAUFFMAN"]);
        assert_eq!(cited[1].jtitle.as_deref(), Some("THE ORIGINS OF ORDER"));
    }
}
