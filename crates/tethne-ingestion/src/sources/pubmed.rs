//! PubMed XML (`efetch` / MEDLINE XML exports).
//! Handles the `<PubmedArticleSet><PubmedArticle>` structure.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use quick_xml::events::Event;
use tethne_common::{Addresses, Affiliation, Paper, Result, TethneError, Value};
use tracing::{instrument, warn};

use super::{clean_name, initials, page_range, year_in, Reader};

#[derive(Debug, Default, Clone, Copy)]
pub struct PubMedReader;

impl PubMedReader {
    pub fn new() -> Self {
        Self
    }
}

impl Reader for PubMedReader {
    fn name(&self) -> &'static str {
        "pubmed"
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn parse(&self, path: &Path) -> Result<Vec<Paper>> {
        let xml = fs::read_to_string(path)?;
        parse_pubmed_xml(&xml).map_err(|e| match e {
            TethneError::Xml(inner) => TethneError::input_format(path, None, inner.to_string()),
            other => other,
        })
    }
}

/// Author being assembled inside `<Author>`.
#[derive(Default)]
struct PendingAuthor {
    last: String,
    fore: String,
    initials: String,
    affiliations: Vec<String>,
}

/// Parse PubMed XML into papers.
pub fn parse_pubmed_xml(xml: &str) -> Result<Vec<Paper>> {
    let mut papers = Vec::new();
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // State machine for XML parsing
    let mut current: Option<Paper> = None;
    let mut author: Option<PendingAuthor> = None;
    let mut abstract_parts: Vec<String> = Vec::new();
    let mut keywords: Vec<Value> = Vec::new();
    let mut by_author: BTreeMap<String, Vec<Affiliation>> = BTreeMap::new();
    let mut stack: Vec<String> = Vec::new();
    let mut doi_id = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match name.as_str() {
                    "PubmedArticle" => {
                        current = Some(Paper::new());
                        abstract_parts.clear();
                        keywords.clear();
                        by_author.clear();
                    }
                    "Author" => author = Some(PendingAuthor::default()),
                    "ArticleId" => {
                        doi_id = false;
                        for attr in e.attributes() {
                            let attr = attr.map_err(quick_xml::Error::from)?;
                            if attr.key.as_ref() == b"IdType" && attr.unescape_value()?.as_ref() == "doi" {
                                doi_id = true;
                            }
                        }
                    }
                    _ => {}
                }
                stack.push(name);
            }
            Event::Text(ref e) => {
                let text = e.unescape()?.trim().to_string();
                let Some(paper) = current.as_mut() else {
                    buf.clear();
                    continue;
                };
                let tag = stack.last().map(String::as_str).unwrap_or("");
                let parent = stack.len().checked_sub(2).map(|i| stack[i].as_str()).unwrap_or("");
                match (parent, tag) {
                    ("MedlineCitation", "PMID") if paper.pmid.is_none() => paper.pmid = Some(text),
                    (_, "ArticleTitle") => paper.atitle = Some(text),
                    (_, "AbstractText") => abstract_parts.push(text),
                    ("Journal", "Title") => paper.jtitle = Some(text),
                    ("JournalIssue", "Volume") => paper.volume = Some(text),
                    ("JournalIssue", "Issue") => paper.issue = Some(text),
                    ("PubDate", "Year") => paper.date = text.parse().ok(),
                    ("PubDate", "MedlineDate") if paper.date.is_none() => paper.date = year_in(&text),
                    ("Pagination", "MedlinePgn") => (paper.spage, paper.epage) = page_range(&text),
                    ("ArticleIdList", "ArticleId") if doi_id => paper.doi = Some(text),
                    (_, "ELocationID") if text.starts_with("10.") && paper.doi.is_none() => paper.doi = Some(text),
                    ("PublicationTypeList", "PublicationType") if paper.document_type.is_none() => {
                        paper.document_type = Some(text)
                    }
                    ("KeywordList", "Keyword") | ("MeshHeading", "DescriptorName") => keywords.push(Value::text(text)),
                    (_, "LastName") => {
                        if let Some(a) = author.as_mut() {
                            a.last = text;
                        }
                    }
                    (_, "ForeName") => {
                        if let Some(a) = author.as_mut() {
                            a.fore = text;
                        }
                    }
                    (_, "Initials") => {
                        if let Some(a) = author.as_mut() {
                            a.initials = text;
                        }
                    }
                    ("AffiliationInfo", "Affiliation") => {
                        if let Some(a) = author.as_mut() {
                            a.affiliations.push(text);
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => {
                stack.pop();
                match e.name().as_ref() {
                    b"Author" => {
                        // Collective names carry no surname and are skipped.
                        if let (Some(a), Some(paper)) = (author.take().filter(|a| !a.last.is_empty()), current.as_mut()) {
                            let last = clean_name(&a.last);
                            let fore = clean_name(&a.fore);
                            let init = if a.initials.is_empty() {
                                initials(&fore)
                            } else {
                                a.initials.to_uppercase()
                            };
                            if !a.affiliations.is_empty() {
                                let key = format!("{last} {fore}").trim().to_string();
                                let affs = a.affiliations.iter().map(|raw| affiliation(raw)).collect();
                                by_author.insert(key, affs);
                            }
                            paper.aulast.push(last.clone());
                            paper.auinit.push(init);
                            paper.authors_full.push((last, fore));
                        }
                    }
                    b"PubmedArticle" => {
                        if let Some(mut p) = current.take() {
                            if !abstract_parts.is_empty() {
                                p.abstract_text = Some(abstract_parts.join(" "));
                            }
                            if !keywords.is_empty() {
                                p.extras.insert("keywords".into(), Value::List(std::mem::take(&mut keywords)));
                            }
                            if !by_author.is_empty() {
                                p.addresses = Addresses::ByAuthor(std::mem::take(&mut by_author));
                            }
                            if p.atitle.is_some() {
                                papers.push(p);
                            } else {
                                warn!(pmid = ?p.pmid, "Skipping paper with empty title");
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(papers)
}

/// `"Dept of Biology, Arizona State University, Tempe, AZ, USA."`
fn affiliation(raw: &str) -> Affiliation {
    let cleaned = raw.trim().trim_end_matches('.');
    let parts: Vec<&str> = cleaned.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    let institution = parts
        .iter()
        .find(|p| {
            let lower = p.to_lowercase();
            lower.contains("univ") || lower.contains("institut") || lower.contains("college") || lower.contains("hospital")
        })
        .or(parts.first())
        .map(|s| s.to_string())
        .unwrap_or_default();
    Affiliation {
        institution,
        country: (parts.len() > 1).then(|| parts[parts.len() - 1].to_string()),
        raw: cleaned.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_minimal_pubmed_xml() {
        let xml = r#"<?xml version="1.0"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>12345678</PMID>
      <Article>
        <Journal>
          <JournalIssue><Volume>44</Volume><Issue>3</Issue><PubDate><Year>2010</Year></PubDate></JournalIssue>
          <Title>Nature</Title>
        </Journal>
        <ArticleTitle>Citation networks in developmental biology</ArticleTitle>
        <Pagination><MedlinePgn>1234-40</MedlinePgn></Pagination>
        <Abstract><AbstractText>First part.</AbstractText><AbstractText>Second part.</AbstractText></Abstract>
        <AuthorList>
          <Author>
            <LastName>Smith</LastName><ForeName>John</ForeName><Initials>J</Initials>
            <AffiliationInfo><Affiliation>Dept of Biology, Arizona State University, Tempe, USA.</Affiliation></AffiliationInfo>
          </Author>
          <Author><CollectiveName>The Consortium</CollectiveName></Author>
        </AuthorList>
      </Article>
      <CommentsCorrectionsList><CommentsCorrections><PMID>999</PMID></CommentsCorrections></CommentsCorrectionsList>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList><ArticleId IdType="pubmed">12345678</ArticleId><ArticleId IdType="doi">10.1000/xyz</ArticleId></ArticleIdList>
    </PubmedData>
  </PubmedArticle>
</PubmedArticleSet>"#;

        let papers = parse_pubmed_xml(xml).unwrap();
        assert_eq!(papers.len(), 1);
        let p = &papers[0];
        assert_eq!(p.pmid.as_deref(), Some("12345678"));
        assert_eq!(p.atitle.as_deref(), Some("Citation networks in developmental biology"));
        assert_eq!(p.aulast, vec!["SMITH"]);
        assert_eq!(p.auinit, vec!["J"]);
        assert_eq!(p.date, Some(2010));
        assert_eq!(p.jtitle.as_deref(), Some("Nature"));
        assert_eq!(p.epage.as_deref(), Some("1240"));
        assert_eq!(p.doi.as_deref(), Some("10.1000/xyz"));
        assert_eq!(p.abstract_text.as_deref(), Some("First part. Second part."));
        match &p.addresses {
            Addresses::ByAuthor(map) => {
                assert_eq!(map["SMITH JOHN"][0].institution, "Arizona State University");
            }
            other => panic!("unexpected addresses {other:?}"),
        }
    }
}
