//! JSTOR Data-for-Research bundles.
//!
//! A bundle is a directory with `citations.xml` (article metadata) and
//! optional `wordcounts/`, `bigrams/` and `trigrams/` directories holding one
//! CSV per article, named after its DOI with `/` replaced by `_`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use tethne_common::{Paper, Result, TethneError, Value};
use tethne_corpus::{Corpus, Feature, FeatureSet};
use tracing::{debug, instrument, warn};

use super::{initials, page_range, split_name, year_in, Reader};

/// Which n-gram directory to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NgramKind {
    Words,
    Bigrams,
    Trigrams,
}

impl NgramKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            NgramKind::Words => "wordcounts",
            NgramKind::Bigrams => "bigrams",
            NgramKind::Trigrams => "trigrams",
        }
    }

    /// Name of the feature set attached to a corpus.
    pub fn feature_name(&self) -> &'static str {
        self.dir_name()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DfrReader;

impl DfrReader {
    pub fn new() -> Self {
        Self
    }

    fn citations_path(path: &Path) -> PathBuf {
        if path.is_dir() {
            path.join("citations.xml")
        } else {
            path.to_path_buf()
        }
    }

    /// Per-article n-gram counts, keyed by DOI. Unreadable files are skipped.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub fn ngrams(&self, dir: &Path, which: NgramKind) -> Result<FeatureSet> {
        let ngram_dir = dir.join(which.dir_name());
        let mut entries: Vec<PathBuf> = fs::read_dir(&ngram_dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
            .collect();
        entries.sort();

        let mut set = FeatureSet::new();
        let mut skipped = 0usize;
        for file in entries {
            let Some(doi) = doi_from_filename(&file, which) else {
                warn!(file = %file.display(), "cannot recover a DOI from the file name");
                skipped += 1;
                continue;
            };
            match read_counts(&file) {
                Ok(feature) => set.add(doi, feature)?,
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "skipping unreadable n-gram file");
                    skipped += 1;
                }
            }
        }
        debug!(documents = set.len(), skipped, kind = which.dir_name(), "read n-grams");
        Ok(set)
    }

    /// Read n-grams and attach them to `corpus`, re-keyed from DOI to the
    /// corpus's primary key. Articles absent from the corpus are dropped.
    pub fn attach_ngrams(&self, corpus: &mut Corpus, dir: &Path, which: NgramKind) -> Result<()> {
        let by_doi = self.ngrams(dir, which)?;
        let keys: HashMap<String, String> = corpus
            .entries()
            .filter_map(|(key, paper)| paper.doi.as_ref().map(|doi| (doi.clone(), key.to_string())))
            .collect();
        let mut set = FeatureSet::new();
        for (doi, feature) in by_doi.iter() {
            match keys.get(doi) {
                Some(key) => set.add(key.clone(), feature.clone())?,
                None => debug!(%doi, "n-grams for an article outside the corpus"),
            }
        }
        corpus.add_feature_set(which.feature_name(), set)
    }
}

fn doi_from_filename(file: &Path, which: NgramKind) -> Option<String> {
    let stem = file.file_stem()?.to_str()?;
    let prefix = format!("{}_", which.dir_name());
    let encoded = stem.strip_prefix(&prefix).unwrap_or(stem);
    let (registrant, suffix) = encoded.split_once('_')?;
    Some(format!("{registrant}/{suffix}"))
}

fn read_counts(file: &Path) -> Result<Feature> {
    let content = fs::read_to_string(file)?;
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let mut pairs = Vec::new();
    for result in reader.records() {
        let record = result?;
        let (Some(gram), Some(count)) = (record.get(0), record.get(1)) else {
            return Err(TethneError::input_format(file, None, "expected gram,count rows"));
        };
        let count: f64 = count
            .trim()
            .parse()
            .map_err(|_| TethneError::input_format(file, None, format!("bad count {count:?}")))?;
        pairs.push((Value::text(gram.trim()), count));
    }
    Feature::new(pairs)
}

/// Parse `citations.xml` contents.
pub fn parse_citations_xml(xml: &str) -> Result<Vec<Paper>> {
    let mut papers = Vec::new();
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current: Option<Paper> = None;
    let mut element: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "article" {
                    current = Some(Paper::new());
                } else {
                    element = Some(name);
                }
            }
            Event::Text(e) => {
                let text = e.unescape()?.trim().to_string();
                if let (Some(paper), Some(tag)) = (current.as_mut(), element.as_deref()) {
                    apply(paper, tag, &text);
                }
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e.into_inner()).trim().to_string();
                if let (Some(paper), Some(tag)) = (current.as_mut(), element.as_deref()) {
                    apply(paper, tag, &text);
                }
            }
            Event::End(e) => {
                if e.name().as_ref() == b"article" {
                    if let Some(paper) = current.take() {
                        papers.push(paper);
                    }
                }
                element = None;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(papers)
}

fn apply(paper: &mut Paper, tag: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    match tag {
        "doi" => paper.doi = Some(text.to_string()),
        "title" => paper.atitle = Some(text.to_string()),
        "journaltitle" => paper.jtitle = Some(text.to_string()),
        "volume" => paper.volume = Some(text.to_string()),
        "issue" => paper.issue = Some(text.to_string()),
        "pubdate" => paper.date = year_in(text),
        "pagerange" => (paper.spage, paper.epage) = page_range(text),
        "type" => paper.document_type = Some(text.to_string()),
        "abstract" => paper.abstract_text = Some(text.to_string()),
        "author" => {
            // DfR writes "Forename Surname".
            let (forename, surname) = match text.trim().rsplit_once(' ') {
                Some((first, last)) => (first.to_string(), last.to_string()),
                None => (String::new(), text.trim().to_string()),
            };
            let (last, first) = split_name(&format!("{surname}, {forename}"));
            paper.aulast.push(last.clone());
            paper.auinit.push(initials(&first));
            paper.authors_full.push((last, first));
        }
        other => {
            let entry = paper.extras.entry(other.to_string()).or_insert_with(|| Value::List(Vec::new()));
            if let Value::List(items) = entry {
                items.push(Value::text(text));
            }
        }
    }
}

impl Reader for DfrReader {
    fn name(&self) -> &'static str {
        "dfr"
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn parse(&self, path: &Path) -> Result<Vec<Paper>> {
        let file = Self::citations_path(path);
        let xml = fs::read_to_string(&file)?;
        let mut papers = parse_citations_xml(&xml).map_err(|e| match e {
            TethneError::Xml(inner) => TethneError::input_format(&file, None, inner.to_string()),
            other => other,
        })?;
        for paper in &mut papers {
            if paper.uri.is_none() {
                paper.uri = paper.doi.as_ref().map(|doi| format!("https://www.jstor.org/stable/{doi}"));
            }
        }
        Ok(papers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tethne_test_utils::{scratch_dir, write_file};

    const CITATIONS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<articles>
<article id="10.2307/4330482" >
	<doi>10.2307/4330482</doi>
	<title>Review: [untitled]</title>
	<author>Jane Maienschein</author>
	<author>Manfred D. Laubichler</author>
	<journaltitle>Journal of the History of Biology</journaltitle>
	<volume>20</volume>
	<issue>2</issue>
	<pubdate>1987-06-01T00:00:00Z</pubdate>
	<pagerange>276-77</pagerange>
	<publisher>Springer</publisher>
	<type>fla</type>
</article>
</articles>
"#;

    #[test]
    fn test_parse_citations() {
        let papers = parse_citations_xml(CITATIONS).unwrap();
        assert_eq!(papers.len(), 1);
        let p = &papers[0];
        assert_eq!(p.doi.as_deref(), Some("10.2307/4330482"));
        assert_eq!(p.aulast, vec!["MAIENSCHEIN", "LAUBICHLER"]);
        assert_eq!(p.auinit, vec!["J", "MD"]);
        assert_eq!(p.authors_full[1], ("LAUBICHLER".to_string(), "MANFRED D".to_string()));
        assert_eq!(p.date, Some(1987));
        assert_eq!((p.spage.as_deref(), p.epage.as_deref()), (Some("276"), Some("277")));
        assert_eq!(p.extras["publisher"], Value::List(vec![Value::text("Springer")]));
    }

    #[test]
    fn test_ngrams_skip_bad_files() {
        let dir = scratch_dir();
        write_file(dir.path(), "wordcounts/wordcounts_10.2307_4330482.CSV", "WORDCOUNTS,WEIGHT\nembryo,12\ncell,3\n");
        write_file(dir.path(), "wordcounts/wordcounts_10.2307_999.CSV", "WORDCOUNTS,WEIGHT\nembryo,lots\n");
        let set = DfrReader::new().ngrams(dir.path(), NgramKind::Words).unwrap();
        assert_eq!(set.len(), 1);
        let feature = set.get("10.2307/4330482").unwrap();
        assert_eq!(feature.get(&Value::text("embryo")), Some(12.0));
    }

    #[test]
    fn test_attach_ngrams_rekeys_by_primary_key() {
        let dir = scratch_dir();
        write_file(dir.path(), "citations.xml", CITATIONS);
        write_file(dir.path(), "bigrams/bigrams_10.2307_4330482.CSV", "BIGRAMS,WEIGHT\ncell theory,2\n");
        let reader = DfrReader::new();
        let mut corpus = reader.read_corpus(dir.path(), &Default::default()).unwrap();
        reader.attach_ngrams(&mut corpus, dir.path(), NgramKind::Bigrams).unwrap();
        let set = corpus.feature_set("bigrams").unwrap();
        let key = "MAIENSCHEIN J 1987 JOURNAL OF THE HISTORY OF BIOLOGY";
        assert_eq!(set.get(key).unwrap().get(&Value::text("cell theory")), Some(2.0));
    }
}
