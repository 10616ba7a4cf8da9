//! Fixtures shared by the Tethne test suites.
//!
//! Everything here builds plain [`Paper`]s so it can be used from any crate
//! without pulling in the corpus or graph layers.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tethne_common::Paper;

pub use pretty_assertions;

const SURNAMES: &[&str] = &[
    "ZENG", "PETERS", "LAUBICHLER", "MAIENSCHEIN", "DARWIN", "MAYR", "GOULD", "LEWONTIN", "WRIGHT", "FISHER",
    "HALDANE", "DOBZHANSKY", "SIMPSON", "HUXLEY", "WADDINGTON",
];

const JOURNALS: &[&str] = &["NATURE", "SCIENCE", "CELL", "EVOLUTION", "GENETICS", "BIOLOGY AND PHILOSOPHY"];

/// A paper with one author per `(surname, initial)` pair.
pub fn paper(authors: &[(&str, &str)], year: i64, journal: &str) -> Paper {
    let mut p = Paper::new();
    p.aulast = authors.iter().map(|(l, _)| l.to_uppercase()).collect();
    p.auinit = authors.iter().map(|(_, i)| i.to_uppercase()).collect();
    p.date = Some(year);
    p.jtitle = Some(journal.to_uppercase());
    p
}

/// Like [`paper`], with a title and cited references given as ayjids'
/// `(surname, initial, year, journal)` components.
pub fn paper_citing(authors: &[(&str, &str)], year: i64, journal: &str, title: &str, cites: &[&Paper]) -> Paper {
    let mut p = paper(authors, year, journal);
    p.atitle = Some(title.to_string());
    p.citations = cites
        .iter()
        .map(|c| {
            let mut reference = (*c).clone();
            reference.citations.clear();
            reference
        })
        .collect();
    p.fill_ayjid();
    p
}

/// `n` papers with unique ayjids, spread over `years`, seeded.
///
/// `prefix` goes into every surname so two batches never share a key.
pub fn synthetic_papers(n: usize, prefix: &str, years: std::ops::RangeInclusive<i64>, seed: u64) -> Vec<Paper> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let year = rng.gen_range(years.clone());
            let coauthor = SURNAMES[rng.gen_range(0..SURNAMES.len())];
            let journal = JOURNALS[rng.gen_range(0..JOURNALS.len())];
            let lead = format!("{prefix}{i}");
            let mut p = paper(&[(lead.as_str(), "A"), (coauthor, "B")], year, journal);
            p.atitle = Some(format!("{} study of {}", journal.to_lowercase(), coauthor.to_lowercase()));
            p.fill_ayjid();
            p
        })
        .collect()
}

/// P1 cites P2, P2 cites P3; all three are returned.
pub fn citation_chain() -> Vec<Paper> {
    let p3 = paper_citing(&[("THIRD", "C")], 2001, "GENETICS", "Third", &[]);
    let p2 = paper_citing(&[("SECOND", "B")], 2005, "EVOLUTION", "Second", &[&p3]);
    let p1 = paper_citing(&[("FIRST", "A")], 2010, "NATURE", "First", &[&p2]);
    vec![p1, p2, p3]
}

/// Seeded random co-authorship: `nodes` authors, papers added until
/// `edges` distinct author pairs exist.
pub fn random_coauthor_papers(nodes: usize, edges: usize, seed: u64) -> Vec<Paper> {
    assert!(nodes >= 2 && edges <= nodes * (nodes - 1) / 2, "impossible graph");
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen = std::collections::BTreeSet::new();
    let mut papers = Vec::new();
    while seen.len() < edges {
        let a = rng.gen_range(0..nodes);
        let b = rng.gen_range(0..nodes);
        if a == b || !seen.insert((a.min(b), a.max(b))) {
            continue;
        }
        let (la, lb) = (format!("AUTHOR{a}"), format!("AUTHOR{b}"));
        let year = 2000 + papers.len() as i64;
        let mut p = paper(&[(la.as_str(), "X"), (lb.as_str(), "X")], year, "SCIENCE");
        p.fill_ayjid();
        papers.push(p);
    }
    papers
}

/// Scratch directory removed on drop.
pub fn scratch_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("create scratch dir")
}

/// Write `contents` to `dir/name`, returning the path.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture dir");
    }
    std::fs::write(&path, contents).expect("write fixture");
    path
}

/// Path to a fixture under the calling crate's `tests/data`.
pub fn fixture(manifest_dir: &str, name: &str) -> PathBuf {
    Path::new(manifest_dir).join("tests").join("data").join(name)
}

/// Close-enough float comparison for distributions.
pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} ± {tolerance}, got {actual}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_synthetic_papers_have_unique_keys() {
        let papers = synthetic_papers(50, "DFR", 2000..=2005, 7);
        let keys: HashSet<String> = papers.iter().map(Paper::fingerprint).collect();
        assert_eq!(keys.len(), 50);
        assert!(papers.iter().all(|p| (2000..=2005).contains(&p.date.unwrap())));
    }

    #[test]
    fn test_citation_chain_is_linked_by_ayjid() {
        let chain = citation_chain();
        assert_eq!(chain[0].citations[0].fingerprint(), chain[1].fingerprint());
        assert_eq!(chain[1].citations[0].fingerprint(), chain[2].fingerprint());
        assert!(chain[0].citations[0].citations.is_empty());
    }

    #[test]
    fn test_random_coauthor_papers_edge_count() {
        let papers = random_coauthor_papers(10, 20, 3);
        assert_eq!(papers.len(), 20);
    }
}
