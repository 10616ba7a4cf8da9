//! Writing a corpus to CSV and reading it back.

use pretty_assertions::assert_eq;
use tethne_ingestion::{write_csv, CsvReader, Reader, ReadOptions, WosReader};
use tethne_test_utils::{fixture, scratch_dir};

#[test]
fn csv_round_trip_preserves_papers_by_ayjid() {
    let original = WosReader::new()
        .unwrap()
        .read_corpus(&fixture(env!("CARGO_MANIFEST_DIR"), "wos.txt"), &ReadOptions::default())
        .unwrap();

    let dir = scratch_dir();
    let path = dir.path().join("wos.csv");
    write_csv(original.iter(), &path).unwrap();
    let restored = CsvReader::new().read_corpus(&path, &ReadOptions::default()).unwrap();

    assert_eq!(restored.len(), original.len());
    for (key, paper) in original.entries() {
        let back = restored.get(key).unwrap_or_else(|| panic!("{key} missing after round trip"));
        assert_eq!(back.aulast, paper.aulast);
        assert_eq!(back.auinit, paper.auinit);
        assert_eq!(back.authors_full, paper.authors_full);
        assert_eq!(back.atitle, paper.atitle);
        assert_eq!(back.jtitle, paper.jtitle);
        assert_eq!(back.date, paper.date);
        assert_eq!(back.doi, paper.doi);
        assert_eq!(back.wosid, paper.wosid);
        let cited = |p: &tethne_common::Paper| p.citations.iter().map(|c| c.fingerprint()).collect::<Vec<_>>();
        assert_eq!(cited(back), cited(paper));
    }
}
