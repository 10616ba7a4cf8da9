//! Reading the bundled Web of Science sample into a corpus.

use pretty_assertions::assert_eq;
use tethne_common::{Field, Value};
use tethne_corpus::{SliceKey, SliceSpec};
use tethne_ingestion::{ReadOptions, Reader, WosReader};
use tethne_test_utils::fixture;

fn options() -> ReadOptions {
    ReadOptions {
        index_fields: vec![Field::Date],
        index_features: vec![Field::Authors, Field::Citations],
        ..ReadOptions::default()
    }
}

#[test]
fn wos_sample_indexes_by_year() {
    let reader = WosReader::new().unwrap();
    let corpus = reader
        .read_corpus(&fixture(env!("CARGO_MANIFEST_DIR"), "wos.txt"), &options())
        .unwrap();

    assert_eq!(corpus.len(), 10);
    let dates = corpus.index_of(&Field::Date).unwrap();
    assert_eq!(dates.len(), 2);
    assert_eq!(dates[&Value::Int(2012)].len(), 5);
    assert_eq!(dates[&Value::Int(2013)].len(), 5);

    let distribution = corpus.distribution(&SliceSpec::yearly()).unwrap();
    assert_eq!(distribution, vec![(SliceKey::Point(2012), 5), (SliceKey::Point(2013), 5)]);
}

#[test]
fn author_feature_distribution_uses_full_names() {
    let reader = WosReader::new().unwrap();
    let corpus = reader
        .read_corpus(&fixture(env!("CARGO_MANIFEST_DIR"), "wos.txt"), &options())
        .unwrap();
    let zeng = Value::tuple(["ZENG", "EDDY Y"]);
    let series = corpus
        .feature_distribution("authors", &zeng, &SliceSpec::yearly())
        .unwrap();
    let counts: Vec<f64> = series.into_iter().map(|(_, c)| c).collect();
    assert_eq!(counts, vec![0.0, 1.0]);
}

#[test]
fn every_paper_shares_one_accession_and_has_an_ayjid() {
    let reader = WosReader::new().unwrap();
    let papers = reader
        .read(&fixture(env!("CARGO_MANIFEST_DIR"), "wos.txt"), &ReadOptions::default())
        .unwrap();
    let accession = papers[0].accession.clone().unwrap();
    assert!(papers.iter().all(|p| p.accession.as_deref() == Some(accession.as_str())));
    assert!(papers.iter().all(|p| p.ayjid.is_some()));
    assert!(papers.iter().flat_map(|p| &p.citations).all(|c| c.ayjid.is_some() && c.citations.is_empty()));
}

#[test]
fn parse_only_restricts_fields() {
    let reader = WosReader::new().unwrap();
    let papers = reader
        .read(
            &fixture(env!("CARGO_MANIFEST_DIR"), "wos.txt"),
            &ReadOptions {
                parse_only: Some(vec![Field::Atitle, Field::Date]),
                ..ReadOptions::default()
            },
        )
        .unwrap();
    let p = &papers[0];
    assert!(p.atitle.is_some());
    assert_eq!(p.date, Some(2012));
    assert!(p.aulast.is_empty());
    assert!(p.citations.is_empty());
    assert!(p.extras.is_empty());
    assert_eq!(p.ayjid.as_deref(), Some("PETERS M 2012 BIOLOGY & PHILOSOPHY"));
}
