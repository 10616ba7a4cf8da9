//! tethne-ingestion: bibliographic readers.
//! Every reader turns one input (file or directory) into `Paper`s:
//! - Web of Science field-tagged exports
//! - JSTOR Data-for-Research bundles (metadata + n-gram counts)
//! - PubMed XML
//! - Scopus CSV exports
//! - Plain-text directories
//! - Tethne's own CSV metadata format (read and write)

pub mod sources;

pub use sources::csv::{write_csv, CsvReader};
pub use sources::dfr::{DfrReader, NgramKind};
pub use sources::plaintext::PlainTextReader;
pub use sources::pubmed::PubMedReader;
pub use sources::scopus::ScopusReader;
pub use sources::wos::WosReader;
pub use sources::{ReadOptions, Reader};
