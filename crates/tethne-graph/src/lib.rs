//! Networks derived from a corpus: builders, time-sliced collections,
//! named algorithms and file formats.

pub mod analysis;
pub mod builders;
pub mod collection;
pub mod io;
pub mod network;

pub use analysis::{sigma, Algorithm, AlgorithmRegistry};
pub use collection::{Analysis, GraphCollection};
pub use io::{read_graphml, write_gexf, write_graphml, write_sif, write_xgmml_dynamic};
pub use network::{Attr, Attrs, DirectedNetwork, EdgeData, Network, NodeData, UndirectedNetwork};
