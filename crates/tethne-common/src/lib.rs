//! tethne-common: the bibliographic record, field names and the shared error type.

pub mod error;
pub mod field;
pub mod paper;
pub mod value;

pub use error::{Result, TethneError};
pub use field::Field;
pub use paper::{ayjid, Addresses, Affiliation, Paper, UNKNOWN_PAPER};
pub use value::Value;
