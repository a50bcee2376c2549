//! adif logbook support for groundwave.
//!
//! - [`parse`]: read an adif document, skipping records that don't parse
//! - [`write_adif`]: export qsos in the same token grammar
//! - [`Logbook`]: search and summary queries over parsed qsos

mod error;
mod logbook;
mod parser;
mod qso;
mod writer;

pub use error::{AdifError, RecordError};
pub use logbook::Logbook;
pub use parser::{parse, parse_bytes};
pub use qso::{QslStatus, Qso};
pub use writer::{ADIF_VERSION, PROGRAM_ID, format_record, write_adif};

/// result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, AdifError>;
