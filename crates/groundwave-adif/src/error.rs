//! error types for groundwave-adif

use thiserror::Error;

/// errors surfaced by the adif reader and writer.
#[derive(Debug, Error)]
pub enum AdifError {
    /// the underlying reader failed
    #[error("failed to read adif input: {0}")]
    Read(#[source] std::io::Error),

    /// the underlying writer failed
    #[error("failed to write adif output: {0}")]
    Write(#[source] std::io::Error),
}

/// why a single record was rejected.
///
/// record errors never abort a parse; the record is skipped and logged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// a length prefix was not a valid unsigned integer
    #[error("invalid length '{len}' for field {field}")]
    BadLength { field: String, len: String },

    /// the record ended before a field's declared length
    #[error("field {field} declares {len} bytes but only {available} remain")]
    Truncated {
        field: String,
        len: usize,
        available: usize,
    },

    /// a required field is absent or empty
    #[error("missing required field {0}")]
    MissingField(&'static str),

    /// qso_date or time_on did not parse
    #[error("invalid timestamp {date} {time}")]
    BadTimestamp { date: String, time: String },
}
