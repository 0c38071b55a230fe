//! Error taxonomy for the ingestion pipeline.
//!
//! Parse-level errors carry the 1-based number of the record that failed.
//! Persistence failures on a single record are not represented here: the
//! reconciliation engine logs and counts them instead of aborting.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// A block or row that does not have the expected structure.
    #[error("record {record}: malformed record: {reason}")]
    MalformedRecord { record: usize, reason: String },

    /// The kind token of an annotation metadata line is neither
    /// `Highlight` nor `Note`.
    #[error("record {record}: unsupported annotation type '{kind}'")]
    UnsupportedAnnotationType { record: usize, kind: String },

    /// No known date layout matched.
    #[error("record {record}: timestamp not parseable: '{value}'")]
    TimestampUnparseable { record: usize, value: String },

    /// The CSV header matches none of the known schemas.
    #[error("unsupported CSV format, header: [{header}]")]
    UnsupportedCsvFormat { header: String },

    /// The book URL column of a CSV row has no ISBN-10/13 substring.
    #[error("record {record}: no ISBN found in book URL '{url}'")]
    IsbnNotFound { record: usize, url: String },

    /// A single record grew past the configured size bound.
    #[error("record {record}: exceeds the maximum record size of {limit} bytes")]
    RecordTooLarge { record: usize, limit: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl IngestError {
    pub(crate) fn malformed(record: usize, reason: impl Into<String>) -> Self {
        IngestError::MalformedRecord {
            record,
            reason: reason.into(),
        }
    }
}
