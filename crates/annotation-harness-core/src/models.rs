//! Core data models used throughout Annotation Harness.
//!
//! Drafts are what the parsers produce: values that have not been
//! reconciled against the store and carry no persisted identity. [`Book`]
//! and [`Annotation`] are the stored rows, each with the surrogate id the
//! store assigned on first insert.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of annotation recorded by a reading device or platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationType {
    Note,
    Highlight,
}

impl AnnotationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationType::Note => "note",
            AnnotationType::Highlight => "highlight",
        }
    }
}

impl fmt::Display for AnnotationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnnotationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "note" => Ok(AnnotationType::Note),
            "highlight" => Ok(AnnotationType::Highlight),
            other => Err(format!("unknown annotation type: '{}'", other)),
        }
    }
}

/// Page and location range of an annotation.
///
/// Every bound is optional. A field that the source did not provide is
/// `None`, never zero. Serialized with camelCase keys and absent fields
/// omitted, which is also the on-disk JSON form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_start: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_end: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_start: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_end: Option<u32>,
}

impl Location {
    /// A location with no numeric field set.
    pub fn is_empty(&self) -> bool {
        self.page_start.is_none()
            && self.page_end.is_none()
            && self.location_start.is_none()
            && self.location_end.is_none()
    }
}

/// A book as seen by a parser, before reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookDraft {
    pub isbn: String,
    pub name: String,
    pub authors: String,
}

impl BookDraft {
    /// Key used by the per-run book cache.
    pub fn cache_key(&self) -> String {
        format!("{}/{}", self.isbn, self.name)
    }
}

/// A stored book row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    pub id: i64,
    pub isbn: String,
    pub name: String,
    pub authors: String,
}

impl Book {
    pub fn cache_key(&self) -> String {
        format!("{}/{}", self.isbn, self.name)
    }
}

/// An annotation as seen by a parser, before it is attached to a book id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationDraft {
    pub text: String,
    pub location: Location,
    pub timestamp: Option<DateTime<Utc>>,
    pub origin: String,
    pub kind: Option<AnnotationType>,
}

/// A stored annotation row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub id: i64,
    pub book_id: i64,
    pub text: String,
    pub location: Location,
    pub timestamp: Option<DateTime<Utc>>,
    pub origin: String,
    #[serde(rename = "type")]
    pub kind: Option<AnnotationType>,
}

/// One record produced by a parser: the book it belongs to and the
/// annotation itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    pub book: BookDraft,
    pub annotation: AnnotationDraft,
}

/// Result of a store upsert: the row as persisted and whether a row with
/// the same identity already existed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted<T> {
    pub existed: bool,
    pub record: T,
}
