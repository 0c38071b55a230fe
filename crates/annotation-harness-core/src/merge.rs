//! Merge rules applied when a draft matches an already stored row.
//!
//! Every scalar field follows fill-missing-only: a non-empty incoming value
//! wins, an empty incoming value falls back to the stored one. The
//! annotation `location` is the exception, see [`LocationMergePolicy`].
//!
//! These functions are pure so that every [`Store`](crate::store::Store)
//! implementation applies exactly the same rules inside its own
//! transaction.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::models::{Annotation, AnnotationDraft, Book, BookDraft, Location};

/// How the `location` of a matched annotation is merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationMergePolicy {
    /// Keep the stored location only when both stored and incoming are
    /// non-empty; otherwise take the incoming one, even if it is empty.
    /// Matches what existing stores were written with, and lets a later
    /// sighting without location data erase a recorded location.
    #[default]
    Legacy,
    /// Same rule as every other field: an empty incoming location keeps
    /// the stored one.
    FillMissing,
}

impl LocationMergePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationMergePolicy::Legacy => "legacy",
            LocationMergePolicy::FillMissing => "fill-missing",
        }
    }

    pub fn merge(&self, existing: &Location, incoming: &Location) -> Location {
        match self {
            LocationMergePolicy::Legacy => {
                if !existing.is_empty() && !incoming.is_empty() {
                    *existing
                } else {
                    *incoming
                }
            }
            LocationMergePolicy::FillMissing => {
                if incoming.is_empty() {
                    *existing
                } else {
                    *incoming
                }
            }
        }
    }
}

impl fmt::Display for LocationMergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationMergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(LocationMergePolicy::Legacy),
            "fill-missing" => Ok(LocationMergePolicy::FillMissing),
            other => Err(format!(
                "unknown location merge policy: '{}'. Must be legacy or fill-missing.",
                other
            )),
        }
    }
}

fn fill(existing: &str, incoming: &str) -> String {
    if incoming.is_empty() {
        existing.to_string()
    } else {
        incoming.to_string()
    }
}

/// Merge a book draft into the stored row. The id never changes.
pub fn merge_book(existing: &Book, incoming: &BookDraft) -> Book {
    Book {
        id: existing.id,
        isbn: fill(&existing.isbn, &incoming.isbn),
        name: fill(&existing.name, &incoming.name),
        authors: fill(&existing.authors, &incoming.authors),
    }
}

/// Merge an annotation draft into the stored row.
pub fn merge_annotation(
    existing: &Annotation,
    incoming: &AnnotationDraft,
    policy: LocationMergePolicy,
) -> Annotation {
    Annotation {
        id: existing.id,
        book_id: existing.book_id,
        text: fill(&existing.text, &incoming.text),
        location: policy.merge(&existing.location, &incoming.location),
        timestamp: incoming.timestamp.or(existing.timestamp),
        origin: fill(&existing.origin, &incoming.origin),
        kind: incoming.kind.or(existing.kind),
    }
}

/// Whether a draft denotes the stored book: same non-empty ISBN, otherwise
/// the exact same name.
pub fn book_matches(existing: &Book, draft: &BookDraft) -> bool {
    if !draft.isbn.is_empty() && existing.isbn == draft.isbn {
        return true;
    }
    existing.name == draft.name
}
