//! Parser for plain-text clipping record blocks.
//!
//! A record block has this shape:
//!
//! ```text
//! Effective Go (John Doe)                                  <- book metadata
//! - Your Highlight on Page 12 | Added on Monday, ...       <- annotation metadata
//!                                                          <- blank separator
//! Sample highlighted text                                  <- body, any number of lines
//! ```
//!
//! Blocks with exactly two lines are bookmark-style entries without a body
//! and are skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::grammar::MetadataGrammar;
use crate::models::{AnnotationDraft, BookDraft, ParsedRecord};

static AUTHOR_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^)]+)\)").expect("author pattern must compile"));

/// Turns record blocks into [`ParsedRecord`]s tagged with one origin.
pub struct ClippingsParser {
    grammar: MetadataGrammar,
    origin: String,
}

impl ClippingsParser {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            grammar: MetadataGrammar::new(),
            origin: origin.into(),
        }
    }

    /// Parse one trimmed block. Returns `Ok(None)` for an empty annotation.
    ///
    /// # Errors
    ///
    /// [`IngestError::MalformedRecord`] when the block is too short or the
    /// third line is not blank, plus anything [`MetadataGrammar::parse`]
    /// reports for the metadata line.
    pub fn parse_block(&self, record: usize, block: &str) -> Result<Option<ParsedRecord>> {
        let lines: Vec<&str> = block.lines().collect();
        if lines.len() == 2 {
            debug!(record, "ignored empty annotation: {:?}", block);
            return Ok(None);
        }
        if lines.len() < 3 {
            return Err(IngestError::malformed(
                record,
                format!("expected at least 3 lines, found {}", lines.len()),
            ));
        }
        if !lines[2].trim().is_empty() {
            return Err(IngestError::malformed(
                record,
                format!("expected empty line but encountered: '{}'", lines[2]),
            ));
        }

        let book = parse_book_metadata(lines[0]);
        let meta = self.grammar.parse(record, lines[1])?;

        Ok(Some(ParsedRecord {
            book,
            annotation: AnnotationDraft {
                text: lines[3..].join("\n"),
                location: meta.location,
                timestamp: Some(meta.timestamp),
                origin: self.origin.clone(),
                kind: Some(meta.kind),
            },
        }))
    }
}

/// Split a `<name> (<author>)` line.
///
/// The author is the last parenthesized group, since titles may contain
/// parentheses themselves. Without any group the whole line is the name.
pub fn parse_book_metadata(line: &str) -> BookDraft {
    let line = line.trim_start_matches('\u{feff}').trim();
    match AUTHOR_GROUP.captures_iter(line).last() {
        Some(caps) => {
            let whole = caps.get(0).map_or(0, |m| m.start());
            BookDraft {
                isbn: String::new(),
                name: line[..whole].trim_end().to_string(),
                authors: caps[1].to_string(),
            }
        }
        None => BookDraft {
            isbn: String::new(),
            name: line.to_string(),
            authors: String::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnnotationType;
    use chrono::NaiveDate;

    const SAMPLE: &str = "Effective Go (John Doe)\n- Your Highlight on Page 12 | Added on Monday, January 2, 2017 3:04 PM\n\nSample highlighted text";

    #[test]
    fn test_parses_sample_record() {
        let parsed = ClippingsParser::new("My Clippings.txt")
            .parse_block(1, SAMPLE)
            .unwrap()
            .expect("not empty");
        assert_eq!(parsed.book.name, "Effective Go");
        assert_eq!(parsed.book.authors, "John Doe");
        assert_eq!(parsed.book.isbn, "");
        assert_eq!(parsed.annotation.kind, Some(AnnotationType::Highlight));
        assert_eq!(parsed.annotation.location.page_start, Some(12));
        assert_eq!(parsed.annotation.text, "Sample highlighted text");
        assert_eq!(parsed.annotation.origin, "My Clippings.txt");
        let expected = NaiveDate::from_ymd_opt(2017, 1, 2)
            .unwrap()
            .and_hms_opt(15, 4, 0)
            .unwrap()
            .and_utc();
        assert_eq!(parsed.annotation.timestamp, Some(expected));
    }

    #[test]
    fn test_two_line_block_is_empty_annotation() {
        let block = "Title (Author)\n- Your Highlight on Page 1 | Added on Monday, January 2, 2017 3:04 PM";
        assert!(ClippingsParser::new("x").parse_block(1, block).unwrap().is_none());
    }

    #[test]
    fn test_missing_separator_is_malformed() {
        let block = "Title (Author)\n- Your Highlight on Page 1 | Added on Monday, January 2, 2017 3:04 PM\nnot blank\nbody";
        let err = ClippingsParser::new("x").parse_block(4, block).unwrap_err();
        assert!(matches!(err, IngestError::MalformedRecord { record: 4, .. }));
    }

    #[test]
    fn test_single_line_block_is_malformed() {
        let err = ClippingsParser::new("x").parse_block(1, "just a title").unwrap_err();
        assert!(matches!(err, IngestError::MalformedRecord { .. }));
    }

    #[test]
    fn test_empty_body_is_kept() {
        let block = "Title (Author)\n- Your Note on Page 1 | Added on Monday, January 2, 2017 3:04 PM\n ";
        let parsed = ClippingsParser::new("x").parse_block(1, block).unwrap().unwrap();
        assert_eq!(parsed.annotation.text, "");
        assert_eq!(parsed.annotation.kind, Some(AnnotationType::Note));
    }

    #[test]
    fn test_multiline_body_joined_with_newline() {
        let block = "Title (Author)\r\n- Your Highlight on Page 1 | Added on Monday, January 2, 2017 3:04 PM\r\n\r\nfirst\r\nsecond";
        let parsed = ClippingsParser::new("x").parse_block(1, block).unwrap().unwrap();
        assert_eq!(parsed.annotation.text, "first\nsecond");
        assert_eq!(parsed.book.authors, "Author");
    }

    #[test]
    fn test_book_title_with_parentheses() {
        let book = parse_book_metadata("Dune (Dune Chronicles, Book 1) (Frank Herbert)");
        assert_eq!(book.name, "Dune (Dune Chronicles, Book 1)");
        assert_eq!(book.authors, "Frank Herbert");
    }

    #[test]
    fn test_book_without_author() {
        let book = parse_book_metadata("\u{feff}Untitled Notes");
        assert_eq!(book.name, "Untitled Notes");
        assert_eq!(book.authors, "");
    }
}
