//! Annotation metadata grammar for clipping records.
//!
//! The second line of every clipping record describes the annotation:
//!
//! ```text
//! - Your Highlight on page 12 | location 170-172 | Added on Monday, January 2, 2017 3:04:05 PM
//! - Highlight Loc. 1585-87  | Added on Tuesday, 8 March 11 20:27:00
//! ```
//!
//! Device firmware changed this line several times. Each known phrasing is
//! a [`GrammarVariant`]; variants are tried in a fixed order and the first
//! one that matches wins. Date layouts work the same way. Adding a format
//! means appending to one of the two lists.
//!
//! Every date starts with a weekday name. It must be a weekday, but it is
//! not checked against the date: the layouts only see what follows it.

use chrono::{DateTime, NaiveDateTime, Utc, Weekday};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::{IngestError, Result};
use crate::models::{AnnotationType, Location};

/// One historical phrasing of the metadata line.
///
/// Patterns expose the named groups `kind` and `date`, and optionally
/// `page_start`, `page_end`, `loc_start`, `loc_end`.
pub struct GrammarVariant {
    pub name: &'static str,
    pub pattern: Regex,
}

impl GrammarVariant {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("built-in grammar pattern must compile"),
        }
    }
}

static BUILTIN_VARIANTS: Lazy<Vec<GrammarVariant>> = Lazy::new(|| {
    vec![
        // "- Your Highlight on page 5 | location 70-71 | Added on ..."
        // "- Your Note at location 123 | Added on ..."
        GrammarVariant::new(
            "page-location",
            r"^-\s*(?:Your )?(?P<kind>\w+)(?: on [Pp]age (?P<page_start>\d+)(?:-(?P<page_end>\d+))?)?(?:(?:\s*\|\s*|\s+)(?:at )?[Ll]ocation (?P<loc_start>\d+)(?:-(?P<loc_end>\d+))?)?\s*\|\s*Added on (?P<date>.+)$",
        ),
        // "- Highlight Loc. 1585-87  | Added on ..."
        // "- Highlight on Page 104 | Loc. 1585-87  | Added on ..."
        GrammarVariant::new(
            "loc-abbreviated",
            r"^-\s*(?:Your )?(?P<kind>\w+)(?: on [Pp]age (?P<page_start>\d+)(?:-(?P<page_end>\d+))?)?\s*(?:\|\s*)?Loc\.\s*(?P<loc_start>\d+)(?:-(?P<loc_end>\d+))?\s*\|\s*Added on (?P<date>.+)$",
        ),
    ]
});

/// Date layouts in the order they are tried, applied after the leading
/// `"<weekday>, "`.
pub const BUILTIN_LAYOUTS: &[&str] = &[
    "%B %d, %Y %I:%M:%S %p",
    "%B %d, %Y %I:%M %p",
    "%d %B %y %H:%M:%S",
    "%d %B %Y %H:%M:%S",
];

/// Metadata extracted from one annotation metadata line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationMetadata {
    pub kind: AnnotationType,
    pub location: Location,
    pub timestamp: DateTime<Utc>,
}

/// Ordered pattern and date-layout alternatives.
pub struct MetadataGrammar {
    variants: &'static [GrammarVariant],
    layouts: &'static [&'static str],
}

impl Default for MetadataGrammar {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataGrammar {
    pub fn new() -> Self {
        Self {
            variants: BUILTIN_VARIANTS.as_slice(),
            layouts: BUILTIN_LAYOUTS,
        }
    }

    pub fn variants(&self) -> &[GrammarVariant] {
        self.variants
    }

    /// Parse an annotation metadata line of record number `record`.
    ///
    /// # Errors
    ///
    /// - [`IngestError::MalformedRecord`] when no variant matches or a
    ///   number does not fit.
    /// - [`IngestError::UnsupportedAnnotationType`] for kinds other than
    ///   `Highlight` and `Note`.
    /// - [`IngestError::TimestampUnparseable`] when no layout parses the
    ///   date.
    pub fn parse(&self, record: usize, line: &str) -> Result<AnnotationMetadata> {
        let line = line.trim();
        let caps = self
            .variants
            .iter()
            .find_map(|v| v.pattern.captures(line))
            .ok_or_else(|| {
                IngestError::malformed(
                    record,
                    format!("annotation metadata matches no known layout: '{}'", line),
                )
            })?;

        let kind = match &caps["kind"] {
            "Highlight" => AnnotationType::Highlight,
            "Note" => AnnotationType::Note,
            other => {
                return Err(IngestError::UnsupportedAnnotationType {
                    record,
                    kind: other.to_string(),
                })
            }
        };

        let location = Location {
            page_start: number(record, &caps, "page_start")?,
            page_end: number(record, &caps, "page_end")?,
            location_start: number(record, &caps, "loc_start")?,
            location_end: number(record, &caps, "loc_end")?,
        };

        let timestamp = self.parse_timestamp(record, caps["date"].trim())?;

        Ok(AnnotationMetadata {
            kind,
            location,
            timestamp,
        })
    }

    /// Strip the weekday, then try every layout in order; the first
    /// successful parse wins.
    pub fn parse_timestamp(&self, record: usize, value: &str) -> Result<DateTime<Utc>> {
        value
            .split_once(", ")
            .filter(|(weekday, _)| weekday.parse::<Weekday>().is_ok())
            .and_then(|(_, date)| {
                self.layouts
                    .iter()
                    .find_map(|layout| NaiveDateTime::parse_from_str(date, layout).ok())
            })
            .map(|naive| naive.and_utc())
            .ok_or_else(|| IngestError::TimestampUnparseable {
                record,
                value: value.to_string(),
            })
    }
}

fn number(record: usize, caps: &Captures<'_>, group: &str) -> Result<Option<u32>> {
    caps.name(group)
        .map(|m| {
            m.as_str().parse::<u32>().map_err(|_| {
                IngestError::malformed(record, format!("{} out of range: {}", group, m.as_str()))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_highlight_on_page() {
        let meta = MetadataGrammar::new()
            .parse(
                1,
                "- Your Highlight on Page 12 | Added on Monday, January 2, 2017 3:04 PM",
            )
            .unwrap();
        assert_eq!(meta.kind, AnnotationType::Highlight);
        assert_eq!(meta.location.page_start, Some(12));
        assert_eq!(meta.location.page_end, None);
        assert_eq!(meta.location.location_start, None);
        assert_eq!(meta.timestamp, ts(2017, 1, 2, 15, 4, 0));
    }

    #[test]
    fn test_page_and_location_ranges() {
        let meta = MetadataGrammar::new()
            .parse(
                1,
                "- Your Note on page 5-6 | location 70-71 | Added on Monday, January 2, 2017 3:04:05 PM",
            )
            .unwrap();
        assert_eq!(meta.kind, AnnotationType::Note);
        assert_eq!(
            meta.location,
            Location {
                page_start: Some(5),
                page_end: Some(6),
                location_start: Some(70),
                location_end: Some(71),
            }
        );
        assert_eq!(meta.timestamp, ts(2017, 1, 2, 15, 4, 5));
    }

    #[test]
    fn test_at_location_without_page() {
        let meta = MetadataGrammar::new()
            .parse(
                1,
                "- Your Highlight at location 123-125 | Added on Monday, 2 January 2017 15:04:05",
            )
            .unwrap();
        assert!(meta.location.page_start.is_none());
        assert_eq!(meta.location.location_start, Some(123));
        assert_eq!(meta.location.location_end, Some(125));
    }

    #[test]
    fn test_legacy_loc_abbreviation() {
        let meta = MetadataGrammar::new()
            .parse(
                1,
                "- Highlight Loc. 1585-87  | Added on Monday, 2 January 17 15:04:05",
            )
            .unwrap();
        assert_eq!(meta.kind, AnnotationType::Highlight);
        assert_eq!(meta.location.location_start, Some(1585));
        assert_eq!(meta.location.location_end, Some(87));
        assert_eq!(meta.timestamp, ts(2017, 1, 2, 15, 4, 5));
    }

    #[test]
    fn test_legacy_page_then_loc() {
        let meta = MetadataGrammar::new()
            .parse(
                1,
                "- Highlight on Page 104 | Loc. 1585-87 | Added on Monday, January 2, 2017 3:04 PM",
            )
            .unwrap();
        assert_eq!(meta.location.page_start, Some(104));
        assert_eq!(meta.location.location_start, Some(1585));
    }

    #[test]
    fn test_no_location_is_empty() {
        let meta = MetadataGrammar::new()
            .parse(1, "- Your Note | Added on Monday, January 2, 2017 3:04 PM")
            .unwrap();
        assert!(meta.location.is_empty());
    }

    #[test]
    fn test_unsupported_kind() {
        let err = MetadataGrammar::new()
            .parse(
                7,
                "- Your Bookmark on page 5 | Added on Monday, January 2, 2017 3:04 PM",
            )
            .unwrap_err();
        match err {
            IngestError::UnsupportedAnnotationType { record, kind } => {
                assert_eq!(record, 7);
                assert_eq!(kind, "Bookmark");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_timestamp_is_an_error() {
        let err = MetadataGrammar::new()
            .parse(3, "- Your Highlight on Page 1 | Added on sometime last week")
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::TimestampUnparseable { record: 3, .. }
        ));
    }

    #[test]
    fn test_weekday_name_is_not_checked_against_date() {
        // 2 January 2017 was a Monday.
        let meta = MetadataGrammar::new()
            .parse(
                1,
                "- Your Highlight on Page 7 | Added on Sunday, January 2, 2017 3:04 PM",
            )
            .unwrap();
        assert_eq!(meta.timestamp, ts(2017, 1, 2, 15, 4, 0));

        let meta = MetadataGrammar::new()
            .parse(1, "- Your Note | Added on Friday, 2 January 17 15:04:05")
            .unwrap();
        assert_eq!(meta.timestamp, ts(2017, 1, 2, 15, 4, 5));
    }

    #[test]
    fn test_weekday_is_required() {
        let grammar = MetadataGrammar::new();
        for line in [
            "- Your Highlight on Page 7 | Added on January 2, 2017 3:04 PM",
            "- Your Highlight on Page 7 | Added on Someday, January 2, 2017 3:04 PM",
        ] {
            let err = grammar.parse(4, line).unwrap_err();
            assert!(
                matches!(err, IngestError::TimestampUnparseable { record: 4, .. }),
                "{}: {:?}",
                line,
                err
            );
        }
    }

    #[test]
    fn test_unrecognized_line_is_malformed() {
        let err = MetadataGrammar::new()
            .parse(2, "not a metadata line")
            .unwrap_err();
        assert!(matches!(err, IngestError::MalformedRecord { record: 2, .. }));
    }

    #[test]
    fn test_variants_keep_declared_order() {
        let names: Vec<&str> = MetadataGrammar::new()
            .variants()
            .iter()
            .map(|v| v.name)
            .collect();
        assert_eq!(names, vec!["page-location", "loc-abbreviated"]);
    }
}
