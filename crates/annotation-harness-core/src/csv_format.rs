//! CSV annotation exports from the O'Reilly learning platform.
//!
//! Two header schemas have been observed:
//!
//! | Schema | Columns |
//! |--------|---------|
//! | [`CsvSchema::WithAuthors`] | Book Title, Authors, Chapter Title, Date of Highlight, Book URL, Chapter URL, Annotation URL, Highlight, Personal Note |
//! | [`CsvSchema::WithoutAuthors`] | Book Title, Chapter Title, Date of Highlight, Book URL, Chapter URL, Annotation URL, Highlight, Personal Note |
//!
//! The header is checked before any row is read, so an unknown export
//! fails without side effects. The ISBN of each book is taken from its
//! book URL (`.../library/view/<slug>/<isbn>/`).

use std::io::Read;

use chrono::NaiveDate;
use csv::StringRecord;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{IngestError, Result};
use crate::models::{AnnotationDraft, AnnotationType, BookDraft, Location, ParsedRecord};

/// Header of the older export, with an explicit authors column.
pub const WITH_AUTHORS_HEADER: [&str; 9] = [
    "Book Title",
    "Authors",
    "Chapter Title",
    "Date of Highlight",
    "Book URL",
    "Chapter URL",
    "Annotation URL",
    "Highlight",
    "Personal Note",
];

/// Header of the current export.
pub const WITHOUT_AUTHORS_HEADER: [&str; 8] = [
    "Book Title",
    "Chapter Title",
    "Date of Highlight",
    "Book URL",
    "Chapter URL",
    "Annotation URL",
    "Highlight",
    "Personal Note",
];

const DATE_LAYOUT: &str = "%Y-%m-%d";

static ISBN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:97[89]\d{10}|\d{9}[\dXx])\b").expect("ISBN pattern must compile")
});

/// Known CSV header schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvSchema {
    WithAuthors,
    WithoutAuthors,
}

/// Column positions for one schema.
#[derive(Debug, Clone, Copy)]
struct Columns {
    title: usize,
    authors: Option<usize>,
    date: usize,
    book_url: usize,
    highlight: usize,
}

impl CsvSchema {
    /// Compare a header row field-for-field against the known schemas.
    pub fn detect(header: &StringRecord) -> Result<Self> {
        let fields: Vec<&str> = header
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let f = if i == 0 { f.trim_start_matches('\u{feff}') } else { f };
                f.trim()
            })
            .collect();
        if fields == WITH_AUTHORS_HEADER {
            Ok(CsvSchema::WithAuthors)
        } else if fields == WITHOUT_AUTHORS_HEADER {
            Ok(CsvSchema::WithoutAuthors)
        } else {
            Err(IngestError::UnsupportedCsvFormat {
                header: fields.join(", "),
            })
        }
    }

    pub fn width(&self) -> usize {
        match self {
            CsvSchema::WithAuthors => WITH_AUTHORS_HEADER.len(),
            CsvSchema::WithoutAuthors => WITHOUT_AUTHORS_HEADER.len(),
        }
    }

    fn columns(&self) -> Columns {
        match self {
            CsvSchema::WithAuthors => Columns {
                title: 0,
                authors: Some(1),
                date: 3,
                book_url: 4,
                highlight: 7,
            },
            CsvSchema::WithoutAuthors => Columns {
                title: 0,
                authors: None,
                date: 2,
                book_url: 3,
                highlight: 6,
            },
        }
    }

    /// Map one data row into a book and highlight draft.
    ///
    /// The book URL doubles as the annotation's origin. This source has no
    /// page or location data.
    pub fn map_row(&self, record: usize, row: &StringRecord) -> Result<ParsedRecord> {
        if row.len() != self.width() {
            return Err(IngestError::malformed(
                record,
                format!("expected {} columns, found {}", self.width(), row.len()),
            ));
        }
        let cols = self.columns();
        let field = |i: usize| row.get(i).unwrap_or_default().trim();

        let book_url = field(cols.book_url);
        let isbn = extract_isbn(book_url).ok_or_else(|| IngestError::IsbnNotFound {
            record,
            url: book_url.to_string(),
        })?;

        let date = field(cols.date);
        let timestamp = NaiveDate::parse_from_str(date, DATE_LAYOUT)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .ok_or_else(|| IngestError::TimestampUnparseable {
                record,
                value: date.to_string(),
            })?;

        Ok(ParsedRecord {
            book: BookDraft {
                isbn: isbn.to_string(),
                name: field(cols.title).to_string(),
                authors: cols.authors.map(field).unwrap_or_default().to_string(),
            },
            annotation: AnnotationDraft {
                text: field(cols.highlight).to_string(),
                location: Location::default(),
                timestamp: Some(timestamp),
                origin: book_url.to_string(),
                kind: Some(AnnotationType::Highlight),
            },
        })
    }
}

/// First ISBN-13 or ISBN-10 found in `url`.
pub fn extract_isbn(url: &str) -> Option<&str> {
    ISBN.find(url).map(|m| m.as_str())
}

/// Reader over the data rows of a CSV export.
///
/// Construction reads and validates the header; iteration yields one
/// [`ParsedRecord`] per data row, numbered from 1.
pub struct CsvRecords<R: Read> {
    schema: CsvSchema,
    reader: csv::Reader<R>,
    row: StringRecord,
    records: usize,
}

impl<R: Read> CsvRecords<R> {
    pub fn new(input: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(input);
        let mut header = StringRecord::new();
        if !reader.read_record(&mut header)? {
            return Err(IngestError::UnsupportedCsvFormat {
                header: String::new(),
            });
        }
        let schema = CsvSchema::detect(&header)?;
        Ok(Self {
            schema,
            reader,
            row: StringRecord::new(),
            records: 0,
        })
    }

    pub fn schema(&self) -> CsvSchema {
        self.schema
    }
}

impl<R: Read> Iterator for CsvRecords<R> {
    type Item = Result<ParsedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_record(&mut self.row) {
            Ok(true) => {
                self.records += 1;
                Some(self.schema.map_row(self.records, &self.row))
            }
            Ok(false) => None,
            Err(e) => Some(Err(e.into())),
        }
    }
}
