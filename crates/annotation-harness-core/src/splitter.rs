//! Sentinel-delimited record splitter for clipping exports.
//!
//! A clippings file is a sequence of records separated by a line holding
//! exactly `==========`. [`RecordSplitter`] turns any [`Read`] into a lazy
//! iterator of trimmed record blocks while holding at most one record in
//! memory.
//!
//! # Algorithm
//!
//! [`split_record`] is a pure function over the buffered bytes:
//!
//! 1. If the sentinel occurs, the current block runs from the start of the
//!    buffer (after any leading newline or BOM bytes) to the sentinel, with
//!    trailing `\r`/`\n` removed. Nothing else is trimmed.
//! 2. The next block starts after the sentinel and any newline or BOM
//!    bytes that immediately follow it.
//! 3. Without a sentinel, the remaining bytes form a final block at end of
//!    input; otherwise more input is requested.
//!
//! The iterator feeds [`split_record`] with chunks of `read_buffer_bytes`
//! and fails with [`IngestError::RecordTooLarge`] once a record outgrows
//! `max_record_bytes`.
//!
//! # Example
//!
//! ```rust
//! use annotation_harness_core::splitter::RecordSplitter;
//!
//! let input = "Title (Author)\n- Your Note | Added on x\n\nbody\n==========\n";
//! let blocks: Vec<String> = RecordSplitter::new(input.as_bytes())
//!     .map(|r| r.unwrap().text)
//!     .collect();
//! assert_eq!(blocks.len(), 1);
//! assert!(blocks[0].ends_with("body"));
//! ```

use std::io::{ErrorKind, Read};

use crate::error::{IngestError, Result};

/// Literal line separating two records.
pub const SENTINEL: &[u8] = b"==========";

/// Default upper bound for a single record.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Default size of each read from the underlying stream.
pub const DEFAULT_READ_BUFFER_BYTES: usize = 64 * 1024;

const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Outcome of one [`split_record`] step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    /// A block spans `data[start..end]`; the next block begins at `advance`.
    Token {
        advance: usize,
        start: usize,
        end: usize,
    },
    /// No sentinel yet and more input may arrive.
    NeedMore,
    /// End of input with nothing left.
    Done,
}

/// Locate the next record in `data`.
pub fn split_record(data: &[u8], at_eof: bool) -> Split {
    if at_eof && data.is_empty() {
        return Split::Done;
    }
    if let Some(i) = find_sentinel(data) {
        let end = trim_line_endings(data, i);
        return Split::Token {
            advance: skip_separators(data, i + SENTINEL.len()),
            start: skip_separators(data, 0).min(end),
            end,
        };
    }
    if at_eof {
        let end = trim_line_endings(data, data.len());
        return Split::Token {
            advance: data.len(),
            start: skip_separators(data, 0).min(end),
            end,
        };
    }
    Split::NeedMore
}

fn find_sentinel(data: &[u8]) -> Option<usize> {
    data.windows(SENTINEL.len()).position(|w| w == SENTINEL)
}

fn skip_separators(data: &[u8], mut from: usize) -> usize {
    loop {
        match data.get(from..) {
            Some([b'\n' | b'\r', ..]) => from += 1,
            Some(rest) if rest.starts_with(BOM) => from += BOM.len(),
            _ => return from,
        }
    }
}

fn trim_line_endings(data: &[u8], mut end: usize) -> usize {
    while end > 0 && matches!(data[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    end
}

/// A record block produced by [`RecordSplitter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based position among the non-empty blocks of the stream.
    pub number: usize,
    pub text: String,
}

/// Lazy iterator over the record blocks of a clippings stream.
///
/// Blocks that are empty after trimming (for example trailing blank lines
/// after the last sentinel) are not yielded. After the first error the
/// iterator is exhausted.
pub struct RecordSplitter<R> {
    reader: R,
    buf: Vec<u8>,
    pos: usize,
    read_size: usize,
    max_record_bytes: usize,
    records: usize,
    eof: bool,
    finished: bool,
}

impl<R: Read> RecordSplitter<R> {
    pub fn new(reader: R) -> Self {
        Self::with_limits(reader, DEFAULT_READ_BUFFER_BYTES, DEFAULT_MAX_RECORD_BYTES)
    }

    pub fn with_limits(reader: R, read_size: usize, max_record_bytes: usize) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(read_size),
            pos: 0,
            read_size: read_size.max(1),
            max_record_bytes,
            records: 0,
            eof: false,
            finished: false,
        }
    }

    /// Pull one chunk from the reader. Returns `false` at end of input.
    fn fill(&mut self) -> std::io::Result<bool> {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        let filled = self.buf.len();
        self.buf.resize(filled + self.read_size, 0);
        loop {
            match self.reader.read(&mut self.buf[filled..]) {
                Ok(n) => {
                    self.buf.truncate(filled + n);
                    return Ok(n > 0);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buf.truncate(filled);
                    return Err(e);
                }
            }
        }
    }

    fn too_large(&mut self) -> IngestError {
        self.finished = true;
        IngestError::RecordTooLarge {
            record: self.records + 1,
            limit: self.max_record_bytes,
        }
    }
}

impl<R: Read> Iterator for RecordSplitter<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let window = &self.buf[self.pos..];
            match split_record(window, self.eof) {
                Split::Token {
                    advance,
                    start,
                    end,
                } => {
                    if end - start > self.max_record_bytes {
                        return Some(Err(self.too_large()));
                    }
                    let text = String::from_utf8_lossy(&window[start..end]).into_owned();
                    self.pos += advance;
                    if text.is_empty() {
                        continue;
                    }
                    self.records += 1;
                    return Some(Ok(Record {
                        number: self.records,
                        text,
                    }));
                }
                Split::Done => self.finished = true,
                Split::NeedMore => {
                    if window.len() > self.max_record_bytes {
                        return Some(Err(self.too_large()));
                    }
                    match self.fill() {
                        Ok(more) => self.eof = !more,
                        Err(e) => {
                            self.finished = true;
                            return Some(Err(e.into()));
                        }
                    }
                }
            }
        }
        None
    }
}
