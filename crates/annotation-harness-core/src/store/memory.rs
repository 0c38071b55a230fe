//! In-memory [`Store`] implementation for tests and dry runs.
//!
//! Uses `Vec`s behind `std::sync::RwLock`. Ids are assigned sequentially
//! from 1, like SQLite row ids. Each upsert holds the write lock for its
//! whole lookup-merge-write sequence.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::merge::{book_matches, merge_annotation, merge_book, LocationMergePolicy};
use crate::models::{Annotation, AnnotationDraft, Book, BookDraft, Upserted};

use super::Store;

/// In-memory store for testing and `--dry-run`.
pub struct InMemoryStore {
    books: RwLock<Vec<Book>>,
    annotations: RwLock<Vec<Annotation>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            books: RwLock::new(Vec::new()),
            annotations: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of all stored books, in insertion order.
    pub fn books(&self) -> Vec<Book> {
        self.books.read().unwrap().clone()
    }

    /// Snapshot of all stored annotations, in insertion order.
    pub fn annotations(&self) -> Vec<Annotation> {
        self.annotations.read().unwrap().clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_book(&self, draft: &BookDraft) -> Result<Upserted<Book>> {
        let mut books = self.books.write().unwrap();
        // ISBN matches take precedence over name matches.
        let position = books
            .iter()
            .position(|b| !draft.isbn.is_empty() && b.isbn == draft.isbn)
            .or_else(|| books.iter().position(|b| book_matches(b, draft)));
        match position {
            Some(i) => {
                let merged = merge_book(&books[i], draft);
                books[i] = merged.clone();
                Ok(Upserted {
                    existed: true,
                    record: merged,
                })
            }
            None => {
                let book = Book {
                    id: books.len() as i64 + 1,
                    isbn: draft.isbn.clone(),
                    name: draft.name.clone(),
                    authors: draft.authors.clone(),
                };
                books.push(book.clone());
                Ok(Upserted {
                    existed: false,
                    record: book,
                })
            }
        }
    }

    async fn upsert_annotation(
        &self,
        book_id: i64,
        draft: &AnnotationDraft,
        policy: LocationMergePolicy,
    ) -> Result<Upserted<Annotation>> {
        let mut annotations = self.annotations.write().unwrap();
        let position = annotations
            .iter()
            .position(|a| a.book_id == book_id && a.text == draft.text);
        match position {
            Some(i) => {
                let merged = merge_annotation(&annotations[i], draft, policy);
                annotations[i] = merged.clone();
                Ok(Upserted {
                    existed: true,
                    record: merged,
                })
            }
            None => {
                let annotation = Annotation {
                    id: annotations.len() as i64 + 1,
                    book_id,
                    text: draft.text.clone(),
                    location: draft.location,
                    timestamp: draft.timestamp,
                    origin: draft.origin.clone(),
                    kind: draft.kind,
                };
                annotations.push(annotation.clone());
                Ok(Upserted {
                    existed: false,
                    record: annotation,
                })
            }
        }
    }
}
