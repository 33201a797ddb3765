//! Error types for Librarium
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are categorized by kind so callers can pattern-match on what went
//! wrong instead of parsing messages.
//!
//! ## Error kinds
//!
//! ### Validation
//! - Empty title, status, publisher, person or series name → `Validation`
//! - Name listed twice in one author/editor list → `Validation`
//! - Malformed purchase date → `DateParse`
//!
//! ### Not found
//! - Book, person, publisher or series id that does not exist → `UnknownId`
//!
//! ### Conflicts
//! - Same title plus matching first author/editor on insert → `DuplicateBook`
//! - Rename to a name already taken → `NameAlreadyExists`
//!
//! ### In use
//! - Deleting a person/publisher/series that still has books → `InUse`
//!
//! ### Consistency
//! - Post-write read-back differs from the requested value → `ConsistencyCheck`
//!
//! ### Storage
//! - sqlx failures, with operation context → `Store`
//! - sqlx failures propagated with plain `?` → `SqlxError`

use crate::storage::models::EntityKind;
use thiserror::Error;

/// Result type alias using our CatalogError type
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Main error type for Librarium
#[derive(Error, Debug)]
pub enum CatalogError {
    // ===== Validation Errors =====

    /// Caller supplied an empty or otherwise invalid value. Detected before any write.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Purchase date string did not match any accepted form
    #[error("Problem parsing {format} date '{input}': {reason}")]
    DateParse {
        /// Form the parser attempted ("year", "month year", "day month year")
        format: String,
        input: String,
        reason: String,
    },

    // ===== Lookup Errors =====

    /// Referenced id does not exist
    #[error("Unknown {kind} ID #{id}")]
    UnknownId { kind: EntityKind, id: i64 },

    // ===== Conflict Errors =====

    /// Book with the same title and first author/editor is already catalogued
    #[error("Book \"{title}\" already in database, id #{existing_id}")]
    DuplicateBook {
        title: String,
        /// Id of the stored book that matched, never the candidate's
        existing_id: i64,
    },

    /// Rename target is already used by another row
    #[error("{kind} \"{name}\" already exists")]
    NameAlreadyExists { kind: EntityKind, name: String },

    // ===== In-Use Errors =====

    /// Deletion blocked because books still reference the entity
    #[error("Cannot delete {kind} ID #{id} {name} as they have {} book(s) in database", .books.len())]
    InUse {
        kind: EntityKind,
        id: i64,
        name: String,
        /// Ids of the books that block the deletion
        books: Vec<i64>,
    },

    // ===== Consistency Errors =====

    /// Value read back after a write differs from the value written
    #[error("{operation}: stored value \"{actual}\" does not match requested value \"{expected}\"")]
    ConsistencyCheck {
        operation: String,
        expected: String,
        actual: String,
    },

    /// Stored data violates an invariant the layer relies on
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // ===== Storage Errors =====

    /// Database error annotated with the operation that issued it
    #[error("{context}: {source}")]
    Store {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    /// Database schema migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Generic file I/O error around the catalogue file
    #[error("File I/O error: {0}")]
    FileIoError(String),

    // ===== External Library Errors =====

    /// Database driver error from sqlx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Attach operation context to a sqlx result
pub trait StoreContext<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T>;

    fn with_context<C: Into<String>, F: FnOnce() -> C>(self, f: F) -> Result<T>;
}

impl<T> StoreContext<T> for std::result::Result<T, sqlx::Error> {
    fn context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|source| CatalogError::Store {
            context: context.into(),
            source,
        })
    }

    fn with_context<C: Into<String>, F: FnOnce() -> C>(self, f: F) -> Result<T> {
        self.map_err(|source| CatalogError::Store {
            context: f().into(),
            source,
        })
    }
}

// Helper methods for creating common errors
impl CatalogError {
    /// Create a Validation error with a message
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        CatalogError::Validation(message.into())
    }

    /// Create an UnknownId error
    pub fn unknown_id(kind: EntityKind, id: i64) -> Self {
        CatalogError::UnknownId { kind, id }
    }

    /// Create a ConsistencyCheck error
    pub fn mismatch<O, E, A>(operation: O, expected: E, actual: A) -> Self
    where
        O: Into<String>,
        E: ToString,
        A: ToString,
    {
        CatalogError::ConsistencyCheck {
            operation: operation.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Check if error means a referenced id does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::UnknownId { .. })
    }

    /// Same as `is_not_found`, restricted to one entity kind
    pub fn is_unknown(&self, of: EntityKind) -> bool {
        matches!(self, CatalogError::UnknownId { kind, .. } if *kind == of)
    }

    /// Check if error is an expected "still referenced by books" refusal
    pub fn is_in_use(&self) -> bool {
        matches!(self, CatalogError::InUse { .. })
    }

    /// Check if error was caused by bad caller input
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CatalogError::Validation(_) | CatalogError::DateParse { .. }
        )
    }

    /// Check if error is a duplicate/name conflict
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            CatalogError::DuplicateBook { .. } | CatalogError::NameAlreadyExists { .. }
        )
    }

    /// Check if error came from the database engine
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            CatalogError::Store { .. }
                | CatalogError::SqlxError(_)
                | CatalogError::MigrationFailed(_)
        )
    }

    /// Blocking book ids carried by an `InUse` error
    pub fn blocking_books(&self) -> Option<&[i64]> {
        match self {
            CatalogError::InUse { books, .. } => Some(books),
            _ => None,
        }
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            CatalogError::DuplicateBook { title, existing_id } => {
                format!("\"{}\" is already in the catalogue as book #{}.", title, existing_id)
            }
            CatalogError::InUse { kind, name, books, .. } => {
                let ids = books
                    .iter()
                    .map(|id| format!("#{}", id))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{} \"{}\" is still used by book(s) {}.", kind.label(), name, ids)
            }
            CatalogError::UnknownId { kind, id } => {
                format!("There is no {} with id #{}.", kind, id)
            }
            CatalogError::ConsistencyCheck { operation, .. } => {
                format!("{} did not store the requested value. This is a bug, please report it.", operation)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_id_message() {
        let err = CatalogError::unknown_id(EntityKind::Book, 42);
        assert_eq!(err.to_string(), "Unknown book ID #42");
        assert!(err.is_not_found());
        assert!(err.is_unknown(EntityKind::Book));
        assert!(!err.is_unknown(EntityKind::Series));
    }

    #[test]
    fn test_in_use_carries_books() {
        let err = CatalogError::InUse {
            kind: EntityKind::Publisher,
            id: 3,
            name: "IVP".to_string(),
            books: vec![1, 7],
        };

        assert!(err.is_in_use());
        assert_eq!(err.blocking_books(), Some(&[1, 7][..]));
        assert!(err.to_string().contains("2 book(s)"));
        assert!(err.user_message().contains("#1, #7"));
    }

    #[test]
    fn test_store_context() {
        let res: std::result::Result<(), sqlx::Error> = Err(sqlx::Error::RowNotFound);
        let err = res.context("get_book").unwrap_err();

        assert!(err.is_store_error());
        assert!(err.to_string().starts_with("get_book: "));
    }

    #[test]
    fn test_classification() {
        assert!(CatalogError::invalid_input("empty title").is_validation());
        assert!(CatalogError::DuplicateBook {
            title: "T".to_string(),
            existing_id: 1
        }
        .is_conflict());
        assert!(!CatalogError::mismatch("update_book_title", "a", "b").is_validation());
    }
}
