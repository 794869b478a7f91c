//! Error types and result types for document store operations.
//!
//! This module provides the error taxonomy shared by every layer of the crate.
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.

use std::fmt::{Display, Formatter};

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
///
/// This enum covers lookups that found nothing, stored bytes that no longer decode, malformed
/// filter and update expressions, bulk mutation failures and errors raised by the underlying
/// key-value engine.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// No document in the collection matched the filter of a single-document operation.
    #[error("No document matched the filter in collection {0}")]
    NoMatch(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// Stored bytes could not be decoded into a document.
    #[error("Decode error: {0}")]
    Decode(String),
    /// A document could not be encoded, or a typed document could not be converted.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An update operator could not be applied.
    #[error("Update operator {operator} failed: {message}")]
    Operator {
        /// The operator name, e.g. `$inc`.
        operator: String,
        /// What went wrong.
        message: String,
    },
    /// The filter expression is malformed.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    /// The document violates structural constraints (not an object, bad `_id`).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// One or more documents failed during a bulk operation.
    #[error("{0}")]
    Aggregate(AggregateError),
    /// The transaction lost a commit-time conflict against a concurrent writer.
    #[error("Transaction conflict: {0}")]
    Conflict(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
    /// Invalid store or collection configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DocumentStoreError {
    /// Creates an [`DocumentStoreError::Operator`] error.
    pub fn operator(operator: impl Into<String>, message: impl Into<String>) -> Self {
        DocumentStoreError::Operator {
            operator: operator.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for both "ID not found" and "nothing matched the filter".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DocumentStoreError::DocumentNotFound(..) | DocumentStoreError::NoMatch(_)
        )
    }
}

/// A single per-document failure collected during a bulk operation.
#[derive(Debug)]
pub struct DocumentFailure {
    /// ID of the document that failed.
    pub id: String,
    /// Why it failed.
    pub error: DocumentStoreError,
}

/// Failures collected across a bulk update.
///
/// `committed` tells how many documents were persisted despite the failures; it is always zero
/// under [`BulkWritePolicy::Atomic`](crate::config::BulkWritePolicy::Atomic).
#[derive(Debug)]
pub struct AggregateError {
    /// Number of documents written by the operation.
    pub committed: usize,
    /// Every document that failed, in processing order.
    pub failures: Vec<DocumentFailure>,
}

impl Display for AggregateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} document(s) failed in bulk operation ({} committed)",
            self.failures.len(),
            self.committed
        )?;

        for failure in &self.failures {
            write!(f, "; {}: {}", failure.id, failure.error)?;
        }

        Ok(())
    }
}

/// A specialized `Result` type for document store operations.
///
/// This type alias is used throughout the crate to indicate operations that may fail
/// with a [`DocumentStoreError`].
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_covers_id_and_filter_misses() {
        assert!(DocumentStoreError::DocumentNotFound("a".into(), "c".into()).is_not_found());
        assert!(DocumentStoreError::NoMatch("c".into()).is_not_found());
        assert!(!DocumentStoreError::Decode("bad".into()).is_not_found());
    }

    #[test]
    fn aggregate_lists_every_failure() {
        let err = DocumentStoreError::Aggregate(AggregateError {
            committed: 1,
            failures: vec![
                DocumentFailure {
                    id: "x".into(),
                    error: DocumentStoreError::operator("$inc", "field price is not numeric"),
                },
                DocumentFailure {
                    id: "y".into(),
                    error: DocumentStoreError::operator("$pop", "direction must be 1 or -1"),
                },
            ],
        });

        let message = err.to_string();
        assert!(message.starts_with("2 document(s) failed in bulk operation (1 committed)"));
        assert!(message.contains("x: Update operator $inc failed"));
        assert!(message.contains("y: Update operator $pop failed"));
    }
}
