//! Error types and result types for model and store operations.
//!
//! This module provides error handling for every operation in the crate.
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.
//!
//! Point lookups that find nothing are not errors; they return `None`.

use serde_json::Error as SerdeJsonError;
use std::time::Duration;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// The connection source is missing or invalid, or a collection does not satisfy the
    /// `id` partition key precondition. Raised while building a registry or verifying a model.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A document with the given ID already exists in the collection.
    #[error("Document {id} already exists in collection {collection}")]
    Conflict { id: String, collection: String },
    /// The document targeted by a replace does not exist.
    #[error("Document not found {id} in collection {collection}")]
    NotFound { id: String, collection: String },
    /// Any other failure reported by the underlying store, surfaced verbatim.
    ///
    /// `status` is the store's status code when the failure came with one.
    #[error("Store error during {operation} on {target} (status {}): {message}", display_status(.status))]
    Store {
        operation: &'static str,
        target: String,
        status: Option<u16>,
        message: String,
    },
    /// The per-call deadline elapsed before the store answered.
    #[error("{operation} on collection {collection} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        collection: String,
        after: Duration,
    },
    /// The document could not be prepared for the store.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// Serialization/deserialization error when converting between payloads and JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The identifier generator could not produce a new id.
    #[error("Id generation error: {0}")]
    IdGeneration(String),
}

impl DocumentStoreError {
    /// Builds a [`DocumentStoreError::Store`] error.
    pub fn store(
        operation: &'static str,
        target: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        DocumentStoreError::Store {
            operation,
            target: target.into(),
            status,
            message: message.into(),
        }
    }

    /// Returns the store status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            DocumentStoreError::Store { status, .. } => *status,
            DocumentStoreError::Conflict { .. } => Some(409),
            DocumentStoreError::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}

fn display_status(status: &Option<u16>) -> String {
    match status {
        Some(status) => status.to_string(),
        None => "none".to_string(),
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
