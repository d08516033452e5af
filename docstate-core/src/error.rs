//! Error types and result types for reconciliation, caching and store access.
//!
//! Every fallible operation in the crate returns [`DataResult<T>`]. Store failures are
//! surfaced as [`DataError::Store`] and are never retried internally; the caller owns
//! restart and backoff policy.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all errors that can occur while reconciling schemas or serving records.
#[derive(Error, Debug)]
pub enum DataError {
    /// A named connection or collection could not be resolved, or settings are malformed.
    /// Fatal to start-up.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Error during backend construction or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An I/O failure reported by the storage backend.
    #[error("Store error: {0}")]
    Store(String),
    /// The requested record is absent.
    /// The first argument is the record ID, the second is the collection name.
    #[error("Record {0} not found in collection {1}")]
    NotFound(String, String),
    /// Serialization/deserialization error when converting between record formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An index declaration is malformed (no keys, repeated field).
    #[error("Invalid index: {0}")]
    InvalidIndex(String),
    /// The document handed to the store is not a BSON document.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A field removal handler failed.
    #[error("Migration error: {0}")]
    Migration(String),
}

impl DataError {
    /// Returns `true` for the expected "record absent" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DataError::NotFound(..))
    }
}

/// A specialized `Result` type for data layer operations.
pub type DataResult<T> = Result<T, DataError>;

impl From<BsonError> for DataError {
    fn from(err: BsonError) -> Self {
        DataError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DataError {
    fn from(err: SerdeJsonError) -> Self {
        DataError::Serialization(err.to_string())
    }
}
