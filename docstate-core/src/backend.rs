//! Storage backend abstraction.
//!
//! [`StoreBackend`] is the minimal set of document-store operations the reconciler and the
//! record managers need: index administration, field presence queries and bulk unsets for
//! schema convergence, plus whole-collection reads and single-record writes for the record
//! managers. Implementations are async and must be safe to share across tasks.
//!
//! Connection-level timeouts belong in the implementation; nothing above this trait retries
//! or times out a call.

use async_trait::async_trait;
use bson::{Bson, Document, Uuid};
use futures::stream::BoxStream;
use std::fmt::Debug;

use crate::{
    error::DataResult,
    index::{ExistingIndex, IndexSpec},
};

/// A finite, one-shot stream of raw documents read from the store.
pub type DocumentStream = BoxStream<'static, DataResult<Document>>;

/// A document matched by a full-text search together with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub score: f64,
    pub document: Bson,
}

/// Abstract interface for document storage backends.
///
/// # Error Handling
///
/// Every I/O failure is reported as [`DataError::Store`](crate::error::DataError::Store).
/// Callers propagate it unchanged.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Lists every index of a collection, including the primary-key index.
    ///
    /// A missing collection has no indexes.
    async fn list_indexes(&self, collection: &str) -> DataResult<Vec<ExistingIndex>>;

    /// Creates an index. Creating an index identical to an existing one is a no-op.
    ///
    /// # Errors
    ///
    /// Fails when an index with the same name but different options exists, or when the
    /// store rejects the index (for instance a unique index over duplicate values).
    async fn create_index(&self, collection: &str, spec: &IndexSpec) -> DataResult<()>;

    /// Drops an index by name.
    async fn drop_index(&self, collection: &str, name: &str) -> DataResult<()>;

    /// Counts documents in which `field` is present.
    async fn count_with_field(&self, collection: &str, field: &str) -> DataResult<u64>;

    /// Streams every document in which `field` is present, as stored.
    async fn stream_with_field(&self, collection: &str, field: &str) -> DataResult<DocumentStream>;

    /// Removes `field` from every document that has it.
    async fn unset_field(&self, collection: &str, field: &str) -> DataResult<()>;

    /// Returns every document of a collection, in store iteration order.
    async fn find_documents(&self, collection: &str) -> DataResult<Vec<Bson>>;

    /// Returns a single document by identity, or `None` when absent.
    async fn get_document(&self, collection: &str, id: Uuid) -> DataResult<Option<Bson>>;

    /// Inserts or replaces a document.
    ///
    /// # Returns
    ///
    /// `true` when the write created a new document, `false` when it replaced one.
    async fn save_document(&self, collection: &str, id: Uuid, document: Bson) -> DataResult<bool>;

    /// Deletes a document by identity. Deleting an absent document succeeds.
    async fn delete_document(&self, collection: &str, id: Uuid) -> DataResult<()>;

    /// Full-text search over the collection's text index, best match first.
    ///
    /// # Errors
    ///
    /// Fails when the collection has no text index.
    async fn text_search(&self, collection: &str, text: &str) -> DataResult<Vec<ScoredDocument>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DataResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Factory for backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DataResult<Self::Backend>;
}
