//! Record managers.
//!
//! A record manager is the typed entry point for one collection. [`RecordManager`] is the
//! seam the caching layer wraps; [`StoreRecordManager`] is the plain implementation that
//! talks to a [`StoreBackend`] directly.
//!
//! # Example
//!
//! ```ignore
//! use docstate::manager::{RecordManager, StoreRecordManager};
//!
//! let countries = StoreRecordManager::<_, Country>::new(store.clone());
//! let was_insert = countries.save(&country).await?;
//! let all = countries.find_all().await?;
//! ```

use async_trait::async_trait;
use bson::Uuid;
use std::{marker::PhantomData, sync::Arc};
use tracing::debug;

use crate::{
    backend::StoreBackend,
    error::{DataError, DataResult},
    record::{Record, RecordExt},
};

/// A record matched by a full-text search, with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSearchResult<R> {
    pub score: f64,
    pub record: R,
}

/// Typed access to the records of one collection.
#[async_trait]
pub trait RecordManager: Send + Sync {
    type Record: Record;

    fn collection_name(&self) -> &str;

    /// Returns every record of the collection, in store iteration order.
    async fn find_all(&self) -> DataResult<Vec<Self::Record>>;

    /// # Errors
    ///
    /// Returns [`DataError::NotFound`] when no record has this identity.
    async fn get_by_id(&self, id: &Uuid) -> DataResult<Self::Record>;

    /// Inserts or replaces a record. Returns `true` when the write was an insert.
    async fn save(&self, record: &Self::Record) -> DataResult<bool>;

    /// Deletes a record by identity. Deleting an absent record succeeds.
    async fn delete_by_id(&self, id: &Uuid) -> DataResult<()>;

    /// The key a record is stored and cached under.
    fn record_identity(&self, record: &Self::Record) -> Uuid {
        *record.id()
    }
}

/// Record manager reading and writing straight through a shared backend.
#[derive(Debug)]
pub struct StoreRecordManager<B: StoreBackend, R: Record> {
    name: String,
    backend: Arc<B>,
    _marker: PhantomData<R>,
}

impl<B: StoreBackend, R: Record> StoreRecordManager<B, R> {
    /// Manages the record type's own collection.
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_collection(R::collection_name(), backend)
    }

    /// Manages records of type `R` stored under a different collection name.
    pub fn with_collection(name: impl Into<String>, backend: Arc<B>) -> Self {
        Self {
            name: name.into(),
            backend,
            _marker: PhantomData,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Full-text search over the collection's text index, best match first.
    ///
    /// # Errors
    ///
    /// Fails when the collection has no text index or a match does not deserialize.
    pub async fn text_search(&self, text: &str) -> DataResult<Vec<TextSearchResult<R>>> {
        self.backend
            .text_search(&self.name, text)
            .await?
            .into_iter()
            .map(|scored| {
                R::from_bson(scored.document).map(|record| TextSearchResult {
                    score: scored.score,
                    record,
                })
            })
            .collect()
    }
}

#[async_trait]
impl<B: StoreBackend, R: Record> RecordManager for StoreRecordManager<B, R> {
    type Record = R;

    fn collection_name(&self) -> &str {
        &self.name
    }

    async fn find_all(&self) -> DataResult<Vec<R>> {
        self.backend
            .find_documents(&self.name)
            .await?
            .into_iter()
            .map(R::from_bson)
            .collect()
    }

    async fn get_by_id(&self, id: &Uuid) -> DataResult<R> {
        self.backend
            .get_document(&self.name, *id)
            .await?
            .map(R::from_bson)
            .transpose()?
            .ok_or_else(|| DataError::NotFound(id.to_string(), self.name.clone()))
    }

    async fn save(&self, record: &R) -> DataResult<bool> {
        let id = self.record_identity(record);
        debug!(collection = %self.name, %id, "saving record");

        self.backend
            .save_document(&self.name, id, record.to_bson()?)
            .await
    }

    async fn delete_by_id(&self, id: &Uuid) -> DataResult<()> {
        debug!(collection = %self.name, %id, "deleting record");

        self.backend
            .delete_document(&self.name, *id)
            .await
    }
}
