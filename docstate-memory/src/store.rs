//! In-memory storage implementation.
//!
//! Documents are kept as BSON documents in per-collection maps behind an async-aware
//! read-write lock. Indexes are bookkept the way a document database reports them, including
//! the primary-key index and the marker/weights layout of full-text indexes, so schema
//! reconciliation behaves against this store as it does against a real one. Unique indexes
//! are enforced on creation and on every save.

use async_trait::async_trait;
use bson::{Bson, Document, Uuid, doc};
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;
use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use docstate_core::{
    backend::{DocumentStream, ScoredDocument, StoreBackend, StoreBackendBuilder},
    error::{DataError, DataResult},
    index::{ExistingIndex, IndexSpec, PRIMARY_KEY_INDEX},
};

use crate::fields::{index_key, lookup, text_score, unset};

#[derive(Debug, Default)]
struct CollectionData {
    documents: HashMap<Uuid, Document>,
    indexes: Vec<ExistingIndex>,
}

impl CollectionData {
    fn text_index(&self) -> Option<&ExistingIndex> {
        self.indexes
            .iter()
            .find(|index| index.is_text())
    }

    /// Fails when `document` would collide with another document on a unique index.
    fn check_unique(&self, collection: &str, id: &Uuid, document: &Document) -> DataResult<()> {
        for index in self
            .indexes
            .iter()
            .filter(|index| index.unique && !index.is_text())
        {
            let Some(key) = index_key(document, index) else {
                continue;
            };

            let collides = self
                .documents
                .iter()
                .filter(|(other, _)| *other != id)
                .any(|(_, other)| index_key(other, index).as_ref() == Some(&key));

            if collides {
                return Err(DataError::Store(format!(
                    "duplicate key error collection: {} index: {}",
                    collection, index.name
                )));
            }
        }

        Ok(())
    }
}

type StoreMap = HashMap<String, CollectionData>;

/// Thread-safe in-memory document storage backend.
///
/// Cloning shares the underlying data, so a clone can be handed to test code that inspects
/// what a manager wrote.
///
/// # Example
///
/// ```ignore
/// use docstate_memory::InMemoryStore;
/// use docstate::backend::StoreBackend;
/// use docstate::index::IndexSpec;
///
/// let store = InMemoryStore::new();
/// store.create_index("countries", &IndexSpec::ascending("code")).await?;
/// assert_eq!(store.list_indexes("countries").await?.len(), 2);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents and indexes
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Inserts raw documents, bypassing unique checks. Meant for seeding fixtures that a
    /// record type could no longer produce, such as documents carrying a retired field.
    pub async fn seed(&self, collection: &str, documents: Vec<(Uuid, Document)>) {
        self.store
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .documents
            .extend(documents);
    }

    fn primary_index() -> ExistingIndex {
        ExistingIndex {
            name: PRIMARY_KEY_INDEX.to_string(),
            keys: doc! { "_id": 1 },
            weights: None,
            unique: false,
            sparse: false,
        }
    }
}

fn as_document(document: Bson) -> DataResult<Document> {
    match document {
        Bson::Document(document) => Ok(document),
        other => Err(DataError::InvalidDocument(format!(
            "expected a document, got {:?}",
            other.element_type()
        ))),
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn list_indexes(&self, collection: &str) -> DataResult<Vec<ExistingIndex>> {
        let store = self.store.read().await;
        let Some(collection_data) = store.get(collection) else {
            return Ok(vec![]);
        };

        Ok(std::iter::once(Self::primary_index())
            .chain(collection_data.indexes.iter().cloned())
            .collect())
    }

    async fn create_index(&self, collection: &str, spec: &IndexSpec) -> DataResult<()> {
        let mut store = self.store.write().await;
        let collection_data = store
            .entry(collection.to_string())
            .or_default();
        let index = ExistingIndex::from_spec(spec.default_name(), spec);

        if let Some(existing) = collection_data
            .indexes
            .iter()
            .find(|existing| existing.name == index.name || existing.keys == index.keys && existing.weights == index.weights)
        {
            if *existing == index {
                return Ok(());
            }
            return Err(DataError::Store(format!(
                "index {} conflicts with existing index {} in collection {}",
                index.name, existing.name, collection
            )));
        }

        if index.is_text() && collection_data.text_index().is_some() {
            return Err(DataError::Store(format!(
                "collection {} already has a text index",
                collection
            )));
        }

        if index.unique && !index.is_text() {
            let mut seen = Vec::new();
            for document in collection_data.documents.values() {
                if let Some(key) = index_key(document, &index) {
                    if seen.contains(&key) {
                        return Err(DataError::Store(format!(
                            "duplicate key error collection: {} index: {}",
                            collection, index.name
                        )));
                    }
                    seen.push(key);
                }
            }
        }

        collection_data.indexes.push(index);

        Ok(())
    }

    async fn drop_index(&self, collection: &str, name: &str) -> DataResult<()> {
        if name == PRIMARY_KEY_INDEX {
            return Err(DataError::Store("cannot drop _id index".to_string()));
        }

        let mut store = self.store.write().await;
        let collection_data = store
            .get_mut(collection)
            .ok_or_else(|| DataError::Store(format!("ns not found {collection}")))?;

        let before = collection_data.indexes.len();
        collection_data
            .indexes
            .retain(|index| index.name != name);

        if collection_data.indexes.len() == before {
            return Err(DataError::Store(format!(
                "index not found with name [{name}]"
            )));
        }

        Ok(())
    }

    async fn count_with_field(&self, collection: &str, field: &str) -> DataResult<u64> {
        Ok(self
            .store
            .read()
            .await
            .get(collection)
            .map(|collection_data| {
                collection_data
                    .documents
                    .values()
                    .filter(|document| lookup(document, field).is_some())
                    .count() as u64
            })
            .unwrap_or(0))
    }

    async fn stream_with_field(&self, collection: &str, field: &str) -> DataResult<DocumentStream> {
        let documents = self
            .store
            .read()
            .await
            .get(collection)
            .map(|collection_data| {
                collection_data
                    .documents
                    .values()
                    .filter(|document| lookup(document, field).is_some())
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Ok(stream::iter(documents.into_iter().map(Ok)).boxed())
    }

    async fn unset_field(&self, collection: &str, field: &str) -> DataResult<()> {
        if let Some(collection_data) = self
            .store
            .write()
            .await
            .get_mut(collection)
        {
            for document in collection_data.documents.values_mut() {
                unset(document, field);
            }
        }

        Ok(())
    }

    async fn find_documents(&self, collection: &str) -> DataResult<Vec<Bson>> {
        Ok(self
            .store
            .read()
            .await
            .get(collection)
            .map(|collection_data| {
                collection_data
                    .documents
                    .values()
                    .cloned()
                    .map(Bson::Document)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_document(&self, collection: &str, id: Uuid) -> DataResult<Option<Bson>> {
        Ok(self
            .store
            .read()
            .await
            .get(collection)
            .and_then(|collection_data| collection_data.documents.get(&id))
            .cloned()
            .map(Bson::Document))
    }

    async fn save_document(&self, collection: &str, id: Uuid, document: Bson) -> DataResult<bool> {
        let document = as_document(document)?;
        let mut store = self.store.write().await;
        let collection_data = store
            .entry(collection.to_string())
            .or_default();

        collection_data.check_unique(collection, &id, &document)?;

        Ok(collection_data
            .documents
            .insert(id, document)
            .is_none())
    }

    async fn delete_document(&self, collection: &str, id: Uuid) -> DataResult<()> {
        if let Some(collection_data) = self
            .store
            .write()
            .await
            .get_mut(collection)
        {
            collection_data.documents.remove(&id);
        }

        Ok(())
    }

    async fn text_search(&self, collection: &str, text: &str) -> DataResult<Vec<ScoredDocument>> {
        let store = self.store.read().await;
        let weights = store
            .get(collection)
            .and_then(|collection_data| collection_data.text_index())
            .and_then(|index| index.weights.as_ref())
            .ok_or_else(|| DataError::Store(format!("text index required for $text query on {collection}")))?;

        let terms = text
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut matches = store
            .get(collection)
            .map(|collection_data| {
                collection_data
                    .documents
                    .values()
                    .map(|document| (text_score(document, weights, &terms), document))
                    .filter(|(score, _)| *score > 0.0)
                    .map(|(score, document)| ScoredDocument {
                        score,
                        document: Bson::Document(document.clone()),
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
        });

        Ok(matches)
    }
}

/// Builder for [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Always succeeds with a freshly initialized store.
    async fn build(self) -> DataResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
