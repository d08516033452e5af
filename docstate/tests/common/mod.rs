#![allow(dead_code)]

use async_trait::async_trait;
use bson::{Bson, Uuid};
use docstate::{memory::InMemoryStore, prelude::*};
use serde::{Deserialize, Serialize};
use std::sync::{
    Arc, Mutex, Once,
    atomic::{AtomicUsize, Ordering},
};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

impl Country {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            id: Uuid::new(),
            code: code.to_string(),
            name: name.to_string(),
        }
    }
}

impl Record for Country {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "countries"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub body: String,
}

impl Record for Article {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "articles"
    }
}

/// Store calls that change state, in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Drop(String),
    Create(String),
    Unset(String),
}

/// In-memory store that records every mutating call it forwards.
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    pub inner: InMemoryStore,
    calls: Arc<Mutex<Vec<Call>>>,
    finds: Arc<AtomicUsize>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl StoreBackend for RecordingStore {
    async fn list_indexes(&self, collection: &str) -> DataResult<Vec<ExistingIndex>> {
        self.inner.list_indexes(collection).await
    }

    async fn create_index(&self, collection: &str, spec: &IndexSpec) -> DataResult<()> {
        self.record(Call::Create(spec.default_name()));
        self.inner.create_index(collection, spec).await
    }

    async fn drop_index(&self, collection: &str, name: &str) -> DataResult<()> {
        self.record(Call::Drop(name.to_string()));
        self.inner.drop_index(collection, name).await
    }

    async fn count_with_field(&self, collection: &str, field: &str) -> DataResult<u64> {
        self.inner.count_with_field(collection, field).await
    }

    async fn stream_with_field(&self, collection: &str, field: &str) -> DataResult<DocumentStream> {
        self.inner.stream_with_field(collection, field).await
    }

    async fn unset_field(&self, collection: &str, field: &str) -> DataResult<()> {
        self.record(Call::Unset(field.to_string()));
        self.inner.unset_field(collection, field).await
    }

    async fn find_documents(&self, collection: &str) -> DataResult<Vec<Bson>> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.inner.find_documents(collection).await
    }

    async fn get_document(&self, collection: &str, id: Uuid) -> DataResult<Option<Bson>> {
        self.inner.get_document(collection, id).await
    }

    async fn save_document(&self, collection: &str, id: Uuid, document: Bson) -> DataResult<bool> {
        self.inner.save_document(collection, id, document).await
    }

    async fn delete_document(&self, collection: &str, id: Uuid) -> DataResult<()> {
        self.inner.delete_document(collection, id).await
    }

    async fn text_search(&self, collection: &str, text: &str) -> DataResult<Vec<ScoredDocument>> {
        self.inner.text_search(collection, text).await
    }
}
