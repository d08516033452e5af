//! Caching record manager.
//!
//! [`CachingRecordManager`] wraps any [`RecordManager`] and keeps a full in-memory mirror of
//! its collection. It suits small lookup collections that are read far more often than they
//! are written.
//!
//! # Population
//!
//! The mirror starts empty and is loaded in full by the first read. The cache state sits
//! behind one async mutex per instance: the first reader takes the lock, sees the cache is
//! still empty, loads every record and marks it populated before releasing the lock, so
//! concurrent first readers wait and the load runs exactly once. A failed load leaves the
//! cache empty and the next read tries again.
//!
//! # Writes
//!
//! `save` and `delete_by_id` reach the wrapped manager first and touch the cache only after
//! the store confirmed the write. A write while the cache is empty leaves it empty; the
//! next read loads the written state from the store.

use async_trait::async_trait;
use bson::Uuid;
use mea::mutex::{Mutex, MutexGuard};
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};
use tracing::debug;

use crate::{
    error::{DataError, DataResult},
    manager::RecordManager,
};

struct CacheState<R> {
    populated: bool,
    records: HashMap<Uuid, R>,
}

/// Read-through, write-updated mirror of a whole collection.
pub struct CachingRecordManager<M: RecordManager> {
    inner: M,
    state: Mutex<CacheState<M::Record>>,
    /// Mirrors the state for lock-free inspection; only written under the lock.
    populated: AtomicBool,
}

impl<M: RecordManager> CachingRecordManager<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            state: Mutex::new(CacheState {
                populated: false,
                records: HashMap::new(),
            }),
            populated: AtomicBool::new(false),
        }
    }

    /// The wrapped manager. Writes issued through it bypass the cache.
    pub fn inner(&self) -> &M {
        &self.inner
    }

    /// Whether the cache currently holds a full copy of the collection.
    pub fn is_populated(&self) -> bool {
        self.populated.load(Ordering::Acquire)
    }

    /// Returns the cached record, loading the collection first if needed.
    ///
    /// # Errors
    ///
    /// [`DataError::NotFound`] when the populated cache has no such record, or the store
    /// error if loading failed.
    pub async fn get_by_id(&self, id: &Uuid) -> DataResult<M::Record> {
        self.populated_state()
            .await?
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| DataError::NotFound(id.to_string(), self.inner.collection_name().to_string()))
    }

    /// Returns a snapshot of every cached record. Order is unspecified.
    pub async fn get_all(&self) -> DataResult<Vec<M::Record>> {
        self.filter(|_| true).await
    }

    /// Returns a snapshot of the cached records accepted by `predicate`.
    pub async fn filter<F>(&self, predicate: F) -> DataResult<Vec<M::Record>>
    where
        F: Fn(&M::Record) -> bool + Send,
    {
        Ok(self
            .populated_state()
            .await?
            .records
            .values()
            .filter(|record| predicate(record))
            .cloned()
            .collect())
    }

    /// Saves through the wrapped manager, then updates the cached copy.
    ///
    /// Returns whether the underlying write was an insert.
    pub async fn save(&self, record: &M::Record) -> DataResult<bool> {
        let was_insert = self.inner.save(record).await?;

        let mut state = self.state.lock().await;
        if state.populated {
            state
                .records
                .insert(self.inner.record_identity(record), record.clone());
        }

        Ok(was_insert)
    }

    /// Deletes through the wrapped manager, then drops the cached copy if there is one.
    pub async fn delete_by_id(&self, id: &Uuid) -> DataResult<()> {
        self.inner.delete_by_id(id).await?;

        let mut state = self.state.lock().await;
        if state.populated {
            state.records.remove(id);
        }

        Ok(())
    }

    /// Empties the cache. The next read reloads the collection from the store.
    pub async fn clear_cache(&self) {
        debug!(collection = %self.inner.collection_name(), "clearing cache");

        let mut state = self.state.lock().await;
        state.records.clear();
        state.populated = false;
        self.populated.store(false, Ordering::Release);
    }

    async fn populated_state(&self) -> DataResult<MutexGuard<'_, CacheState<M::Record>>> {
        let mut state = self.state.lock().await;

        if !state.populated {
            let records = self
                .inner
                .find_all()
                .await?
                .into_iter()
                .map(|record| (self.inner.record_identity(&record), record))
                .collect::<HashMap<_, _>>();

            debug!(
                collection = %self.inner.collection_name(),
                count = records.len(),
                "populated cache"
            );

            state.records = records;
            state.populated = true;
            self.populated.store(true, Ordering::Release);
        }

        Ok(state)
    }
}

#[async_trait]
impl<M: RecordManager> RecordManager for CachingRecordManager<M> {
    type Record = M::Record;

    fn collection_name(&self) -> &str {
        self.inner.collection_name()
    }

    async fn find_all(&self) -> DataResult<Vec<M::Record>> {
        self.get_all().await
    }

    async fn get_by_id(&self, id: &Uuid) -> DataResult<M::Record> {
        CachingRecordManager::get_by_id(self, id).await
    }

    async fn save(&self, record: &M::Record) -> DataResult<bool> {
        CachingRecordManager::save(self, record).await
    }

    async fn delete_by_id(&self, id: &Uuid) -> DataResult<()> {
        CachingRecordManager::delete_by_id(self, id).await
    }

    fn record_identity(&self, record: &M::Record) -> Uuid {
        self.inner.record_identity(record)
    }
}

impl<M: RecordManager + std::fmt::Debug> std::fmt::Debug for CachingRecordManager<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingRecordManager")
            .field("inner", &self.inner)
            .field("populated", &self.is_populated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use serde::{Deserialize, Serialize};
    use std::sync::{
        Arc,
        Mutex as StdMutex,
        atomic::AtomicUsize,
    };

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Country {
        id: Uuid,
        code: String,
    }

    impl Record for Country {
        fn id(&self) -> &Uuid {
            &self.id
        }

        fn collection_name() -> &'static str {
            "countries"
        }
    }

    fn country(code: &str) -> Country {
        Country { id: Uuid::new(), code: code.to_string() }
    }

    /// In-process manager that counts loads and can be told to fail.
    #[derive(Default)]
    struct FakeManager {
        records: StdMutex<HashMap<Uuid, Country>>,
        loads: AtomicUsize,
        fail_loads: AtomicBool,
        fail_writes: AtomicBool,
    }

    impl FakeManager {
        fn with(records: Vec<Country>) -> Self {
            let manager = Self::default();
            manager
                .records
                .lock()
                .unwrap()
                .extend(records.into_iter().map(|c| (c.id, c)));
            manager
        }
    }

    #[async_trait]
    impl RecordManager for Arc<FakeManager> {
        type Record = Country;

        fn collection_name(&self) -> &str {
            "countries"
        }

        async fn find_all(&self) -> DataResult<Vec<Country>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail_loads.load(Ordering::SeqCst) {
                return Err(DataError::Store("connection reset".to_string()));
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(self.records.lock().unwrap().values().cloned().collect())
        }

        async fn get_by_id(&self, id: &Uuid) -> DataResult<Country> {
            self.records
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| DataError::NotFound(id.to_string(), "countries".to_string()))
        }

        async fn save(&self, record: &Country) -> DataResult<bool> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(DataError::Store("write refused".to_string()));
            }
            Ok(self
                .records
                .lock()
                .unwrap()
                .insert(record.id, record.clone())
                .is_none())
        }

        async fn delete_by_id(&self, id: &Uuid) -> DataResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(DataError::Store("write refused".to_string()));
            }
            self.records.lock().unwrap().remove(id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn first_read_populates_once() {
        let fake = Arc::new(FakeManager::with(vec![country("NL"), country("BE")]));
        let cache = CachingRecordManager::new(fake.clone());

        assert!(!cache.is_populated());
        assert_eq!(cache.get_all().await.unwrap().len(), 2);
        assert_eq!(cache.get_all().await.unwrap().len(), 2);
        assert!(cache.is_populated());
        assert_eq!(fake.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_reads_load_once() {
        let fake = Arc::new(FakeManager::with(vec![country("NL"), country("BE"), country("LU")]));
        let cache = Arc::new(CachingRecordManager::new(fake.clone()));

        let handles = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_all().await })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().len(), 3);
        }
        assert_eq!(fake.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_id_is_not_found() {
        let cache = CachingRecordManager::new(Arc::new(FakeManager::with(vec![country("NL")])));

        let err = cache.get_by_id(&Uuid::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn save_updates_cache_without_reload() {
        let fake = Arc::new(FakeManager::with(vec![country("NL")]));
        let cache = CachingRecordManager::new(fake.clone());
        cache.get_all().await.unwrap();

        let added = country("DE");
        assert!(cache.save(&added).await.unwrap());
        assert_eq!(cache.get_by_id(&added.id).await.unwrap(), added);

        let renamed = Country { code: "DEU".to_string(), ..added.clone() };
        assert!(!cache.save(&renamed).await.unwrap());
        assert_eq!(cache.get_by_id(&added.id).await.unwrap(), renamed);

        assert_eq!(fake.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_write_leaves_cache_untouched() {
        let existing = country("NL");
        let fake = Arc::new(FakeManager::with(vec![existing.clone()]));
        let cache = CachingRecordManager::new(fake.clone());
        cache.get_all().await.unwrap();

        fake.fail_writes.store(true, Ordering::SeqCst);

        let added = country("DE");
        assert!(cache.save(&added).await.is_err());
        assert!(cache.get_by_id(&added.id).await.unwrap_err().is_not_found());

        assert!(cache.delete_by_id(&existing.id).await.is_err());
        assert_eq!(cache.get_by_id(&existing.id).await.unwrap(), existing);
    }

    #[tokio::test]
    async fn delete_removes_from_cache() {
        let existing = country("NL");
        let cache = CachingRecordManager::new(Arc::new(FakeManager::with(vec![existing.clone()])));
        cache.get_all().await.unwrap();

        cache.delete_by_id(&existing.id).await.unwrap();
        assert!(cache.get_by_id(&existing.id).await.unwrap_err().is_not_found());

        // absent ids are tolerated
        cache.delete_by_id(&existing.id).await.unwrap();
    }

    #[tokio::test]
    async fn write_before_first_read_is_picked_up_by_population() {
        let fake = Arc::new(FakeManager::default());
        let cache = CachingRecordManager::new(fake.clone());

        let added = country("FR");
        assert!(cache.save(&added).await.unwrap());
        assert!(!cache.is_populated());

        assert_eq!(cache.get_by_id(&added.id).await.unwrap(), added);
        assert_eq!(fake.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_population_is_retried() {
        let fake = Arc::new(FakeManager::with(vec![country("NL")]));
        let cache = CachingRecordManager::new(fake.clone());

        fake.fail_loads.store(true, Ordering::SeqCst);
        let err = cache.get_all().await.unwrap_err();
        assert!(matches!(err, DataError::Store(_)));
        assert!(!cache.is_populated());

        fake.fail_loads.store(false, Ordering::SeqCst);
        assert_eq!(cache.get_all().await.unwrap().len(), 1);
        assert_eq!(fake.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn clear_forces_reload() {
        let fake = Arc::new(FakeManager::with(vec![country("NL")]));
        let cache = CachingRecordManager::new(fake.clone());
        cache.get_all().await.unwrap();

        // bypass the cache
        fake.inner_save(country("BE"));

        assert_eq!(cache.get_all().await.unwrap().len(), 1);
        cache.clear_cache().await;
        assert!(!cache.is_populated());
        assert_eq!(cache.get_all().await.unwrap().len(), 2);
        assert_eq!(fake.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn filter_sees_cached_records() {
        let cache = CachingRecordManager::new(Arc::new(FakeManager::with(vec![
            country("NL"),
            country("BE"),
            country("NO"),
        ])));

        let n = cache
            .filter(|c| c.code.starts_with('N'))
            .await
            .unwrap();
        assert_eq!(n.len(), 2);
    }

    impl FakeManager {
        fn inner_save(&self, record: Country) {
            self.records.lock().unwrap().insert(record.id, record);
        }
    }
}
