//! Start-up wiring of record managers.
//!
//! A [`DatabaseManagerBuilder`] collects, per record type, a declared [`CollectionSchema`]
//! and a constructor for the manager that will serve it. [`DatabaseManagerBuilder::build`]
//! reconciles every schema against the store, in registration order, and only then
//! constructs the managers, so no traffic reaches a collection before its indexes and fields
//! have converged.
//!
//! ```ignore
//! let database = DatabaseManager::builder(store)
//!     .register_cached::<Country>(
//!         CollectionSchema::new("countries").index(IndexSpec::ascending("code")),
//!     )
//!     .register_with::<Order>(
//!         CollectionSchema::new("orders").migration(FieldMigration::remove("legacy_total")),
//!     )
//!     .build()
//!     .await?;
//!
//! let countries = database.cached::<Country>()?;
//! let nl = countries.get_by_id(&id).await?;
//! ```

use std::{
    any::{Any, TypeId, type_name},
    collections::HashMap,
    sync::Arc,
};
use tracing::info;

use crate::{
    backend::StoreBackend,
    cache::CachingRecordManager,
    error::{DataError, DataResult},
    manager::StoreRecordManager,
    reconcile::{CollectionSchema, ReconcileReport, SchemaReconciler},
    record::Record,
};

type ManagerFactory<B> = Box<dyn FnOnce(Arc<B>, &str) -> Box<dyn Any + Send + Sync> + Send>;

struct Registration<B> {
    schema: CollectionSchema,
    manager_type: TypeId,
    type_name: &'static str,
    factory: ManagerFactory<B>,
}

/// Collects record types and their schemas before anything touches the store.
pub struct DatabaseManagerBuilder<B: StoreBackend> {
    backend: Arc<B>,
    registrations: Vec<Registration<B>>,
}

impl<B: StoreBackend + 'static> DatabaseManagerBuilder<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            registrations: Vec::new(),
        }
    }

    /// Registers a plain manager for `R` over its own collection, leaving the schema alone.
    pub fn register<R: Record>(self) -> Self {
        self.register_with::<R>(CollectionSchema::new(R::collection_name()))
    }

    /// Registers a plain manager for `R`, served from the schema's collection.
    pub fn register_with<R: Record>(self, schema: CollectionSchema) -> Self {
        self.push::<StoreRecordManager<B, R>>(schema, |backend, collection| {
            StoreRecordManager::<B, R>::with_collection(collection, backend)
        })
    }

    /// Registers a caching manager for `R`, served from the schema's collection.
    pub fn register_cached<R: Record>(self, schema: CollectionSchema) -> Self {
        self.push::<CachingRecordManager<StoreRecordManager<B, R>>>(schema, |backend, collection| {
            CachingRecordManager::new(StoreRecordManager::<B, R>::with_collection(collection, backend))
        })
    }

    fn push<M>(mut self, schema: CollectionSchema, construct: fn(Arc<B>, &str) -> M) -> Self
    where
        M: Send + Sync + 'static,
    {
        let factory: ManagerFactory<B> = Box::new(
            move |backend: Arc<B>, collection: &str| -> Box<dyn Any + Send + Sync> {
                Box::new(construct(backend, collection))
            },
        );

        self.registrations.push(Registration {
            schema,
            manager_type: TypeId::of::<M>(),
            type_name: type_name::<M>(),
            factory,
        });
        self
    }

    /// Reconciles every registered schema, then instantiates the managers.
    ///
    /// # Errors
    ///
    /// [`DataError::Config`] when a manager type is registered twice; otherwise the first
    /// reconciliation failure, after which no managers are built.
    pub async fn build(self) -> DataResult<DatabaseManager<B>> {
        let reconciler = SchemaReconciler::new(self.backend.as_ref());
        let mut reports = Vec::with_capacity(self.registrations.len());

        for registration in &self.registrations {
            if self
                .registrations
                .iter()
                .filter(|other| other.manager_type == registration.manager_type)
                .count()
                > 1
            {
                return Err(DataError::Config(format!(
                    "{} is registered more than once",
                    registration.type_name
                )));
            }
        }

        for registration in &self.registrations {
            let collection = registration.schema.collection();
            let report = reconciler
                .reconcile_schema(&registration.schema)
                .await?;

            info!(
                collection,
                dropped = report.dropped_indexes.len(),
                ensured = report.ensured_indexes,
                removed_fields = report.removed_fields.len(),
                "reconciled collection schema"
            );
            reports.push((collection.to_string(), report));
        }

        let managers = self
            .registrations
            .into_iter()
            .map(|registration| {
                let manager = (registration.factory)(
                    self.backend.clone(),
                    registration.schema.collection(),
                );
                (registration.manager_type, manager)
            })
            .collect();

        Ok(DatabaseManager {
            backend: self.backend,
            managers,
            reports,
        })
    }
}

/// Record managers of one database, ready for traffic.
pub struct DatabaseManager<B: StoreBackend> {
    backend: Arc<B>,
    managers: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    reports: Vec<(String, ReconcileReport)>,
}

impl<B: StoreBackend + 'static> DatabaseManager<B> {
    pub fn builder(backend: B) -> DatabaseManagerBuilder<B> {
        DatabaseManagerBuilder::new(Arc::new(backend))
    }

    pub fn store(&self) -> &B {
        &self.backend
    }

    /// What start-up reconciliation changed, per collection.
    pub fn reports(&self) -> &[(String, ReconcileReport)] {
        &self.reports
    }

    /// The plain manager for `R`. For a cached registration this is the wrapped manager,
    /// whose writes bypass the cache.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Config`] when `R` was not registered.
    pub fn records<R: Record>(&self) -> DataResult<&StoreRecordManager<B, R>> {
        self.lookup::<StoreRecordManager<B, R>>()
            .or_else(|_| {
                self.cached::<R>()
                    .map(|cached| cached.inner())
            })
    }

    /// The caching manager for `R`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Config`] when `R` was not registered as cached.
    pub fn cached<R: Record>(&self) -> DataResult<&CachingRecordManager<StoreRecordManager<B, R>>> {
        self.lookup::<CachingRecordManager<StoreRecordManager<B, R>>>()
    }

    fn lookup<M: 'static>(&self) -> DataResult<&M> {
        self.managers
            .get(&TypeId::of::<M>())
            .and_then(|manager| manager.downcast_ref::<M>())
            .ok_or_else(|| DataError::Config(format!("no record manager registered as {}", type_name::<M>())))
    }

    /// Drops every manager and shuts the backend down.
    ///
    /// # Errors
    ///
    /// Fails when the backend is still shared elsewhere, or when its shutdown fails.
    pub async fn shutdown(self) -> DataResult<()> {
        drop(self.managers);

        match Arc::try_unwrap(self.backend) {
            Ok(backend) => backend.shutdown().await,
            Err(_) => Err(DataError::Store("backend is still shared".to_string())),
        }
    }
}
