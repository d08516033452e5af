//! Convenient re-exports of commonly used types from docstate.
//!
//! ```ignore
//! use docstate::prelude::*;
//! ```
//!
//! This provides access to record traits, store backends and builders, index declarations,
//! field migrations, record managers and their cache, connection configuration, and the
//! error types.

pub use docstate_core::{
    record::{Record, RecordExt},
    backend::{StoreBackend, StoreBackendBuilder, DocumentStream, ScoredDocument},
    index::{IndexKind, IndexKey, IndexOptions, IndexSpec, IndexSpecBuilder, ExistingIndex},
    migrate::{FieldMigration, RemovedFieldHandler},
    reconcile::{CollectionSchema, ReconcileReport, SchemaReconciler},
    manager::{RecordManager, StoreRecordManager, TextSearchResult},
    cache::CachingRecordManager,
    registry::{ConnectionRegistry, ConnectionSettings, DatabaseConfig},
    database::{DatabaseManager, DatabaseManagerBuilder},
    error::{DataError, DataResult},
};
