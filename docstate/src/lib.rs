//! Main docstate crate: schema reconciliation and cached record management over JSON
//! document stores.
//!
//! This crate is the primary entry point. It re-exports the core types from the sub-crates
//! and provides access to the storage backends, plus [`open_memory`] for going from a named
//! connection to a running database.
//!
//! # Features
//!
//! - **Declarative indexes** - Declare the indexes a collection should have; stale ones are dropped, missing ones created
//! - **Field retirement** - Remove fields from stored documents at start-up, optionally handing them to a handler first
//! - **Typed managers** - Per-collection access to records, by identity or in full
//! - **Caching** - A lazily populated mirror of small, read-mostly collections
//!
//! # Quick Start
//!
//! ```ignore
//! use docstate::{prelude::*, memory::InMemoryStore};
//! use bson::Uuid;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Country {
//!     pub id: Uuid,
//!     pub code: String,
//! }
//!
//! impl Record for Country {
//!     fn id(&self) -> &Uuid { &self.id }
//!     fn collection_name() -> &'static str { "countries" }
//! }
//!
//! #[tokio::main]
//! async fn main() -> DataResult<()> {
//!     let database = DatabaseManager::builder(InMemoryStore::new())
//!         .register_cached::<Country>(
//!             CollectionSchema::new("countries")
//!                 .index(IndexSpec::builder().ascending("code").unique(true).build()?)
//!                 .migration(FieldMigration::remove("legacy_name")),
//!         )
//!         .build()
//!         .await?;
//!
//!     let countries = database.cached::<Country>()?;
//!     countries.save(&Country { id: Uuid::new(), code: "NL".into() }).await?;
//!     println!("{:?}", countries.get_all().await?);
//!
//!     database.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development, tests and `memory://` connections
//! - `mongodb` - MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use docstate_core::{backend, cache, database, error, index, manager, migrate, reconcile, record, registry};

// Re-export BSON types for convenience
pub use bson;

use docstate_core::{
    backend::StoreBackendBuilder,
    database::DatabaseManagerBuilder,
    error::{DataError, DataResult},
    registry::ConnectionRegistry,
};
use tracing::info;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docstate_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docstate_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}

/// Resolves a `memory://` connection and starts a database builder on a fresh store.
///
/// # Errors
///
/// Returns [`DataError::Config`] when the connection is missing or does not use the
/// `memory://` scheme.
pub async fn open_memory(
    registry: &ConnectionRegistry,
    connection: &str,
) -> DataResult<DatabaseManagerBuilder<memory::InMemoryStore>> {
    let settings = registry.resolve(connection).await?;

    if !settings.uri.starts_with("memory://") {
        return Err(DataError::Config(format!(
            "connection '{}' is not an in-memory connection",
            settings.name
        )));
    }

    info!(connection = %settings.name, "opening in-memory store");
    let store = memory::InMemoryStoreBuilder.build().await?;

    Ok(DatabaseManagerBuilder::new(std::sync::Arc::new(store)))
}

/// Resolves a `mongodb://` or `mongodb+srv://` connection and starts a database builder on it.
///
/// # Errors
///
/// Returns [`DataError::Config`] when the connection is missing, names no database, or uses
/// another scheme, and [`DataError::Initialization`] when the client cannot be created.
#[cfg(feature = "mongodb")]
pub async fn open_mongodb(
    registry: &ConnectionRegistry,
    connection: &str,
) -> DataResult<DatabaseManagerBuilder<mongodb::MongoDbStore>> {
    let settings = registry.resolve(connection).await?;

    if !settings.uri.starts_with("mongodb") {
        return Err(DataError::Config(format!(
            "connection '{}' is not a mongodb connection",
            settings.name
        )));
    }

    info!(connection = %settings.name, "opening mongodb store");
    let store = mongodb::MongoDbStoreBuilder::from_settings(&settings)?
        .build()
        .await?;

    Ok(DatabaseManagerBuilder::new(std::sync::Arc::new(store)))
}
