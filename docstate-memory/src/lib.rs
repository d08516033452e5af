//! In-memory document storage backend for docstate.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development,
//! tests, and `memory://` connections.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Index bookkeeping** - Lists, creates and drops indexes the way a document database reports them
//! - **Unique enforcement** - Unique indexes reject duplicate keys on creation and on save
//! - **Text search** - Weighted term matching over the collection's text index
//!
//! # Quick Start
//!
//! ```ignore
//! use docstate::{prelude::*, memory::InMemoryStore};
//!
//! let database = DatabaseManager::builder(InMemoryStore::new())
//!     .register_cached::<Country>(
//!         CollectionSchema::new("countries").index(IndexSpec::ascending("code")),
//!     )
//!     .build()
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docstate_memory;

mod fields;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
