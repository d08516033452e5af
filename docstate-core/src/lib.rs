//! Schema reconciliation and cached record management over JSON document stores.
//!
//! This crate is the core of the docstate project and provides:
//!
//! - **Record traits** ([`record`]) - Core traits for records and their BSON conversion
//! - **Store backend abstraction** ([`backend`]) - The document-store operations the layer relies on
//! - **Index model** ([`index`]) - Desired index declarations and live index signatures
//! - **Field migrations** ([`migrate`]) - Directives for removing fields, with optional handlers
//! - **Schema reconciliation** ([`reconcile`]) - Converges live indexes and fields on a declared schema
//! - **Record managers** ([`manager`]) - Typed per-collection access
//! - **Caching** ([`cache`]) - Lazily populated, write-updated mirror of a collection
//! - **Configuration** ([`registry`]) - Connection settings and the named connection registry
//! - **Start-up wiring** ([`database`]) - Reconciles schemas, then builds managers
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use docstate::prelude::*;
//!
//! let database = DatabaseManager::builder(store)
//!     .register_cached::<Country>(
//!         CollectionSchema::new("countries")
//!             .index(IndexSpec::builder().ascending("code").unique(true).build()?),
//!     )
//!     .build()
//!     .await?;
//!
//! let countries = database.cached::<Country>()?.get_all().await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docstate_core;

pub mod backend;
pub mod cache;
pub mod database;
pub mod error;
pub mod index;
pub mod manager;
pub mod migrate;
pub mod reconcile;
pub mod record;
pub mod registry;
