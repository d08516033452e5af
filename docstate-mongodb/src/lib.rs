//! MongoDB backend implementation for docstate.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait. Records are
//! stored with their identity as `_id`; index administration, field presence queries and
//! full-text search map directly onto the server's own commands.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docstate = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! A store is built either from a connection string and database name, or from a
//! [`ConnectionSettings`](docstate_core::registry::ConnectionSettings) resolved through the
//! connection registry.
//!
//! # Example
//!
//! ```ignore
//! use docstate::{backend::StoreBackendBuilder, mongodb::MongoDbStoreBuilder};
//!
//! let settings = registry.resolve("catalog").await?;
//! let store = MongoDbStoreBuilder::from_settings(&settings)?
//!     .build()
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docstate_mongodb;

pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
