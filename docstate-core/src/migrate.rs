//! Field removal directives.
//!
//! A [`FieldMigration`] names a field that must no longer exist in a collection. Before
//! the field is unset, an optional [`RemovedFieldHandler`] receives every document that
//! still carries it, so the old values can be moved elsewhere.
//!
//! # Example
//!
//! ```ignore
//! use docstate::migrate::FieldMigration;
//!
//! // Simply drop the field.
//! let legacy = FieldMigration::remove("legacy_code");
//!
//! // Copy old values out first.
//! let notes = FieldMigration::with_callback("notes", |documents| {
//!     for document in documents {
//!         archive(document)?;
//!     }
//!     Ok(())
//! });
//! ```

use async_trait::async_trait;
use bson::Document;
use futures::TryStreamExt;
use std::fmt;

use crate::{backend::DocumentStream, error::DataResult};

/// Receives the documents still carrying a field that is about to be removed.
#[async_trait]
pub trait RemovedFieldHandler: Send + Sync {
    /// Called once per reconciliation run, only when at least one document has the field.
    ///
    /// # Errors
    ///
    /// An error aborts the reconciliation before the field is unset.
    async fn on_remove(
        &self,
        collection: &str,
        field: &str,
        documents: DocumentStream,
    ) -> DataResult<()>;
}

/// Adapts a synchronous closure over the collected documents.
struct CallbackHandler<F> {
    callback: F,
}

#[async_trait]
impl<F> RemovedFieldHandler for CallbackHandler<F>
where
    F: Fn(Vec<Document>) -> DataResult<()> + Send + Sync,
{
    async fn on_remove(
        &self,
        _collection: &str,
        _field: &str,
        documents: DocumentStream,
    ) -> DataResult<()> {
        (self.callback)(documents.try_collect::<Vec<_>>().await?)
    }
}

/// A field that must be removed from every document of a collection.
pub struct FieldMigration {
    field: String,
    handler: Option<Box<dyn RemovedFieldHandler>>,
}

impl FieldMigration {
    /// Removes the field without looking at the old values.
    pub fn remove(field: impl Into<String>) -> Self {
        Self { field: field.into(), handler: None }
    }

    /// Removes the field after handing the affected documents to `handler`.
    pub fn with_handler(field: impl Into<String>, handler: impl RemovedFieldHandler + 'static) -> Self {
        Self {
            field: field.into(),
            handler: Some(Box::new(handler)),
        }
    }

    /// Removes the field after handing the affected documents, collected, to `callback`.
    pub fn with_callback<F>(field: impl Into<String>, callback: F) -> Self
    where
        F: Fn(Vec<Document>) -> DataResult<()> + Send + Sync + 'static,
    {
        Self::with_handler(field, CallbackHandler { callback })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn handler(&self) -> Option<&dyn RemovedFieldHandler> {
        self.handler.as_deref()
    }
}

impl fmt::Debug for FieldMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMigration")
            .field("field", &self.field)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}
