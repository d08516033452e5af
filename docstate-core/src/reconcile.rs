//! Schema reconciliation.
//!
//! [`SchemaReconciler`] brings a collection's live indexes and field layout in line with a
//! declared [`CollectionSchema`]:
//!
//! 1. every secondary index whose key signature matches no desired [`IndexSpec`] exactly,
//!    or matches one with different options, is dropped by name;
//! 2. every desired index not already served by a surviving index is then created. A
//!    surviving index may list its keys in another order, and so carry another name, than
//!    the spec it satisfies;
//! 3. every [`FieldMigration`] whose field is still present in at least one document has its
//!    handler run and the field unset.
//!
//! All drops happen before any create, and field removal runs after the indexes converge.
//! The primary-key index is never touched. Running the same schema again changes nothing.
//!
//! A store error aborts the run immediately. Already applied steps stay applied and the
//! error is returned so the caller can decide whether to retry.

use tracing::{debug, info};

use crate::{
    backend::StoreBackend,
    error::DataResult,
    index::{ExistingIndex, IndexSpec},
    migrate::FieldMigration,
};

/// Declared schema of one collection.
#[derive(Debug)]
pub struct CollectionSchema {
    collection: String,
    indexes: Option<Vec<IndexSpec>>,
    migrations: Vec<FieldMigration>,
}

impl CollectionSchema {
    /// A schema that leaves the collection's indexes unmanaged and removes no fields.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            indexes: None,
            migrations: Vec::new(),
        }
    }

    /// Adds a desired index. The first call puts the collection's indexes under management.
    pub fn index(mut self, spec: IndexSpec) -> Self {
        self.indexes
            .get_or_insert_with(Vec::new)
            .push(spec);
        self
    }

    /// Replaces the desired index list. An empty list drops every secondary index.
    pub fn indexes(mut self, specs: Vec<IndexSpec>) -> Self {
        self.indexes = Some(specs);
        self
    }

    pub fn migration(mut self, migration: FieldMigration) -> Self {
        self.migrations.push(migration);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Desired indexes, or `None` when indexes are not managed.
    pub fn desired_indexes(&self) -> Option<&[IndexSpec]> {
        self.indexes.as_deref()
    }

    pub fn migrations(&self) -> &[FieldMigration] {
        &self.migrations
    }
}

/// What a reconciliation run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Names of the indexes that were dropped.
    pub dropped_indexes: Vec<String>,
    /// Number of desired indexes that had to be created.
    pub ensured_indexes: usize,
    /// Fields that were unset from at least one document.
    pub removed_fields: Vec<String>,
}

impl ReconcileReport {
    /// Whether the run dropped an index or removed a field.
    pub fn has_changes(&self) -> bool {
        !self.dropped_indexes.is_empty() || !self.removed_fields.is_empty()
    }
}

/// Selects the existing indexes that must be dropped to converge on `desired`.
///
/// An index survives only if a desired spec matches its key signature exactly and agrees
/// on every option flag. The primary-key index always survives.
pub fn stale_indexes<'a>(existing: &'a [ExistingIndex], desired: &[IndexSpec]) -> Vec<&'a ExistingIndex> {
    existing
        .iter()
        .filter(|index| !index.is_primary())
        .filter(|index| {
            match desired
                .iter()
                .find(|spec| index.matches_keys(spec))
            {
                Some(spec) => !index.matches_options(spec),
                None => true,
            }
        })
        .collect()
}

/// Whether a live index other than the primary key already serves `spec`, keys and options.
pub fn is_satisfied(existing: &[ExistingIndex], spec: &IndexSpec) -> bool {
    existing
        .iter()
        .filter(|index| !index.is_primary())
        .any(|index| index.matches_keys(spec) && index.matches_options(spec))
}

/// Converges collections on their declared schema through a [`StoreBackend`].
///
/// Not designed for concurrent use: run it once per collection at start-up, before traffic.
#[derive(Debug)]
pub struct SchemaReconciler<'a, B: StoreBackend> {
    backend: &'a B,
}

impl<'a, B: StoreBackend> SchemaReconciler<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Reconciles one declared collection schema.
    ///
    /// Index convergence is skipped when the schema does not manage indexes.
    pub async fn reconcile_schema(&self, schema: &CollectionSchema) -> DataResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        if let Some(desired) = schema.desired_indexes() {
            self.converge_indexes(schema.collection(), desired, &mut report)
                .await?;
        }
        self.remove_fields(schema.collection(), schema.migrations(), &mut report)
            .await?;

        Ok(report)
    }

    /// Converges `collection` on the desired indexes, then applies the field migrations.
    pub async fn reconcile(
        &self,
        collection: &str,
        desired: &[IndexSpec],
        migrations: &[FieldMigration],
    ) -> DataResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        self.converge_indexes(collection, desired, &mut report)
            .await?;
        self.remove_fields(collection, migrations, &mut report)
            .await?;

        Ok(report)
    }

    async fn converge_indexes(
        &self,
        collection: &str,
        desired: &[IndexSpec],
        report: &mut ReconcileReport,
    ) -> DataResult<()> {
        let existing = self
            .backend
            .list_indexes(collection)
            .await?;

        let stale = stale_indexes(&existing, desired)
            .into_iter()
            .map(|index| index.name.clone())
            .collect::<Vec<_>>();

        for name in &stale {
            info!(collection, index = %name, "dropping unused index");

            self.backend
                .drop_index(collection, name)
                .await?;
            report
                .dropped_indexes
                .push(name.clone());
        }

        let surviving = existing
            .into_iter()
            .filter(|index| !stale.contains(&index.name))
            .collect::<Vec<_>>();

        for spec in desired {
            if is_satisfied(&surviving, spec) {
                debug!(collection, index = %spec.default_name(), "index already present");
                continue;
            }

            debug!(collection, index = %spec.default_name(), "creating index");

            self.backend
                .create_index(collection, spec)
                .await?;
            report.ensured_indexes += 1;
        }

        Ok(())
    }

    async fn remove_fields(
        &self,
        collection: &str,
        migrations: &[FieldMigration],
        report: &mut ReconcileReport,
    ) -> DataResult<()> {
        for migration in migrations {
            let field = migration.field();
            let count = self
                .backend
                .count_with_field(collection, field)
                .await?;

            if count == 0 {
                continue;
            }

            info!(collection, field, count, "removing field");

            if let Some(handler) = migration.handler() {
                let documents = self
                    .backend
                    .stream_with_field(collection, field)
                    .await?;

                handler
                    .on_remove(collection, field, documents)
                    .await?;
            }

            self.backend
                .unset_field(collection, field)
                .await?;
            report
                .removed_fields
                .push(field.to_string());
        }

        Ok(())
    }
}
