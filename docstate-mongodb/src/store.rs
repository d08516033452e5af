use async_trait::async_trait;
use bson::{Bson, Document, Uuid, doc};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    error::{Error as MongoError, ErrorKind},
    options::{ClientOptions, IndexOptions},
};
use tracing::debug;

use docstate_core::{
    backend::{DocumentStream, ScoredDocument, StoreBackend, StoreBackendBuilder},
    error::{DataError, DataResult},
    index::{ExistingIndex, IndexSpec},
    registry::ConnectionSettings,
};

/// Server error code for operations on a collection that does not exist.
const NAMESPACE_NOT_FOUND: i32 = 26;

/// Projected field carrying the text relevance score.
const SCORE_FIELD: &str = "_score";

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    fn prepare_document(&self, id: &Uuid, document: Bson) -> DataResult<Document> {
        let mut document = match document {
            Bson::Document(document) => document,
            _ => return Err(DataError::InvalidDocument("Expected document".into())),
        };
        document.insert("_id", *id);

        Ok(document)
    }

    fn restore_document(&self, mut document: Document) -> Bson {
        document.remove("_id");

        Bson::Document(document)
    }

    fn existing_index(model: IndexModel) -> ExistingIndex {
        let options = model.options.unwrap_or_default();

        ExistingIndex {
            name: options.name.unwrap_or_default(),
            keys: model.keys,
            weights: options.weights,
            unique: options.unique.unwrap_or(false),
            sparse: options.sparse.unwrap_or(false),
        }
    }

    async fn shutdown(self) -> DataResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

fn is_namespace_not_found(error: &MongoError) -> bool {
    matches!(&*error.kind, ErrorKind::Command(command) if command.code == NAMESPACE_NOT_FOUND)
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn list_indexes(&self, collection: &str) -> DataResult<Vec<ExistingIndex>> {
        let cursor = match self
            .get_collection(collection)
            .list_indexes()
            .await
        {
            Ok(cursor) => cursor,
            Err(e) if is_namespace_not_found(&e) => return Ok(vec![]),
            Err(e) => return Err(DataError::Store(e.to_string())),
        };

        Ok(cursor
            .try_collect::<Vec<IndexModel>>()
            .await
            .map_err(|e| DataError::Store(e.to_string()))?
            .into_iter()
            .map(Self::existing_index)
            .collect())
    }

    async fn create_index(&self, collection: &str, spec: &IndexSpec) -> DataResult<()> {
        let options = spec.options();
        let name = spec.default_name();

        debug!(collection, index = %name, "creating index");
        self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                    .keys(spec.key_document())
                    .options(
                        IndexOptions::builder()
                            .name(name)
                            .unique(options.unique)
                            .sparse(options.sparse)
                            .build(),
                    )
                    .build(),
            )
            .await
            .map_err(|e| DataError::Store(e.to_string()))?;

        Ok(())
    }

    async fn drop_index(&self, collection: &str, name: &str) -> DataResult<()> {
        debug!(collection, index = name, "dropping index");
        self.get_collection(collection)
            .drop_index(name)
            .await
            .map_err(|e| DataError::Store(e.to_string()))?;

        Ok(())
    }

    async fn count_with_field(&self, collection: &str, field: &str) -> DataResult<u64> {
        self.get_collection(collection)
            .count_documents(doc! { field: { "$exists": true } })
            .await
            .map_err(|e| DataError::Store(e.to_string()))
    }

    async fn stream_with_field(&self, collection: &str, field: &str) -> DataResult<DocumentStream> {
        Ok(self
            .get_collection(collection)
            .find(doc! { field: { "$exists": true } })
            .await
            .map_err(|e| DataError::Store(e.to_string()))?
            .map_err(|e| DataError::Store(e.to_string()))
            .boxed())
    }

    async fn unset_field(&self, collection: &str, field: &str) -> DataResult<()> {
        self.get_collection(collection)
            .update_many(
                doc! { field: { "$exists": true } },
                doc! { "$unset": { field: "" } },
            )
            .await
            .map_err(|e| DataError::Store(e.to_string()))?;

        Ok(())
    }

    async fn find_documents(&self, collection: &str) -> DataResult<Vec<Bson>> {
        Ok(self
            .get_collection(collection)
            .find(doc! {})
            .await
            .map_err(|e| DataError::Store(e.to_string()))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| DataError::Store(e.to_string()))?
            .into_iter()
            .map(|document| self.restore_document(document))
            .collect())
    }

    async fn get_document(&self, collection: &str, id: Uuid) -> DataResult<Option<Bson>> {
        Ok(self
            .get_collection(collection)
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| DataError::Store(e.to_string()))?
            .map(|document| self.restore_document(document)))
    }

    async fn save_document(&self, collection: &str, id: Uuid, document: Bson) -> DataResult<bool> {
        let result = self
            .get_collection(collection)
            .replace_one(doc! { "_id": id }, self.prepare_document(&id, document)?)
            .upsert(true)
            .await
            .map_err(|e| DataError::Store(e.to_string()))?;

        Ok(result.upserted_id.is_some())
    }

    async fn delete_document(&self, collection: &str, id: Uuid) -> DataResult<()> {
        self.get_collection(collection)
            .delete_one(doc! { "_id": id })
            .await
            .map_err(|e| DataError::Store(e.to_string()))?;

        Ok(())
    }

    async fn text_search(&self, collection: &str, text: &str) -> DataResult<Vec<ScoredDocument>> {
        Ok(self
            .get_collection(collection)
            .find(doc! { "$text": { "$search": text } })
            .projection(doc! { SCORE_FIELD: { "$meta": "textScore" } })
            .sort(doc! { SCORE_FIELD: { "$meta": "textScore" } })
            .await
            .map_err(|e| DataError::Store(e.to_string()))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| DataError::Store(e.to_string()))?
            .into_iter()
            .map(|mut document| {
                let score = document
                    .remove(SCORE_FIELD)
                    .and_then(|score| score.as_f64())
                    .unwrap_or_default();

                ScoredDocument {
                    score,
                    document: self.restore_document(document),
                }
            })
            .collect())
    }

    async fn shutdown(self) -> DataResult<()> {
        self.shutdown().await
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }

    /// Builder for a registered connection. The database is the explicit one or the URI path.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Config`] when the settings name no database.
    pub fn from_settings(settings: &ConnectionSettings) -> DataResult<Self> {
        Ok(Self::new(&settings.uri, &settings.database_name()?))
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DataResult<Self::Backend> {
        debug!(database = %self.database, "connecting to mongodb");

        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| DataError::Initialization(e.to_string()))?,
            )
            .map_err(|e| DataError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
