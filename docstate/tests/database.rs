mod common;

use bson::{Uuid, doc};
use common::{Article, Country, RecordingStore, init_tracing};
use docstate::prelude::*;

async fn catalog(store: RecordingStore) -> DatabaseManager<RecordingStore> {
    DatabaseManager::builder(store)
        .register_cached::<Country>(
            CollectionSchema::new("countries")
                .index(IndexSpec::builder().ascending("code").unique(true).build().unwrap())
                .migration(FieldMigration::remove("legacy_name")),
        )
        .register_with::<Article>(
            CollectionSchema::new("articles").index(
                IndexSpec::builder()
                    .text("title")
                    .text("body")
                    .build()
                    .unwrap(),
            ),
        )
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn build_reconciles_before_managers_serve() {
    init_tracing();
    let store = RecordingStore::new();
    let nl = Uuid::new();
    store
        .inner
        .seed(
            "countries",
            vec![(nl, doc! { "id": nl, "code": "NL", "name": "Netherlands", "legacy_name": "Holland" })],
        )
        .await;

    let database = catalog(store.clone()).await;

    let reports = database.reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].0, "countries");
    assert_eq!(reports[0].1.removed_fields, vec!["legacy_name"]);
    assert_eq!(reports[1].1.ensured_indexes, 1);

    let countries = database.cached::<Country>().unwrap();
    let country = countries.get_by_id(&nl).await.unwrap();
    assert_eq!(country.code, "NL");
    assert_eq!(store.count_with_field("countries", "legacy_name").await.unwrap(), 0);
}

#[tokio::test]
async fn cached_manager_serves_writes_without_reloading() {
    let store = RecordingStore::new();
    let database = catalog(store.clone()).await;
    let countries = database.cached::<Country>().unwrap();

    assert!(countries.get_all().await.unwrap().is_empty());
    assert_eq!(store.finds(), 1);

    let mut be = Country::new("BE", "Belgium");
    assert!(countries.save(&be).await.unwrap());
    be.name = "Belgique".into();
    assert!(!countries.save(&be).await.unwrap());

    assert_eq!(countries.get_by_id(&be.id).await.unwrap(), be);
    assert_eq!(store.finds(), 1);

    countries.delete_by_id(&be.id).await.unwrap();
    assert!(countries
        .get_by_id(&be.id)
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn unique_violation_leaves_cache_untouched() {
    let store = RecordingStore::new();
    let database = catalog(store.clone()).await;
    let countries = database.cached::<Country>().unwrap();

    countries.save(&Country::new("FR", "France")).await.unwrap();
    let duplicate = Country::new("FR", "Francia");

    assert!(matches!(countries.save(&duplicate).await, Err(DataError::Store(_))));
    assert!(countries
        .get_by_id(&duplicate.id)
        .await
        .unwrap_err()
        .is_not_found());
    assert_eq!(countries.get_all().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_reads_load_once() {
    let store = RecordingStore::new();
    for code in ["DE", "AT", "CH"] {
        let country = Country::new(code, code);
        store
            .save_document("countries", country.id, country.to_bson().unwrap())
            .await
            .unwrap();
    }
    let database = std::sync::Arc::new(catalog(store.clone()).await);

    let tasks = (0..8)
        .map(|_| {
            let database = database.clone();
            tokio::spawn(async move {
                database
                    .cached::<Country>()
                    .unwrap()
                    .get_all()
                    .await
                    .unwrap()
                    .len()
            })
        })
        .collect::<Vec<_>>();

    for task in tasks {
        assert_eq!(task.await.unwrap(), 3);
    }
    assert_eq!(store.finds(), 1);
}

#[tokio::test]
async fn records_reaches_plain_and_cached_registrations() {
    let store = RecordingStore::new();
    let database = catalog(store.clone()).await;

    let articles = database.records::<Article>().unwrap();
    assert_eq!(articles.collection_name(), "articles");
    assert!(database.cached::<Article>().is_err());

    let countries = database.records::<Country>().unwrap();
    let pt = Country::new("PT", "Portugal");
    countries.save(&pt).await.unwrap();
    assert_eq!(countries.get_by_id(&pt.id).await.unwrap(), pt);
}

#[tokio::test]
async fn text_search_ranks_records() {
    let store = RecordingStore::new();
    let database = catalog(store).await;
    let articles = database.records::<Article>().unwrap();

    for (title, body) in [
        ("Tulips", "Spring tulips in bloom"),
        ("Windmills", "Windmills and more windmills"),
        ("Cheese", "Markets and windmills"),
    ] {
        articles
            .save(&Article {
                id: Uuid::new(),
                title: title.into(),
                body: body.into(),
            })
            .await
            .unwrap();
    }

    let results = articles.text_search("windmills").await.unwrap();
    let titles = results
        .iter()
        .map(|result| result.record.title.as_str())
        .collect::<Vec<_>>();

    assert_eq!(titles, vec!["Windmills", "Cheese"]);
    assert!(results[0].score > results[1].score);
}

#[tokio::test]
async fn duplicate_registration_is_a_config_error() {
    let result = DatabaseManager::builder(RecordingStore::new())
        .register::<Country>()
        .register_with::<Country>(CollectionSchema::new("countries_v2"))
        .build()
        .await;

    assert!(matches!(result, Err(DataError::Config(_))));
}

#[tokio::test]
async fn unregistered_record_type_is_a_config_error() {
    let database = DatabaseManager::builder(RecordingStore::new())
        .register::<Country>()
        .build()
        .await
        .unwrap();

    assert!(matches!(database.records::<Article>(), Err(DataError::Config(_))));
    database.shutdown().await.unwrap();
}

#[tokio::test]
async fn memory_connection_opens_from_config() {
    init_tracing();
    let registry = ConnectionRegistry::from_config(
        DatabaseConfig::from_json(
            r#"{ "connections": [
                { "name": "catalog", "uri": "memory://catalog" },
                { "name": "archive", "uri": "mongodb://localhost:27017/archive" }
            ] }"#,
        )
        .unwrap(),
    );

    let database = docstate::open_memory(&registry, "catalog")
        .await
        .unwrap()
        .register::<Country>()
        .build()
        .await
        .unwrap();
    let es = Country::new("ES", "Spain");
    database
        .records::<Country>()
        .unwrap()
        .save(&es)
        .await
        .unwrap();
    assert_eq!(database.store().count_with_field("countries", "code").await.unwrap(), 1);

    assert!(matches!(
        docstate::open_memory(&registry, "archive").await,
        Err(DataError::Config(_))
    ));
    assert!(matches!(
        docstate::open_memory(&registry, "missing").await,
        Err(DataError::Config(_))
    ));
}
