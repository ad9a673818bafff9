use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use mnem_config::Qdrant;
use mnem_domain::Namespace;
use mnem_storage::{
	models::{VectorFilter, VectorPayload},
	qdrant::QdrantStore,
};
use mnem_testkit::TestDatabase;

fn payload(content: &str) -> VectorPayload {
	VectorPayload {
		namespace: "notes".to_string(),
		content: content.to_string(),
		title: None,
		embedding_model: "m".to_string(),
		created_at: OffsetDateTime::now_utc(),
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set MNEM_PG_DSN and MNEM_QDRANT_URL to run."]
async fn namespace_lifecycle() {
	let (Some(dsn), Some(url)) = (mnem_testkit::env_dsn(), mnem_testkit::env_qdrant_url()) else {
		eprintln!("Skipping namespace_lifecycle; set MNEM_PG_DSN and MNEM_QDRANT_URL to run.");

		return;
	};
	let test_db = TestDatabase::new(&dsn).await.expect("Failed to create test database.");
	let cfg = Qdrant {
		url,
		vector_dim: 3,
		api_key: None,
		collection_prefix: test_db.collection_prefix(),
	};
	let store = QdrantStore::new(&cfg).expect("Failed to build Qdrant client.");
	let namespace = Namespace::parse("notes").expect("Valid namespace.");

	assert_eq!(store.count(&namespace).await.expect("Count failed."), 0);

	store.ensure_namespace(&namespace).await.expect("Failed to create namespace.");
	store.ensure_namespace(&namespace).await.expect("Second ensure must be a no-op.");

	let (near, far) = (Uuid::new_v4(), Uuid::new_v4());

	let titled = VectorPayload { title: Some("Far".to_string()), ..payload("far") };

	store.upsert(&namespace, near, vec![1.0, 0.0, 0.0], &payload("near")).await.expect("Upsert.");
	store.upsert(&namespace, far, vec![0.0, 1.0, 0.0], &titled).await.expect("Upsert.");

	let query = vec![0.9, 0.1, 0.0];
	let hits = store
		.search(&namespace, query.clone(), 10, None, &VectorFilter::default())
		.await
		.expect("Search failed.");

	assert_eq!(hits.iter().map(|hit| hit.vector_id).collect::<Vec<_>>(), vec![near, far]);
	assert!(hits[0].score > hits[1].score);

	let only_titled = VectorFilter { has_title: Some(true), ..Default::default() };
	let hits = store
		.search(&namespace, query.clone(), 10, None, &only_titled)
		.await
		.expect("Filtered search failed.");

	assert_eq!(hits.iter().map(|hit| hit.vector_id).collect::<Vec<_>>(), vec![far]);

	let future = VectorFilter {
		created_after: Some(OffsetDateTime::now_utc() + Duration::hours(1)),
		..Default::default()
	};
	let hits =
		store.search(&namespace, query, 10, None, &future).await.expect("Filtered search failed.");

	assert!(hits.is_empty());

	let wrong_dim = store.upsert(&namespace, Uuid::new_v4(), vec![1.0], &payload("x")).await;

	assert!(wrong_dim.is_err());

	store.delete(&namespace, near).await.expect("Delete failed.");
	store.delete(&namespace, near).await.expect("Deleting a missing id must succeed.");

	assert_eq!(store.count(&namespace).await.expect("Count failed."), 1);

	let dropped = Namespace::parse("dropped").expect("Valid namespace.");

	store.delete(&dropped, far).await.expect("Deleting from a missing collection must succeed.");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
