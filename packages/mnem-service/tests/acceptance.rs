//! End-to-end runs against real Postgres and Qdrant.

use std::sync::Arc;

use mnem_service::{
	CreateNoteRequest, DeleteNoteRequest, GetNoteRequest, MemoryService, Providers, SearchRequest,
	StatsRequest, SuggestionsRequest,
};
use mnem_storage::{db::Db, qdrant::QdrantStore};
use mnem_testkit::{
	TestDatabase,
	memory::{HashEmbedding, test_config},
};

async fn live_service(test_db: &TestDatabase, qdrant_url: String) -> MemoryService {
	let mut cfg = test_config();

	cfg.storage.postgres.dsn = test_db.dsn().to_string();
	cfg.storage.qdrant.url = qdrant_url;
	cfg.storage.qdrant.collection_prefix = test_db.collection_prefix();
	cfg.service.stage_timeout_ms = 10_000;

	let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let qdrant = QdrantStore::new(&cfg.storage.qdrant).expect("Failed to build Qdrant client.");
	let service = MemoryService::with_parts(
		cfg,
		Arc::new(db),
		Arc::new(qdrant),
		Providers::new(Arc::new(HashEmbedding::default())),
	)
	.expect("Failed to build service.");

	service.ensure_namespaces().await.expect("Failed to ensure namespaces.");

	service
}

fn env_or_skip(test: &str) -> Option<(String, String)> {
	let (Some(dsn), Some(qdrant_url)) = (mnem_testkit::env_dsn(), mnem_testkit::env_qdrant_url())
	else {
		eprintln!("Skipping {test}; set MNEM_PG_DSN and MNEM_QDRANT_URL to run this test.");

		return None;
	};

	Some((dsn, qdrant_url))
}

fn search(query: &str) -> SearchRequest {
	SearchRequest { agent: None, query: query.to_string(), k: Some(5), score_threshold: None }
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set MNEM_PG_DSN and MNEM_QDRANT_URL to run."]
async fn create_search_delete_round_trip() {
	let Some((dsn, qdrant_url)) = env_or_skip("create_search_delete_round_trip") else {
		return;
	};
	let test_db = TestDatabase::new(&dsn).await.expect("Failed to create test database.");
	let service = live_service(&test_db, qdrant_url).await;
	let note = service
		.create_note(CreateNoteRequest {
			agent: None,
			content: "Buy milk tomorrow".to_string(),
			title: None,
		})
		.await
		.expect("Failed to create note.");

	assert_eq!(note.id, 1);

	let found = service.search(search("grocery list")).await.expect("Search failed.");

	assert!(found.results.iter().any(|result| result.note.id == note.id && result.score > 0.0));

	let stats = service.stats(StatsRequest::default()).await.expect("Stats failed.");

	assert_eq!((stats.notes, stats.vectors), (1, 1));

	let deleted = service
		.delete_note(DeleteNoteRequest { agent: None, id: note.id })
		.await
		.expect("Delete failed.");

	assert!(deleted.deleted);

	let again = service
		.delete_note(DeleteNoteRequest { agent: None, id: note.id })
		.await
		.expect("Second delete failed.");

	assert!(!again.deleted);
	assert!(service.get_note(GetNoteRequest { agent: None, id: note.id }).await.is_err());

	let found = service.search(search("grocery list")).await.expect("Search failed.");

	assert!(found.results.iter().all(|result| result.note.id != note.id));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set MNEM_PG_DSN and MNEM_QDRANT_URL to run."]
async fn empty_namespace_searches_and_suggests_cleanly() {
	let Some((dsn, qdrant_url)) = env_or_skip("empty_namespace_searches_and_suggests_cleanly")
	else {
		return;
	};
	let test_db = TestDatabase::new(&dsn).await.expect("Failed to create test database.");
	let service = live_service(&test_db, qdrant_url).await;
	let found = service
		.search(SearchRequest {
			agent: Some("cara".to_string()),
			query: "anything".to_string(),
			k: None,
			score_threshold: None,
		})
		.await
		.expect("Search failed.");
	let suggestions = service
		.suggest(SuggestionsRequest { agent: None, limit: Some(5) })
		.await
		.expect("Suggest failed.");

	assert!(found.results.is_empty());
	assert!(suggestions.suggestions.is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
