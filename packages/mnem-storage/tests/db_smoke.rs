use uuid::Uuid;

use mnem_config::Postgres;
use mnem_storage::{
	Error,
	db::Db,
	models::{NewNote, NoteUpdate},
	queries,
};
use mnem_testkit::TestDatabase;

fn new_note(namespace: &str, content: &str, vector_id: Uuid) -> NewNote {
	NewNote {
		namespace: namespace.to_string(),
		content: content.to_string(),
		title: None,
		vector_id,
		embedding_model: "m".to_string(),
		created_at: time::OffsetDateTime::now_utc(),
	}
}

async fn bootstrapped(test_db: &TestDatabase) -> Db {
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");
	// Bootstrapping twice is a no-op.
	db.ensure_schema().await.expect("Failed to re-run schema.");

	db
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEM_PG_DSN to run."]
async fn notes_round_trip_through_queries() {
	let Some(base_dsn) = mnem_testkit::env_dsn() else {
		eprintln!("Skipping notes_round_trip_through_queries; set MNEM_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrapped(&test_db).await;
	let (first_vec, second_vec, missing_vec) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
	let first = queries::insert_note(&db, &new_note("notes", "first", first_vec))
		.await
		.expect("Insert failed.");
	let second = queries::insert_note(&db, &new_note("notes", "second", second_vec))
		.await
		.expect("Insert failed.");

	assert!(second.id > first.id);
	assert!(first.updated_at.is_none());

	let ordered =
		queries::get_notes_by_vector_ids(&db, "notes", &[second_vec, missing_vec, first_vec])
			.await
			.expect("Batch fetch failed.");

	assert_eq!(ordered.iter().map(|note| note.id).collect::<Vec<_>>(), vec![second.id, first.id]);

	let other_namespace = queries::get_note(&db, "elsewhere", first.id).await.expect("Get failed.");

	assert!(other_namespace.is_none());

	let recent = queries::list_recent_notes(&db, "notes", 10, 0).await.expect("List failed.");

	assert_eq!(recent.iter().map(|note| note.id).collect::<Vec<_>>(), vec![second.id, first.id]);

	let updated = queries::update_note(
		&db,
		"notes",
		first.id,
		&NoteUpdate {
			content: "first, edited".to_string(),
			title: Some("Edited".to_string()),
			embedding_model: "m".to_string(),
			updated_at: time::OffsetDateTime::now_utc(),
		},
	)
	.await
	.expect("Update failed.")
	.expect("Row must exist.");

	assert_eq!(updated.vector_id, first_vec);
	assert!(updated.updated_at.is_some());
	assert_eq!(queries::count_notes(&db, "notes").await.expect("Count failed."), 2);
	assert!(queries::delete_note(&db, "notes", first.id).await.expect("Delete failed."));
	assert!(!queries::delete_note(&db, "notes", first.id).await.expect("Delete failed."));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MNEM_PG_DSN to run."]
async fn duplicate_vector_id_is_reported() {
	let Some(base_dsn) = mnem_testkit::env_dsn() else {
		eprintln!("Skipping duplicate_vector_id_is_reported; set MNEM_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrapped(&test_db).await;
	let vector_id = Uuid::new_v4();

	queries::insert_note(&db, &new_note("notes", "one", vector_id)).await.expect("Insert failed.");

	let err = queries::insert_note(&db, &new_note("notes", "two", vector_id))
		.await
		.expect_err("Expected duplicate vector id.");

	assert!(matches!(err, Error::DuplicateVectorId(id) if id == vector_id), "Unexpected: {err}");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
