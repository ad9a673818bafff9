use std::collections::HashMap;

use uuid::Uuid;

use crate::{
	Error, Result,
	db::Db,
	models::{NewNote, Note, NoteUpdate},
};

const NOTE_COLUMNS: &str =
	"id, namespace, content, title, vector_id, embedding_model, created_at, updated_at";

pub async fn insert_note(db: &Db, note: &NewNote) -> Result<Note> {
	let sql = format!(
		"\
INSERT INTO notes (namespace, content, title, vector_id, embedding_model, created_at)
VALUES ($1, $2, $3, $4, $5, $6)
RETURNING {NOTE_COLUMNS}"
	);
	let result = sqlx::query_as::<_, Note>(&sql)
		.bind(note.namespace.as_str())
		.bind(note.content.as_str())
		.bind(note.title.as_deref())
		.bind(note.vector_id)
		.bind(note.embedding_model.as_str())
		.bind(note.created_at)
		.fetch_one(&db.pool)
		.await;

	match result {
		Ok(row) => Ok(row),
		Err(sqlx::Error::Database(err)) if err.is_unique_violation() =>
			Err(Error::DuplicateVectorId(note.vector_id)),
		Err(err) => Err(err.into()),
	}
}

pub async fn get_note(db: &Db, namespace: &str, id: i64) -> Result<Option<Note>> {
	let sql = format!("SELECT {NOTE_COLUMNS} FROM notes WHERE namespace = $1 AND id = $2");
	let row = sqlx::query_as::<_, Note>(&sql)
		.bind(namespace)
		.bind(id)
		.fetch_optional(&db.pool)
		.await?;

	Ok(row)
}

/// Looks up notes by vector id and returns them in the order of `vector_ids`. Ids with no row in
/// `namespace` are skipped.
pub async fn get_notes_by_vector_ids(
	db: &Db,
	namespace: &str,
	vector_ids: &[Uuid],
) -> Result<Vec<Note>> {
	if vector_ids.is_empty() {
		return Ok(Vec::new());
	}

	let sql = format!(
		"SELECT {NOTE_COLUMNS} FROM notes WHERE namespace = $1 AND vector_id = ANY($2)"
	);
	let rows = sqlx::query_as::<_, Note>(&sql)
		.bind(namespace)
		.bind(vector_ids)
		.fetch_all(&db.pool)
		.await?;
	let mut by_vector = rows.into_iter().map(|row| (row.vector_id, row)).collect::<HashMap<_, _>>();

	Ok(vector_ids.iter().filter_map(|id| by_vector.remove(id)).collect())
}

/// Newest first. Ties on `created_at` fall back to the higher id.
pub async fn list_recent_notes(
	db: &Db,
	namespace: &str,
	limit: u32,
	offset: u32,
) -> Result<Vec<Note>> {
	let sql = format!(
		"\
SELECT {NOTE_COLUMNS}
FROM notes
WHERE namespace = $1
ORDER BY created_at DESC, id DESC
LIMIT $2 OFFSET $3"
	);
	let rows = sqlx::query_as::<_, Note>(&sql)
		.bind(namespace)
		.bind(i64::from(limit))
		.bind(i64::from(offset))
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

pub async fn update_note(
	db: &Db,
	namespace: &str,
	id: i64,
	update: &NoteUpdate,
) -> Result<Option<Note>> {
	let sql = format!(
		"\
UPDATE notes
SET
	content = $3,
	title = $4,
	embedding_model = $5,
	updated_at = $6
WHERE namespace = $1 AND id = $2
RETURNING {NOTE_COLUMNS}"
	);
	let row = sqlx::query_as::<_, Note>(&sql)
		.bind(namespace)
		.bind(id)
		.bind(update.content.as_str())
		.bind(update.title.as_deref())
		.bind(update.embedding_model.as_str())
		.bind(update.updated_at)
		.fetch_optional(&db.pool)
		.await?;

	Ok(row)
}

/// Returns whether a row was removed.
pub async fn delete_note(db: &Db, namespace: &str, id: i64) -> Result<bool> {
	let result = sqlx::query("DELETE FROM notes WHERE namespace = $1 AND id = $2")
		.bind(namespace)
		.bind(id)
		.execute(&db.pool)
		.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn count_notes(db: &Db, namespace: &str) -> Result<u64> {
	let count: i64 = sqlx::query_scalar("SELECT count(*) FROM notes WHERE namespace = $1")
		.bind(namespace)
		.fetch_one(&db.pool)
		.await?;

	Ok(count.max(0) as u64)
}
