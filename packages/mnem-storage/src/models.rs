use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Note {
	pub id: i64,
	pub namespace: String,
	pub content: String,
	pub title: Option<String>,
	pub vector_id: Uuid,
	pub embedding_model: String,
	pub created_at: OffsetDateTime,
	pub updated_at: Option<OffsetDateTime>,
}

#[derive(Clone, Debug)]
pub struct NewNote {
	pub namespace: String,
	pub content: String,
	pub title: Option<String>,
	pub vector_id: Uuid,
	pub embedding_model: String,
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub struct NoteUpdate {
	pub content: String,
	pub title: Option<String>,
	pub embedding_model: String,
	pub updated_at: OffsetDateTime,
}

/// Stored next to each vector so index hits can be inspected without a metadata lookup.
#[derive(Clone, Debug)]
pub struct VectorPayload {
	pub namespace: String,
	pub content: String,
	pub title: Option<String>,
	pub embedding_model: String,
	pub created_at: OffsetDateTime,
}

/// Payload conditions applied inside the index, before `limit` and the score threshold.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VectorFilter {
	/// `Some(true)` keeps titled notes only, `Some(false)` untitled ones.
	pub has_title: Option<bool>,
	pub created_after: Option<OffsetDateTime>,
	pub created_before: Option<OffsetDateTime>,
}
impl VectorFilter {
	pub fn is_empty(&self) -> bool {
		self.has_title.is_none() && self.created_after.is_none() && self.created_before.is_none()
	}

	/// Inclusive on both ends of the creation range.
	pub fn matches(&self, payload: &VectorPayload) -> bool {
		if let Some(has_title) = self.has_title
			&& payload.title.is_some() != has_title
		{
			return false;
		}
		if self.created_after.is_some_and(|after| payload.created_at < after) {
			return false;
		}
		if self.created_before.is_some_and(|before| payload.created_at > before) {
			return false;
		}

		true
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VectorHit {
	pub vector_id: Uuid,
	pub score: f32,
}
