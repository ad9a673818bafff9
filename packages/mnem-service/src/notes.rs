use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, MemoryService, Result};
use mnem_storage::models::Note;

pub const DEFAULT_LIST_LIMIT: u32 = 20;
pub const MAX_LIST_LIMIT: u32 = 100;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NoteView {
	pub id: i64,
	pub namespace: String,
	pub content: String,
	pub title: Option<String>,
	pub vector_id: Uuid,
	pub embedding_model: String,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde::option")]
	pub updated_at: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetNoteRequest {
	pub agent: Option<String>,
	pub id: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ListNotesRequest {
	pub agent: Option<String>,
	pub offset: Option<u32>,
	pub limit: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListNotesResponse {
	pub namespace: String,
	pub offset: u32,
	pub limit: u32,
	pub items: Vec<NoteView>,
}

impl From<Note> for NoteView {
	fn from(note: Note) -> Self {
		Self {
			id: note.id,
			namespace: note.namespace,
			content: note.content,
			title: note.title,
			vector_id: note.vector_id,
			embedding_model: note.embedding_model,
			created_at: note.created_at,
			updated_at: note.updated_at,
		}
	}
}

impl MemoryService {
	pub async fn get_note(&self, req: GetNoteRequest) -> Result<NoteView> {
		let agent = self.agent(req.agent.as_deref())?;
		let note = self
			.stage("metadata_get", async {
				self.store.get(agent.namespace.as_str(), req.id).await.map_err(Error::store)
			})
			.await?
			.ok_or_else(|| not_found(req.id))?;

		Ok(note.into())
	}

	pub async fn list_notes(&self, req: ListNotesRequest) -> Result<ListNotesResponse> {
		let agent = self.agent(req.agent.as_deref())?;
		let offset = req.offset.unwrap_or(0);
		let limit = req.limit.unwrap_or(DEFAULT_LIST_LIMIT);

		if limit == 0 || limit > MAX_LIST_LIMIT {
			return Err(Error::InvalidInput {
				message: format!("limit must be between 1 and {MAX_LIST_LIMIT}."),
			});
		}

		let notes = self
			.stage("metadata_list", async {
				self.store.list(agent.namespace.as_str(), limit, offset).await.map_err(Error::store)
			})
			.await?;

		Ok(ListNotesResponse {
			namespace: agent.namespace.to_string(),
			offset,
			limit,
			items: notes.into_iter().map(NoteView::from).collect(),
		})
	}
}

pub(crate) fn not_found(id: i64) -> Error {
	Error::NotFound { message: format!("Note {id} does not exist.") }
}
