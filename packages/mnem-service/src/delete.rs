use serde::{Deserialize, Serialize};

use crate::{Error, MemoryService, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteNoteRequest {
	pub agent: Option<String>,
	pub id: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteNoteResponse {
	pub id: i64,
	pub deleted: bool,
}

impl MemoryService {
	/// Removes the vector, then the row. A note that is already gone reports `deleted: false`.
	pub async fn delete_note(&self, req: DeleteNoteRequest) -> Result<DeleteNoteResponse> {
		let agent = self.agent(req.agent.as_deref())?;
		let namespace = &agent.namespace;
		let note = self
			.stage("metadata_get", async {
				self.store.get(namespace.as_str(), req.id).await.map_err(Error::store)
			})
			.await?;
		let Some(note) = note else {
			return Ok(DeleteNoteResponse { id: req.id, deleted: false });
		};

		self.stage("vector_delete", async {
			self.index.delete(namespace, note.vector_id).await.map_err(Error::index)
		})
		.await?;

		let removed = self
			.stage("metadata_delete", async {
				self.store.delete(namespace.as_str(), note.id).await.map_err(Error::store)
			})
			.await;

		match removed {
			Ok(true) => {
				tracing::info!(note_id = note.id, namespace = %namespace, "Note deleted.");

				Ok(DeleteNoteResponse { id: req.id, deleted: true })
			},
			Ok(false) => {
				tracing::info!(note_id = note.id, "Note was deleted concurrently.");

				Ok(DeleteNoteResponse { id: req.id, deleted: false })
			},
			Err(err) => {
				tracing::error!(
					note_id = note.id,
					vector_id = %note.vector_id,
					error = %err,
					"Metadata delete failed after vector delete."
				);

				Err(Error::InconsistentState {
					message: format!(
						"Vector for note {} was removed but its row was not: {err}",
						note.id
					),
				})
			},
		}
	}
}
