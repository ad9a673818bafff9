use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Agent, Error, MemoryService, NoteView, Result, notes};
use mnem_domain::writegate::{self, NoteInput};
use mnem_storage::models::{Note, NoteUpdate};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateNoteRequest {
	pub agent: Option<String>,
	pub id: i64,
	pub content: Option<String>,
	/// A blank title clears it.
	pub title: Option<String>,
}

impl MemoryService {
	/// Re-embeds the edited note and overwrites its vector under the same vector id, then updates
	/// the row.
	pub async fn update_note(&self, req: UpdateNoteRequest) -> Result<NoteView> {
		if req.content.is_none() && req.title.is_none() {
			return Err(Error::InvalidInput {
				message: "At least one of content or title is required.".to_string(),
			});
		}

		let agent = self.agent(req.agent.as_deref())?;
		let namespace = &agent.namespace;
		let current = self
			.stage("metadata_get", async {
				self.store.get(namespace.as_str(), req.id).await.map_err(Error::store)
			})
			.await?
			.ok_or_else(|| notes::not_found(req.id))?;
		let content = req.content.clone().unwrap_or_else(|| current.content.clone());
		let title = match req.title.as_deref() {
			Some(title) => writegate::normalize_title(Some(title)),
			None => current.title.clone(),
		};
		let input = NoteInput { content: &content, title: title.as_deref() };

		writegate::writegate(&input, &self.cfg.memory).map_err(|code| Error::InvalidInput {
			message: format!("{} rejected: {}.", code.field(), code.reason_code()),
		})?;

		match self.write_vector(agent, &current, &content, title.as_deref()).await {
			Ok(()) => {},
			Err(err @ Error::Timeout { .. }) => {
				// The rewrite may still land after the timeout.
				self.restore_vector(agent, &current).await;

				return Err(err);
			},
			Err(err) => return Err(err),
		}

		let update = NoteUpdate {
			content,
			title,
			embedding_model: agent.embedding_model.clone(),
			updated_at: OffsetDateTime::now_utc(),
		};
		let updated = self
			.stage("metadata_update", async {
				self.store
					.update(namespace.as_str(), current.id, &update)
					.await
					.map_err(Error::store)
			})
			.await;

		match updated {
			Ok(Some(note)) => {
				tracing::info!(note_id = note.id, namespace = %namespace, "Note updated.");

				Ok(note.into())
			},
			Ok(None) => {
				// Deleted while the vector was rewritten.
				self.compensate_vector(namespace, current.vector_id).await;

				Err(notes::not_found(req.id))
			},
			Err(err) => {
				tracing::warn!(
					note_id = current.id,
					error = %err,
					"Metadata update failed after vector rewrite. Restoring previous vector."
				);

				self.restore_vector(agent, &current).await;

				Err(err)
			},
		}
	}

	/// One attempt to put the vector of the unchanged row back.
	async fn restore_vector(&self, agent: &Agent, current: &Note) {
		let restored =
			self.write_vector(agent, current, &current.content, current.title.as_deref()).await;

		if let Err(err) = restored {
			tracing::warn!(
				note_id = current.id,
				vector_id = %current.vector_id,
				error = %err,
				"Previous vector could not be restored."
			);
		}
	}

	async fn write_vector(
		&self,
		agent: &Agent,
		note: &Note,
		content: &str,
		title: Option<&str>,
	) -> Result<()> {
		let vector = self.embed_one(agent, content).await?;
		let payload = crate::vector_payload(
			&agent.namespace,
			content,
			title,
			&agent.embedding_model,
			note.created_at,
		);

		self.stage("vector_upsert", async {
			self.index
				.upsert(&agent.namespace, note.vector_id, vector, &payload)
				.await
				.map_err(Error::index)
		})
		.await
	}
}
