use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, MemoryService, NoteView, Result};
use mnem_domain::writegate::{self, NoteInput};
use mnem_storage::models::NewNote;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateNoteRequest {
	pub agent: Option<String>,
	pub content: String,
	pub title: Option<String>,
}

impl MemoryService {
	/// Writes the vector first and the metadata row second. A row that cannot be written gets its
	/// vector removed again before the error is returned. A timed out insert is re-checked first,
	/// since the row may have landed.
	pub async fn create_note(&self, req: CreateNoteRequest) -> Result<NoteView> {
		let title = writegate::normalize_title(req.title.as_deref());
		let input = NoteInput { content: &req.content, title: title.as_deref() };

		writegate::writegate(&input, &self.cfg.memory).map_err(|code| Error::InvalidInput {
			message: format!("{} rejected: {}.", code.field(), code.reason_code()),
		})?;

		let agent = self.agent(req.agent.as_deref())?;
		let namespace = &agent.namespace;

		self.stage("ensure_namespace", async {
			self.index.ensure_namespace(namespace).await.map_err(Error::index)
		})
		.await?;

		let vector_id = Uuid::new_v4();
		let created_at = OffsetDateTime::now_utc();
		let vector = self.embed_one(agent, &req.content).await?;
		let payload = crate::vector_payload(
			namespace,
			&req.content,
			title.as_deref(),
			&agent.embedding_model,
			created_at,
		);
		let upserted = self
			.stage("vector_upsert", async {
				self.index
					.upsert(namespace, vector_id, vector, &payload)
					.await
					.map_err(Error::index)
			})
			.await;

		match upserted {
			Ok(()) => {},
			Err(err @ Error::Timeout { .. }) => {
				// The upsert may still land after the timeout.
				self.compensate_vector(namespace, vector_id).await;

				return Err(err);
			},
			Err(err) => return Err(err),
		}

		let new_note = NewNote {
			namespace: namespace.to_string(),
			content: req.content.clone(),
			title,
			vector_id,
			embedding_model: agent.embedding_model.clone(),
			created_at,
		};
		let inserted = self
			.stage("metadata_insert", async {
				self.store.insert(&new_note).await.map_err(Error::store)
			})
			.await;
		let note = match inserted {
			Ok(note) => note,
			Err(err @ Error::Timeout { .. }) => {
				// A timed out insert may still have committed.
				let vector_ids = [vector_id];
				let recheck = self
					.stage("metadata_recheck", async {
						self.store
							.get_many(namespace.as_str(), &vector_ids)
							.await
							.map_err(Error::store)
					})
					.await;

				match recheck {
					Ok(mut rows) if !rows.is_empty() => {
						tracing::info!(
							namespace = %namespace,
							vector_id = %vector_id,
							"Metadata insert committed after its stage timed out."
						);

						rows.swap_remove(0)
					},
					Ok(_) => {
						self.compensate_vector(namespace, vector_id).await;

						return Err(err);
					},
					Err(recheck_err) => {
						tracing::warn!(
							namespace = %namespace,
							vector_id = %vector_id,
							error = %recheck_err,
							"Metadata insert outcome unknown. Keeping vector."
						);

						return Err(err);
					},
				}
			},
			Err(err) => {
				tracing::warn!(
					namespace = %namespace,
					vector_id = %vector_id,
					error = %err,
					"Metadata insert failed after vector upsert."
				);

				self.compensate_vector(namespace, vector_id).await;

				return Err(err);
			},
		};

		tracing::info!(
			note_id = note.id,
			namespace = %namespace,
			vector_id = %vector_id,
			"Note created."
		);

		Ok(note.into())
	}
}
