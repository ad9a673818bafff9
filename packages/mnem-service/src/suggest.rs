use serde::{Deserialize, Serialize};

use crate::{Error, MemoryService, Result, notes::MAX_LIST_LIMIT};
use mnem_domain::suggest::{self, SuggestionSource};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SuggestionsRequest {
	pub agent: Option<String>,
	/// How many recent notes to draw from.
	pub limit: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuggestionsResponse {
	pub suggestions: Vec<String>,
}

impl MemoryService {
	/// Candidate queries from the most recent notes. Reads metadata only; a failed read yields no
	/// suggestions instead of an error.
	pub async fn suggest(&self, req: SuggestionsRequest) -> Result<SuggestionsResponse> {
		let agent = self.agent(req.agent.as_deref())?;
		let cfg = &self.cfg.memory.suggestions;
		let limit = req.limit.unwrap_or(cfg.recent_notes).min(MAX_LIST_LIMIT);

		if limit == 0 {
			return Ok(SuggestionsResponse { suggestions: Vec::new() });
		}

		let recent = self
			.stage("metadata_list", async {
				self.store.list(agent.namespace.as_str(), limit, 0).await.map_err(Error::store)
			})
			.await;
		let notes = match recent {
			Ok(notes) => notes,
			Err(err) => {
				tracing::warn!(
					namespace = %agent.namespace,
					error = %err,
					"Suggestion read failed. Returning no suggestions."
				);

				return Ok(SuggestionsResponse { suggestions: Vec::new() });
			},
		};
		let sources = notes
			.iter()
			.map(|note| SuggestionSource { title: note.title.as_deref(), content: &note.content });

		Ok(SuggestionsResponse { suggestions: suggest::derive_suggestions(sources, cfg) })
	}
}
