use std::{collections::HashMap, time::Instant};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Agent, Error, MemoryService, NoteView, Result, notes};
use mnem_domain::text;
use mnem_storage::models::{Note, VectorFilter, VectorHit};

const MAX_QUERY_TERMS: usize = 16;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchRequest {
	pub agent: Option<String>,
	pub query: String,
	pub k: Option<u32>,
	/// Overrides `memory.score_threshold` for this request.
	#[serde(default)]
	pub score_threshold: Option<f32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResponse {
	pub query: String,
	pub namespace: String,
	pub results: Vec<SearchResult>,
	pub total_results: usize,
	pub search_time_ms: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResult {
	pub rank: u32,
	pub score: f32,
	pub note: NoteView,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchBatchRequest {
	pub agent: Option<String>,
	pub queries: Vec<String>,
	pub k: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchBatchResponse {
	pub results: Vec<BatchSearchItem>,
	pub search_time_ms: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchSearchItem {
	pub query_index: usize,
	#[serde(flatten)]
	pub response: SearchResponse,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimilarNotesRequest {
	pub agent: Option<String>,
	pub id: i64,
	pub k: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimilarNotesResponse {
	pub id: i64,
	pub namespace: String,
	pub results: Vec<SearchResult>,
	pub total_results: usize,
	pub search_time_ms: f64,
}

/// Conditions on the stored payload. Absent fields do not filter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
	#[serde(default)]
	pub has_title: Option<bool>,
	#[serde(default, with = "crate::time_serde::option")]
	pub created_after: Option<OffsetDateTime>,
	#[serde(default, with = "crate::time_serde::option")]
	pub created_before: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilteredSearchRequest {
	pub agent: Option<String>,
	pub query: String,
	pub k: Option<u32>,
	#[serde(default)]
	pub score_threshold: Option<f32>,
	#[serde(default)]
	pub filters: SearchFilters,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilteredSearchResponse {
	#[serde(flatten)]
	pub response: SearchResponse,
	pub filters_applied: SearchFilters,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HybridSearchRequest {
	pub agent: Option<String>,
	pub query: String,
	pub k: Option<u32>,
	#[serde(default)]
	pub score_threshold: Option<f32>,
	/// Falls back to `memory.hybrid`. Giving one weight implies the other.
	#[serde(default)]
	pub semantic_weight: Option<f32>,
	#[serde(default)]
	pub text_weight: Option<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
	pub semantic: f32,
	pub text: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HybridSearchResult {
	pub rank: u32,
	/// Weighted sum of `semantic_score` and `text_score`.
	pub score: f32,
	pub semantic_score: f32,
	pub text_score: f32,
	pub note: NoteView,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HybridSearchResponse {
	pub query: String,
	pub namespace: String,
	pub results: Vec<HybridSearchResult>,
	pub total_results: usize,
	pub search_time_ms: f64,
	pub weights: HybridWeights,
}

/// Index hits joined with their rows, before ranking.
struct Candidates {
	hits: Vec<VectorHit>,
	notes: HashMap<Uuid, Note>,
}

impl MemoryService {
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		let started = Instant::now();
		let query = validate_query(&req.query)?;
		let k = self.resolve_k(req.k)?;
		let threshold = self.resolve_threshold(req.score_threshold)?;
		let agent = self.agent(req.agent.as_deref())?;
		let candidates =
			self.candidates(agent, query, k, threshold, &VectorFilter::default(), None).await?;
		let results = rank_hits(candidates.hits, candidates.notes, k);

		Ok(SearchResponse {
			query: req.query,
			namespace: agent.namespace.to_string(),
			total_results: results.len(),
			results,
			search_time_ms: elapsed_ms(started),
		})
	}

	/// Semantic search restricted by payload conditions. The conditions run inside the index, so
	/// `k` counts matching notes only.
	pub async fn search_filtered(
		&self,
		req: FilteredSearchRequest,
	) -> Result<FilteredSearchResponse> {
		let started = Instant::now();
		let query = validate_query(&req.query)?;
		let k = self.resolve_k(req.k)?;
		let threshold = self.resolve_threshold(req.score_threshold)?;
		let filter = vector_filter(&req.filters)?;
		let agent = self.agent(req.agent.as_deref())?;
		let candidates = self.candidates(agent, query, k, threshold, &filter, None).await?;
		let results = rank_hits(candidates.hits, candidates.notes, k);

		Ok(FilteredSearchResponse {
			response: SearchResponse {
				query: req.query,
				namespace: agent.namespace.to_string(),
				total_results: results.len(),
				results,
				search_time_ms: elapsed_ms(started),
			},
			filters_applied: req.filters,
		})
	}

	/// Re-ranks a widened semantic candidate set by a weighted blend of the index score and the
	/// share of query terms found in each note.
	pub async fn search_hybrid(&self, req: HybridSearchRequest) -> Result<HybridSearchResponse> {
		let started = Instant::now();
		let query = validate_query(&req.query)?;
		let k = self.resolve_k(req.k)?;
		let threshold = self.resolve_threshold(req.score_threshold)?;
		let weights = self.resolve_weights(req.semantic_weight, req.text_weight)?;
		let agent = self.agent(req.agent.as_deref())?;
		let limit = k.saturating_mul(self.cfg.memory.hybrid.candidate_factor);
		let candidates =
			self.candidates(agent, query, limit, threshold, &VectorFilter::default(), None).await?;
		let terms = text::terms(query, MAX_QUERY_TERMS);
		let results = blend_hits(candidates, &terms, weights, k);

		Ok(HybridSearchResponse {
			query: req.query,
			namespace: agent.namespace.to_string(),
			total_results: results.len(),
			results,
			search_time_ms: elapsed_ms(started),
			weights,
		})
	}

	/// Runs each query through the single-query pipeline. Every query is validated before any of
	/// them touches the provider.
	pub async fn search_batch(&self, req: SearchBatchRequest) -> Result<SearchBatchResponse> {
		let started = Instant::now();
		let max = self.cfg.memory.max_batch_queries as usize;

		if req.queries.is_empty() || req.queries.len() > max {
			return Err(Error::InvalidInput {
				message: format!("queries must contain between 1 and {max} entries."),
			});
		}

		for query in &req.queries {
			validate_query(query)?;
		}

		let k = self.resolve_k(req.k)?;
		let threshold = self.cfg.memory.score_threshold;
		let agent = self.agent(req.agent.as_deref())?;
		let mut results = Vec::with_capacity(req.queries.len());

		for (query_index, query) in req.queries.into_iter().enumerate() {
			let query_started = Instant::now();
			let candidates = self
				.candidates(agent, query.trim(), k, threshold, &VectorFilter::default(), None)
				.await?;
			let hits = rank_hits(candidates.hits, candidates.notes, k);

			results.push(BatchSearchItem {
				query_index,
				response: SearchResponse {
					query,
					namespace: agent.namespace.to_string(),
					total_results: hits.len(),
					results: hits,
					search_time_ms: elapsed_ms(query_started),
				},
			});
		}

		Ok(SearchBatchResponse { results, search_time_ms: elapsed_ms(started) })
	}

	/// Notes closest to an existing note, excluding the note itself.
	pub async fn similar_notes(&self, req: SimilarNotesRequest) -> Result<SimilarNotesResponse> {
		let started = Instant::now();
		let k = self.resolve_k(req.k)?;
		let agent = self.agent(req.agent.as_deref())?;
		let note = self
			.stage("metadata_get", async {
				self.store.get(agent.namespace.as_str(), req.id).await.map_err(Error::store)
			})
			.await?
			.ok_or_else(|| notes::not_found(req.id))?;
		let threshold = self.cfg.memory.score_threshold;
		let candidates = self
			.candidates(
				agent,
				&note.content,
				k,
				threshold,
				&VectorFilter::default(),
				Some(note.vector_id),
			)
			.await?;
		let results = rank_hits(candidates.hits, candidates.notes, k);

		Ok(SimilarNotesResponse {
			id: note.id,
			namespace: agent.namespace.to_string(),
			total_results: results.len(),
			results,
			search_time_ms: elapsed_ms(started),
		})
	}

	fn resolve_k(&self, k: Option<u32>) -> Result<u32> {
		let k = k.unwrap_or(self.cfg.memory.default_top_k);

		if k > self.cfg.memory.max_top_k {
			return Err(Error::InvalidInput {
				message: format!("k must not exceed {}.", self.cfg.memory.max_top_k),
			});
		}

		Ok(k)
	}

	/// A requested threshold must be a cosine score. Absent falls back to the configured one.
	fn resolve_threshold(&self, requested: Option<f32>) -> Result<Option<f32>> {
		match requested {
			Some(threshold) if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) =>
				Err(Error::InvalidInput {
					message: "score_threshold must be a number between -1 and 1.".to_string(),
				}),
			Some(threshold) => Ok(Some(threshold)),
			None => Ok(self.cfg.memory.score_threshold),
		}
	}

	fn resolve_weights(&self, semantic: Option<f32>, text: Option<f32>) -> Result<HybridWeights> {
		let hybrid = &self.cfg.memory.hybrid;
		let (semantic, text) = match (semantic, text) {
			(None, None) => (hybrid.semantic_weight, hybrid.text_weight),
			(Some(semantic), None) => (semantic, 1.0 - semantic),
			(None, Some(text)) => (1.0 - text, text),
			(Some(semantic), Some(text)) => (semantic, text),
		};

		if !mnem_config::hybrid_weights_valid(semantic, text) {
			return Err(Error::InvalidInput {
				message: "semantic_weight and text_weight must each be within 0..=1 and sum to 1."
					.to_string(),
			});
		}

		Ok(HybridWeights { semantic, text })
	}

	/// Embeds `text`, searches the namespace, and joins hits with their rows. `exclude` is dropped
	/// from the hits and does not count against `limit`.
	async fn candidates(
		&self,
		agent: &Agent,
		text: &str,
		limit: u32,
		threshold: Option<f32>,
		filter: &VectorFilter,
		exclude: Option<Uuid>,
	) -> Result<Candidates> {
		if limit == 0 {
			return Ok(Candidates { hits: Vec::new(), notes: HashMap::new() });
		}

		let namespace = &agent.namespace;

		self.stage("ensure_namespace", async {
			self.index.ensure_namespace(namespace).await.map_err(Error::index)
		})
		.await?;

		let vector = self.embed_one(agent, text).await?;
		let limit = if exclude.is_some() { limit.saturating_add(1) } else { limit };
		let hits = self
			.stage("vector_search", async {
				self.index
					.search(namespace, vector, limit, threshold, filter)
					.await
					.map_err(Error::index)
			})
			.await?;
		let hits =
			hits.into_iter().filter(|hit| Some(hit.vector_id) != exclude).collect::<Vec<_>>();
		let vector_ids = hits.iter().map(|hit| hit.vector_id).collect::<Vec<_>>();
		let notes = self
			.stage("metadata_fetch", async {
				self.store.get_many(namespace.as_str(), &vector_ids).await.map_err(Error::store)
			})
			.await?;
		let notes = notes.into_iter().map(|note| (note.vector_id, note)).collect();

		Ok(Candidates { hits, notes })
	}
}

fn vector_filter(filters: &SearchFilters) -> Result<VectorFilter> {
	if let (Some(after), Some(before)) = (filters.created_after, filters.created_before)
		&& after > before
	{
		return Err(Error::InvalidInput {
			message: "created_after must not be later than created_before.".to_string(),
		});
	}

	Ok(VectorFilter {
		has_title: filters.has_title,
		created_after: filters.created_after,
		created_before: filters.created_before,
	})
}

/// Joins hits with their rows, orders by score only, and assigns 1-based ranks. Hits without a
/// row are orphans and are dropped.
fn rank_hits(
	mut hits: Vec<VectorHit>,
	mut notes: HashMap<Uuid, Note>,
	k: u32,
) -> Vec<SearchResult> {
	hits.sort_by(|a, b| b.score.total_cmp(&a.score));

	let mut results = Vec::with_capacity(hits.len().min(k as usize));

	for hit in hits {
		if results.len() >= k as usize {
			break;
		}

		let Some(note) = notes.remove(&hit.vector_id) else {
			tracing::warn!(vector_id = %hit.vector_id, "Dropping orphan vector hit.");

			continue;
		};

		results.push(SearchResult {
			rank: results.len() as u32 + 1,
			score: hit.score,
			note: note.into(),
		});
	}

	results
}

/// Scores every candidate with a row, then orders by the blended score. Ties keep index order.
fn blend_hits(
	candidates: Candidates,
	terms: &[String],
	weights: HybridWeights,
	k: u32,
) -> Vec<HybridSearchResult> {
	let Candidates { hits, mut notes } = candidates;
	let mut scored = Vec::with_capacity(hits.len());

	for hit in hits {
		let Some(note) = notes.remove(&hit.vector_id) else {
			tracing::warn!(vector_id = %hit.vector_id, "Dropping orphan vector hit.");

			continue;
		};
		let searchable = match note.title.as_deref() {
			Some(title) => format!("{title} {}", note.content),
			None => note.content.clone(),
		};
		let text_score = text::lexical_overlap(terms, &searchable);
		let score = weights.semantic * hit.score + weights.text * text_score;

		scored.push((score, hit.score, text_score, note));
	}

	scored.sort_by(|a, b| b.0.total_cmp(&a.0));
	scored.truncate(k as usize);

	scored
		.into_iter()
		.enumerate()
		.map(|(i, (score, semantic_score, text_score, note))| HybridSearchResult {
			rank: i as u32 + 1,
			score,
			semantic_score,
			text_score,
			note: note.into(),
		})
		.collect()
}

fn validate_query(query: &str) -> Result<&str> {
	let trimmed = query.trim();

	if trimmed.is_empty() {
		return Err(Error::InvalidInput { message: "query must be non-empty.".to_string() });
	}

	Ok(trimmed)
}

fn elapsed_ms(started: Instant) -> f64 {
	started.elapsed().as_secs_f64() * 1_000.0
}

#[cfg(test)]
mod tests {
	use super::*;

	fn note(id: i64, vector_id: Uuid) -> Note {
		Note {
			id,
			namespace: "notes".to_string(),
			content: format!("note {id}"),
			title: None,
			vector_id,
			embedding_model: "m".to_string(),
			created_at: OffsetDateTime::UNIX_EPOCH,
			updated_at: None,
		}
	}

	#[test]
	fn ranks_by_score_and_drops_orphans() {
		let (a, b, orphan) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
		let hits = vec![
			VectorHit { vector_id: a, score: 0.2 },
			VectorHit { vector_id: orphan, score: 0.9 },
			VectorHit { vector_id: b, score: 0.7 },
		];
		let notes = HashMap::from([(a, note(1, a)), (b, note(2, b))]);
		let results = rank_hits(hits, notes, 10);

		assert_eq!(results.iter().map(|r| r.note.id).collect::<Vec<_>>(), vec![2, 1]);
		assert_eq!(results.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2]);
	}

	#[test]
	fn equal_scores_keep_index_order_and_respect_k() {
		let ids = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
		let hits = ids.iter().map(|id| VectorHit { vector_id: *id, score: 0.5 }).collect();
		let notes = ids
			.iter()
			.enumerate()
			.map(|(i, id)| (*id, note(i as i64 + 1, *id)))
			.collect::<HashMap<_, _>>();
		let results = rank_hits(hits, notes, 2);

		assert_eq!(results.iter().map(|r| r.note.id).collect::<Vec<_>>(), vec![1, 2]);
	}

	#[test]
	fn blend_lets_term_overlap_lift_a_weaker_vector_hit() {
		let (vague, exact) = (Uuid::new_v4(), Uuid::new_v4());
		let mut exact_note = note(2, exact);

		exact_note.content = "milk delivery window".to_string();

		let candidates = Candidates {
			hits: vec![
				VectorHit { vector_id: vague, score: 0.8 },
				VectorHit { vector_id: exact, score: 0.6 },
			],
			notes: HashMap::from([(vague, note(1, vague)), (exact, exact_note)]),
		};
		let terms = text::terms("milk delivery", MAX_QUERY_TERMS);
		let results =
			blend_hits(candidates, &terms, HybridWeights { semantic: 0.5, text: 0.5 }, 10);

		assert_eq!(results.iter().map(|r| r.note.id).collect::<Vec<_>>(), vec![2, 1]);
		assert_eq!(results[0].text_score, 1.0);
		assert_eq!(results[0].semantic_score, 0.6);
		assert!((results[0].score - 0.8).abs() < 1e-6);
		assert_eq!(results[1].text_score, 0.0);
		assert_eq!(results.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2]);
	}

	#[test]
	fn inverted_creation_range_is_rejected() {
		let filters = SearchFilters {
			has_title: None,
			created_after: Some(OffsetDateTime::UNIX_EPOCH + time::Duration::days(2)),
			created_before: Some(OffsetDateTime::UNIX_EPOCH),
		};

		assert!(vector_filter(&filters).is_err());
		assert!(vector_filter(&SearchFilters::default()).expect("Empty filters.").is_empty());
	}

	#[test]
	fn blank_queries_are_rejected() {
		assert!(validate_query("  \n").is_err());
		assert_eq!(validate_query("  milk ").expect("Expected valid query."), "milk");
	}
}
