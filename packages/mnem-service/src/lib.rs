pub mod admin;
pub mod create;
pub mod delete;
pub mod notes;
pub mod search;
pub mod suggest;
pub mod time_serde;
pub mod update;

mod error;

pub use admin::{
	AgentView, ComponentHealth, HealthResponse, HealthStatus, StatsRequest, StatsResponse,
};
pub use create::CreateNoteRequest;
pub use delete::{DeleteNoteRequest, DeleteNoteResponse};
pub use error::{Error, Result};
pub use notes::{GetNoteRequest, ListNotesRequest, ListNotesResponse, NoteView};
pub use search::{
	BatchSearchItem, FilteredSearchRequest, FilteredSearchResponse, HybridSearchRequest,
	HybridSearchResponse, HybridSearchResult, HybridWeights, SearchBatchRequest,
	SearchBatchResponse, SearchFilters, SearchRequest, SearchResponse, SearchResult,
	SimilarNotesRequest, SimilarNotesResponse,
};
pub use suggest::{SuggestionsRequest, SuggestionsResponse};
pub use update::UpdateNoteRequest;

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc, time::Duration};

use time::OffsetDateTime;
use uuid::Uuid;

use mnem_config::{Config, EmbeddingProviderConfig};
use mnem_domain::Namespace;
use mnem_providers::embedding::EmbeddingClient;
use mnem_storage::{
	db::Db,
	models::{NewNote, Note, NoteUpdate, VectorFilter, VectorHit, VectorPayload},
	qdrant::QdrantStore,
	queries,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		model: &'a str,
		texts: &'a [String],
	) -> BoxFuture<'a, mnem_providers::Result<Vec<Vec<f32>>>>;
}

/// Vector Index seam. Namespaces never leak into each other.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn ensure_namespace<'a>(
		&'a self,
		namespace: &'a Namespace,
	) -> BoxFuture<'a, mnem_storage::Result<()>>;

	fn upsert<'a>(
		&'a self,
		namespace: &'a Namespace,
		vector_id: Uuid,
		vector: Vec<f32>,
		payload: &'a VectorPayload,
	) -> BoxFuture<'a, mnem_storage::Result<()>>;

	fn delete<'a>(
		&'a self,
		namespace: &'a Namespace,
		vector_id: Uuid,
	) -> BoxFuture<'a, mnem_storage::Result<()>>;

	/// Hits failing `filter` are dropped before `limit` applies.
	fn search<'a>(
		&'a self,
		namespace: &'a Namespace,
		vector: Vec<f32>,
		limit: u32,
		score_threshold: Option<f32>,
		filter: &'a VectorFilter,
	) -> BoxFuture<'a, mnem_storage::Result<Vec<VectorHit>>>;

	fn count<'a>(&'a self, namespace: &'a Namespace) -> BoxFuture<'a, mnem_storage::Result<u64>>;

	fn health(&self) -> BoxFuture<'_, mnem_storage::Result<()>>;
}

/// Metadata Store seam. Every lookup is scoped to one namespace.
pub trait NoteStore
where
	Self: Send + Sync,
{
	fn insert<'a>(&'a self, note: &'a NewNote) -> BoxFuture<'a, mnem_storage::Result<Note>>;

	fn get<'a>(
		&'a self,
		namespace: &'a str,
		id: i64,
	) -> BoxFuture<'a, mnem_storage::Result<Option<Note>>>;

	fn get_many<'a>(
		&'a self,
		namespace: &'a str,
		vector_ids: &'a [Uuid],
	) -> BoxFuture<'a, mnem_storage::Result<Vec<Note>>>;

	fn list<'a>(
		&'a self,
		namespace: &'a str,
		limit: u32,
		offset: u32,
	) -> BoxFuture<'a, mnem_storage::Result<Vec<Note>>>;

	fn update<'a>(
		&'a self,
		namespace: &'a str,
		id: i64,
		update: &'a NoteUpdate,
	) -> BoxFuture<'a, mnem_storage::Result<Option<Note>>>;

	fn delete<'a>(&'a self, namespace: &'a str, id: i64)
	-> BoxFuture<'a, mnem_storage::Result<bool>>;

	fn count<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, mnem_storage::Result<u64>>;

	fn ping(&self) -> BoxFuture<'_, mnem_storage::Result<()>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
}

/// An agent profile with its namespace and embedding model resolved.
#[derive(Clone, Debug)]
pub struct Agent {
	pub id: String,
	pub display_name: Option<String>,
	pub namespace: Namespace,
	pub embedding_model: String,
	pub description: Option<String>,
}

pub struct MemoryService {
	pub cfg: Config,
	pub store: Arc<dyn NoteStore>,
	pub index: Arc<dyn VectorIndex>,
	pub providers: Providers,
	agents: Vec<Agent>,
	default_agent: usize,
}

impl EmbeddingProvider for EmbeddingClient {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		model: &'a str,
		texts: &'a [String],
	) -> BoxFuture<'a, mnem_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(EmbeddingClient::embed(self, cfg, model, texts))
	}
}

impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>) -> Self {
		Self { embedding }
	}

	/// The HTTP provider with one client shared by every request.
	pub fn http() -> Result<Self> {
		let client = EmbeddingClient::new()?;

		Ok(Self::new(Arc::new(client)))
	}
}

impl VectorIndex for QdrantStore {
	fn ensure_namespace<'a>(
		&'a self,
		namespace: &'a Namespace,
	) -> BoxFuture<'a, mnem_storage::Result<()>> {
		Box::pin(QdrantStore::ensure_namespace(self, namespace))
	}

	fn upsert<'a>(
		&'a self,
		namespace: &'a Namespace,
		vector_id: Uuid,
		vector: Vec<f32>,
		payload: &'a VectorPayload,
	) -> BoxFuture<'a, mnem_storage::Result<()>> {
		Box::pin(QdrantStore::upsert(self, namespace, vector_id, vector, payload))
	}

	fn delete<'a>(
		&'a self,
		namespace: &'a Namespace,
		vector_id: Uuid,
	) -> BoxFuture<'a, mnem_storage::Result<()>> {
		Box::pin(QdrantStore::delete(self, namespace, vector_id))
	}

	fn search<'a>(
		&'a self,
		namespace: &'a Namespace,
		vector: Vec<f32>,
		limit: u32,
		score_threshold: Option<f32>,
		filter: &'a VectorFilter,
	) -> BoxFuture<'a, mnem_storage::Result<Vec<VectorHit>>> {
		Box::pin(QdrantStore::search(self, namespace, vector, limit, score_threshold, filter))
	}

	fn count<'a>(&'a self, namespace: &'a Namespace) -> BoxFuture<'a, mnem_storage::Result<u64>> {
		Box::pin(QdrantStore::count(self, namespace))
	}

	fn health(&self) -> BoxFuture<'_, mnem_storage::Result<()>> {
		Box::pin(QdrantStore::health(self))
	}
}

impl NoteStore for Db {
	fn insert<'a>(&'a self, note: &'a NewNote) -> BoxFuture<'a, mnem_storage::Result<Note>> {
		Box::pin(queries::insert_note(self, note))
	}

	fn get<'a>(
		&'a self,
		namespace: &'a str,
		id: i64,
	) -> BoxFuture<'a, mnem_storage::Result<Option<Note>>> {
		Box::pin(queries::get_note(self, namespace, id))
	}

	fn get_many<'a>(
		&'a self,
		namespace: &'a str,
		vector_ids: &'a [Uuid],
	) -> BoxFuture<'a, mnem_storage::Result<Vec<Note>>> {
		Box::pin(queries::get_notes_by_vector_ids(self, namespace, vector_ids))
	}

	fn list<'a>(
		&'a self,
		namespace: &'a str,
		limit: u32,
		offset: u32,
	) -> BoxFuture<'a, mnem_storage::Result<Vec<Note>>> {
		Box::pin(queries::list_recent_notes(self, namespace, limit, offset))
	}

	fn update<'a>(
		&'a self,
		namespace: &'a str,
		id: i64,
		update: &'a NoteUpdate,
	) -> BoxFuture<'a, mnem_storage::Result<Option<Note>>> {
		Box::pin(queries::update_note(self, namespace, id, update))
	}

	fn delete<'a>(
		&'a self,
		namespace: &'a str,
		id: i64,
	) -> BoxFuture<'a, mnem_storage::Result<bool>> {
		Box::pin(queries::delete_note(self, namespace, id))
	}

	fn count<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, mnem_storage::Result<u64>> {
		Box::pin(queries::count_notes(self, namespace))
	}

	fn ping(&self) -> BoxFuture<'_, mnem_storage::Result<()>> {
		Box::pin(Db::ping(self))
	}
}

impl MemoryService {
	pub fn new(cfg: Config, db: Db, qdrant: QdrantStore) -> Result<Self> {
		Self::with_parts(cfg, Arc::new(db), Arc::new(qdrant), Providers::http()?)
	}

	pub fn with_parts(
		cfg: Config,
		store: Arc<dyn NoteStore>,
		index: Arc<dyn VectorIndex>,
		providers: Providers,
	) -> Result<Self> {
		let agents = resolve_agents(&cfg)?;
		let default_id = cfg.agents.default.trim().to_ascii_lowercase();
		let default_agent =
			agents.iter().position(|agent| agent.id == default_id).ok_or_else(|| {
				Error::InvalidInput {
					message: format!("Default agent {default_id:?} is not configured."),
				}
			})?;

		Ok(Self { cfg, store, index, providers, agents, default_agent })
	}

	pub fn agents(&self) -> &[Agent] {
		&self.agents
	}

	/// Resolves the agent a request names. An absent or blank id selects the default agent.
	pub fn agent(&self, id: Option<&str>) -> Result<&Agent> {
		let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) else {
			return Ok(&self.agents[self.default_agent]);
		};
		let id = id.to_ascii_lowercase();

		self.agents
			.iter()
			.find(|agent| agent.id == id)
			.ok_or_else(|| Error::InvalidInput { message: format!("Unknown agent {id:?}.") })
	}

	/// Creates the collection of every configured namespace.
	pub async fn ensure_namespaces(&self) -> Result<()> {
		let mut seen = Vec::new();

		for agent in &self.agents {
			if seen.contains(&&agent.namespace) {
				continue;
			}

			self.stage("ensure_namespace", async {
				self.index.ensure_namespace(&agent.namespace).await.map_err(Error::index)
			})
			.await?;

			seen.push(&agent.namespace);
		}

		Ok(())
	}

	pub(crate) fn stage_timeout(&self) -> Duration {
		Duration::from_millis(self.cfg.service.stage_timeout_ms)
	}

	/// Bounds one call into the provider, the index, or the store.
	pub(crate) async fn stage<T, F>(&self, stage: &'static str, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		match tokio::time::timeout(self.stage_timeout(), fut).await {
			Ok(result) => result,
			Err(_) => {
				tracing::warn!(
					stage,
					timeout_ms = self.cfg.service.stage_timeout_ms,
					"Stage timed out."
				);

				Err(Error::Timeout { stage })
			},
		}
	}

	pub(crate) async fn embed_one(&self, agent: &Agent, text: &str) -> Result<Vec<f32>> {
		let texts = [text.to_string()];
		let mut vectors = self
			.stage("embedding", async {
				self.providers
					.embedding
					.embed(&self.cfg.providers.embedding, &agent.embedding_model, &texts)
					.await
					.map_err(Error::from)
			})
			.await?;

		match vectors.pop() {
			Some(vector) if vectors.is_empty() => Ok(vector),
			_ => Err(Error::EmbeddingFailed {
				message: "Embedding provider returned an unexpected number of vectors.".to_string(),
			}),
		}
	}

	/// One attempt to remove a vector whose metadata row does not exist.
	pub(crate) async fn compensate_vector(&self, namespace: &Namespace, vector_id: Uuid) {
		let result = self
			.stage("compensating_delete", async {
				self.index.delete(namespace, vector_id).await.map_err(Error::index)
			})
			.await;

		match result {
			Ok(()) => tracing::info!(
				namespace = %namespace,
				vector_id = %vector_id,
				"Removed vector without metadata row."
			),
			Err(err) => tracing::warn!(
				namespace = %namespace,
				vector_id = %vector_id,
				error = %err,
				"Compensating vector delete failed. Vector is orphaned."
			),
		}
	}
}

fn resolve_agents(cfg: &Config) -> Result<Vec<Agent>> {
	let mut agents = Vec::with_capacity(cfg.agents.profiles.len());
	let mut models: HashMap<Namespace, String> = HashMap::new();

	for profile in &cfg.agents.profiles {
		let namespace = Namespace::parse(&profile.namespace())?;
		let embedding_model = profile.embedding_model(&cfg.providers.embedding).to_string();

		if let Some(existing) = models.get(&namespace)
			&& existing != &embedding_model
		{
			return Err(Error::InvalidInput {
				message: format!(
					"Namespace {namespace} is shared by agents with different embedding models."
				),
			});
		}

		models.insert(namespace.clone(), embedding_model.clone());
		agents.push(Agent {
			id: profile.id.trim().to_ascii_lowercase(),
			display_name: profile.display_name.clone(),
			namespace,
			embedding_model,
			description: profile.description.clone(),
		});
	}

	Ok(agents)
}

pub(crate) fn vector_payload(
	namespace: &Namespace,
	content: &str,
	title: Option<&str>,
	embedding_model: &str,
	created_at: OffsetDateTime,
) -> VectorPayload {
	VectorPayload {
		namespace: namespace.to_string(),
		content: content.to_string(),
		title: title.map(str::to_string),
		embedding_model: embedding_model.to_string(),
		created_at,
	}
}
