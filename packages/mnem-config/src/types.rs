use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub memory: Memory,
	pub agents: Agents,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	/// Upper bound for a single stage (embedding call, index call, store call) of a request.
	#[serde(default = "default_stage_timeout_ms")]
	pub stage_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub vector_dim: u32,
	#[serde(default)]
	pub api_key: Option<String>,
	/// Prepended to every namespace to form its collection name.
	#[serde(default)]
	pub collection_prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	/// Literal key, or `env:NAME` to read it from the environment at load time.
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	/// Inputs longer than this many grapheme clusters are cut before embedding.
	#[serde(default = "default_max_input_chars")]
	pub max_input_chars: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
	#[serde(default)]
	pub retry: EmbeddingRetry,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingRetry {
	pub max_attempts: u32,
	pub base_backoff_ms: u64,
	pub max_backoff_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Memory {
	pub max_content_chars: u32,
	pub max_title_chars: u32,
	pub default_top_k: u32,
	pub max_top_k: u32,
	#[serde(default = "default_max_batch_queries")]
	pub max_batch_queries: u32,
	/// Optional floor applied to index scores. Absent means every hit is returned.
	#[serde(default)]
	pub score_threshold: Option<f32>,
	#[serde(default)]
	pub suggestions: Suggestions,
	#[serde(default)]
	pub hybrid: Hybrid,
}

/// Default blend for hybrid search. The two weights sum to 1.
#[derive(Debug, Deserialize)]
pub struct Hybrid {
	pub semantic_weight: f32,
	pub text_weight: f32,
	/// Semantic candidates fetched per requested result before re-ranking.
	pub candidate_factor: u32,
}

#[derive(Debug, Deserialize)]
pub struct Suggestions {
	pub recent_notes: u32,
	pub max_suggestions: u32,
	pub max_chars: u32,
	pub fragment_words: u32,
}

#[derive(Debug, Deserialize)]
pub struct Agents {
	pub default: String,
	pub profiles: Vec<AgentProfile>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AgentProfile {
	pub id: String,
	#[serde(default)]
	pub display_name: Option<String>,
	/// Defaults to `agent_<id>` when absent.
	#[serde(default)]
	pub namespace: Option<String>,
	/// Defaults to `providers.embedding.model` when absent.
	#[serde(default)]
	pub embedding_model: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
}

impl Default for EmbeddingRetry {
	fn default() -> Self {
		Self { max_attempts: 4, base_backoff_ms: 250, max_backoff_ms: 8_000 }
	}
}

impl Default for Hybrid {
	fn default() -> Self {
		Self { semantic_weight: 0.7, text_weight: 0.3, candidate_factor: 2 }
	}
}

impl Default for Suggestions {
	fn default() -> Self {
		Self { recent_notes: 10, max_suggestions: 5, max_chars: 80, fragment_words: 5 }
	}
}

fn default_stage_timeout_ms() -> u64 {
	15_000
}

fn default_max_input_chars() -> u32 {
	8_000
}

fn default_max_batch_queries() -> u32 {
	10
}
