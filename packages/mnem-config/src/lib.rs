mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	AgentProfile, Agents, Config, EmbeddingProviderConfig, EmbeddingRetry, Hybrid, Memory,
	Postgres, Providers, Qdrant, Service, Storage, Suggestions,
};

use std::{collections::HashSet, env, fs, path::Path};

const ENV_PREFIX: &str = "env:";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg)?;

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.stage_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "service.stage_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	validate_embedding(cfg)?;
	validate_memory(&cfg.memory)?;
	validate_agents(&cfg.agents)?;

	Ok(())
}

fn validate_embedding(cfg: &Config) -> Result<()> {
	let embedding = &cfg.providers.embedding;

	if embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}
	if embedding.model.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.model must be non-empty.".to_string(),
		});
	}
	if embedding.max_input_chars == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.max_input_chars must be greater than zero.".to_string(),
		});
	}
	if embedding.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if embedding.retry.max_attempts == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.retry.max_attempts must be greater than zero."
				.to_string(),
		});
	}
	if embedding.retry.base_backoff_ms > embedding.retry.max_backoff_ms {
		return Err(Error::Validation {
			message: "providers.embedding.retry.base_backoff_ms must not exceed max_backoff_ms."
				.to_string(),
		});
	}

	for (key, value) in &embedding.default_headers {
		if !value.is_string() {
			return Err(Error::Validation {
				message: format!("providers.embedding.default_headers.{key} must be a string."),
			});
		}
	}

	Ok(())
}

fn validate_memory(memory: &Memory) -> Result<()> {
	if memory.max_content_chars == 0 {
		return Err(Error::Validation {
			message: "memory.max_content_chars must be greater than zero.".to_string(),
		});
	}
	if memory.max_title_chars == 0 {
		return Err(Error::Validation {
			message: "memory.max_title_chars must be greater than zero.".to_string(),
		});
	}
	if memory.max_top_k == 0 {
		return Err(Error::Validation {
			message: "memory.max_top_k must be greater than zero.".to_string(),
		});
	}
	if memory.default_top_k > memory.max_top_k {
		return Err(Error::Validation {
			message: "memory.default_top_k must not exceed memory.max_top_k.".to_string(),
		});
	}
	if memory.max_batch_queries == 0 {
		return Err(Error::Validation {
			message: "memory.max_batch_queries must be greater than zero.".to_string(),
		});
	}

	if let Some(threshold) = memory.score_threshold
		&& !threshold.is_finite()
	{
		return Err(Error::Validation {
			message: "memory.score_threshold must be a finite number.".to_string(),
		});
	}

	let suggestions = &memory.suggestions;

	if suggestions.max_suggestions == 0 || suggestions.max_chars == 0 {
		return Err(Error::Validation {
			message: "memory.suggestions.max_suggestions and max_chars must be greater than zero."
				.to_string(),
		});
	}
	if suggestions.fragment_words == 0 {
		return Err(Error::Validation {
			message: "memory.suggestions.fragment_words must be greater than zero.".to_string(),
		});
	}

	let hybrid = &memory.hybrid;

	if !hybrid_weights_valid(hybrid.semantic_weight, hybrid.text_weight) {
		return Err(Error::Validation {
			message: "memory.hybrid weights must each be within 0..=1 and sum to 1.".to_string(),
		});
	}
	if hybrid.candidate_factor == 0 {
		return Err(Error::Validation {
			message: "memory.hybrid.candidate_factor must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

/// Each weight within `0..=1` and the pair summing to 1 within 0.01.
pub fn hybrid_weights_valid(semantic: f32, text: f32) -> bool {
	let in_range = |weight: f32| weight.is_finite() && (0.0..=1.0).contains(&weight);

	in_range(semantic) && in_range(text) && (semantic + text - 1.0).abs() <= 0.01
}

fn validate_agents(agents: &Agents) -> Result<()> {
	if agents.profiles.is_empty() {
		return Err(Error::Validation {
			message: "agents.profiles must contain at least one profile.".to_string(),
		});
	}

	let mut ids = HashSet::new();

	for profile in &agents.profiles {
		if profile.id.trim().is_empty() {
			return Err(Error::Validation {
				message: "agents.profiles.id must be non-empty.".to_string(),
			});
		}
		if !ids.insert(profile.id.as_str()) {
			return Err(Error::Validation {
				message: format!("agents.profiles.id {:?} is declared more than once.", profile.id),
			});
		}
	}

	if !ids.contains(agents.default.as_str()) {
		return Err(Error::Validation {
			message: format!("agents.default {:?} does not name a profile.", agents.default),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) -> Result<()> {
	cfg.providers.embedding.api_key =
		resolve_env("providers.embedding.api_key", &cfg.providers.embedding.api_key)?;

	if let Some(key) = cfg.storage.qdrant.api_key.as_deref() {
		cfg.storage.qdrant.api_key = Some(resolve_env("storage.qdrant.api_key", key)?);
	}
	if cfg.storage.qdrant.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.storage.qdrant.api_key = None;
	}

	cfg.agents.default = cfg.agents.default.trim().to_lowercase();

	for profile in &mut cfg.agents.profiles {
		profile.id = profile.id.trim().to_lowercase();

		if profile.namespace.as_deref().map(|ns| ns.trim().is_empty()).unwrap_or(false) {
			profile.namespace = None;
		}
		if profile.embedding_model.as_deref().map(|model| model.trim().is_empty()).unwrap_or(false)
		{
			profile.embedding_model = None;
		}
	}

	Ok(())
}

fn resolve_env(field: &str, raw: &str) -> Result<String> {
	let Some(key) = raw.trim().strip_prefix(ENV_PREFIX) else {
		return Ok(raw.to_string());
	};

	env::var(key)
		.map_err(|_| Error::MissingEnv { field: field.to_string(), key: key.to_string() })
}

impl Config {
	pub fn agent(&self, id: &str) -> Option<&AgentProfile> {
		let id = id.trim().to_lowercase();

		self.agents.profiles.iter().find(|profile| profile.id == id)
	}

	pub fn default_agent(&self) -> Option<&AgentProfile> {
		self.agent(&self.agents.default)
	}
}

impl AgentProfile {
	pub fn namespace(&self) -> String {
		self.namespace.clone().unwrap_or_else(|| format!("agent_{}", self.id))
	}

	pub fn embedding_model<'a>(&'a self, embedding: &'a EmbeddingProviderConfig) -> &'a str {
		self.embedding_model.as_deref().unwrap_or(embedding.model.as_str())
	}
}
