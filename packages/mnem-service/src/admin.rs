use serde::{Deserialize, Serialize};

use crate::{Agent, Error, MemoryService, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentView {
	pub id: String,
	pub display_name: Option<String>,
	pub namespace: String,
	pub embedding_model: String,
	pub description: Option<String>,
	pub is_default: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatsRequest {
	pub agent: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatsResponse {
	pub agent: String,
	pub namespace: String,
	pub notes: u64,
	pub vectors: u64,
	/// Vectors minus rows. Non-zero means orphans or missing vectors.
	pub drift: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
	Healthy,
	Unhealthy,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
	pub name: String,
	pub status: HealthStatus,
	pub message: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
	pub status: HealthStatus,
	pub version: String,
	pub components: Vec<ComponentHealth>,
}

impl MemoryService {
	pub fn list_agents(&self) -> Vec<AgentView> {
		let default = self.agent(None).map(|agent| agent.id.clone()).ok();

		self.agents()
			.iter()
			.map(|agent| agent_view(agent, default.as_deref() == Some(agent.id.as_str())))
			.collect()
	}

	pub async fn stats(&self, req: StatsRequest) -> Result<StatsResponse> {
		let agent = self.agent(req.agent.as_deref())?;
		let notes = self
			.stage("metadata_count", async {
				self.store.count(agent.namespace.as_str()).await.map_err(Error::store)
			})
			.await?;
		let vectors = self
			.stage("vector_count", async {
				self.index.count(&agent.namespace).await.map_err(Error::index)
			})
			.await?;
		let drift = vectors as i64 - notes as i64;

		if drift != 0 {
			tracing::warn!(
				namespace = %agent.namespace,
				notes,
				vectors,
				"Vector count and row count disagree."
			);
		}

		Ok(StatsResponse {
			agent: agent.id.clone(),
			namespace: agent.namespace.to_string(),
			notes,
			vectors,
			drift,
		})
	}

	/// Probes every backend. Never fails; unhealthy components are reported in the body.
	pub async fn health(&self) -> HealthResponse {
		let store = self
			.stage("metadata_ping", async { self.store.ping().await.map_err(Error::store) })
			.await;
		let index = self
			.stage("vector_health", async { self.index.health().await.map_err(Error::index) })
			.await;
		let embedding = match self.agent(None) {
			Ok(agent) => self.embed_one(agent, "health check").await.map(|_| ()),
			Err(err) => Err(err),
		};
		let components = vec![
			component("postgres", store),
			component("qdrant", index),
			component("embedding", embedding),
		];
		let status = if components.iter().all(|c| c.status == HealthStatus::Healthy) {
			HealthStatus::Healthy
		} else {
			HealthStatus::Unhealthy
		};

		HealthResponse { status, version: env!("CARGO_PKG_VERSION").to_string(), components }
	}
}

fn agent_view(agent: &Agent, is_default: bool) -> AgentView {
	AgentView {
		id: agent.id.clone(),
		display_name: agent.display_name.clone(),
		namespace: agent.namespace.to_string(),
		embedding_model: agent.embedding_model.clone(),
		description: agent.description.clone(),
		is_default,
	}
}

fn component(name: &str, result: Result<()>) -> ComponentHealth {
	match result {
		Ok(()) => ComponentHealth {
			name: name.to_string(),
			status: HealthStatus::Healthy,
			message: None,
		},
		Err(err) => {
			tracing::warn!(component = name, error = %err, "Health probe failed.");

			ComponentHealth {
				name: name.to_string(),
				status: HealthStatus::Unhealthy,
				message: Some(err.to_string()),
			}
		},
	}
}
