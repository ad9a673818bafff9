use std::sync::Arc;

use mnem_service::MemoryService;
use mnem_storage::{db::Db, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<MemoryService>,
}
impl AppState {
	/// Connects both stores, applies the schema, and creates every agent's collection.
	pub async fn new(config: mnem_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let qdrant = QdrantStore::new(&config.storage.qdrant)?;
		let service = MemoryService::new(config, db, qdrant)?;

		service.ensure_namespaces().await?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: MemoryService) -> Self {
		Self { service: Arc::new(service) }
	}
}
