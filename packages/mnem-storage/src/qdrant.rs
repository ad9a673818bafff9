use std::collections::HashMap;

use qdrant_client::{
	Payload, Qdrant,
	qdrant::{
		Condition, CountPointsBuilder, CreateCollectionBuilder, DatetimeRange, DeletePointsBuilder,
		Distance, Filter, PointStruct, PointsIdsList, Query, QueryPointsBuilder, Timestamp,
		UpsertPointsBuilder, Value, VectorParamsBuilder, point_id::PointIdOptions,
	},
};
use serde_json::Value as JsonValue;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{VectorFilter, VectorHit, VectorPayload},
};
use mnem_domain::Namespace;

/// Vector Index adapter. Each namespace is one cosine collection named
/// `<collection_prefix><namespace>`.
pub struct QdrantStore {
	pub client: Qdrant,
	pub collection_prefix: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &mnem_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).api_key(cfg.api_key.clone()).build()?;

		Ok(Self {
			client,
			collection_prefix: cfg.collection_prefix.clone(),
			vector_dim: cfg.vector_dim,
		})
	}

	pub fn collection_name(&self, namespace: &Namespace) -> String {
		format!("{}{}", self.collection_prefix, namespace)
	}

	/// Creates the namespace collection when missing. Safe to call concurrently.
	pub async fn ensure_namespace(&self, namespace: &Namespace) -> Result<()> {
		let collection = self.collection_name(namespace);

		if self.client.collection_exists(collection.as_str()).await? {
			return Ok(());
		}

		let builder = CreateCollectionBuilder::new(collection.clone())
			.vectors_config(VectorParamsBuilder::new(self.vector_dim as u64, Distance::Cosine));

		match self.client.create_collection(builder).await {
			Ok(_) => {
				tracing::info!(collection = %collection, "Created vector collection.");

				Ok(())
			},
			// Another writer may have created it in between.
			Err(err) =>
				if self.client.collection_exists(collection.as_str()).await? {
					Ok(())
				} else {
					Err(err.into())
				},
		}
	}

	pub async fn upsert(
		&self,
		namespace: &Namespace,
		vector_id: Uuid,
		vector: Vec<f32>,
		payload: &VectorPayload,
	) -> Result<()> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Vector has {} dimensions; collection expects {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		let point = PointStruct::new(vector_id.to_string(), vector, build_payload(payload)?);
		let upsert =
			UpsertPointsBuilder::new(self.collection_name(namespace), vec![point]).wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(())
	}

	/// Deleting an id that is not present succeeds, and so does deleting from a namespace whose
	/// collection is gone.
	pub async fn delete(&self, namespace: &Namespace, vector_id: Uuid) -> Result<()> {
		let collection = self.collection_name(namespace);

		if !self.client.collection_exists(collection.as_str()).await? {
			tracing::info!(
				collection = %collection,
				"Vector collection is missing. Nothing to delete."
			);

			return Ok(());
		}

		let delete = DeletePointsBuilder::new(collection)
			.points(PointsIdsList { ids: vec![vector_id.to_string().into()] })
			.wait(true);

		match self.client.delete_points(delete).await {
			Ok(_) => Ok(()),
			Err(err) if is_not_found_message(&err.to_string()) => Ok(()),
			Err(err) => Err(err.into()),
		}
	}

	pub async fn search(
		&self,
		namespace: &Namespace,
		vector: Vec<f32>,
		limit: u32,
		score_threshold: Option<f32>,
		filter: &VectorFilter,
	) -> Result<Vec<VectorHit>> {
		let mut search = QueryPointsBuilder::new(self.collection_name(namespace))
			.query(Query::new_nearest(vector))
			.limit(limit as u64);

		if let Some(threshold) = score_threshold {
			search = search.score_threshold(threshold);
		}
		if let Some(filter) = build_filter(filter) {
			search = search.filter(filter);
		}

		let response = self.client.query(search).await?;
		let hits = response
			.result
			.into_iter()
			.filter_map(|point| {
				let vector_id = point.id.as_ref().and_then(point_id_to_uuid)?;

				Some(VectorHit { vector_id, score: point.score })
			})
			.collect();

		Ok(hits)
	}

	/// Number of points in the namespace. A namespace without a collection counts as empty.
	pub async fn count(&self, namespace: &Namespace) -> Result<u64> {
		let collection = self.collection_name(namespace);

		if !self.client.collection_exists(collection.as_str()).await? {
			return Ok(0);
		}

		let response = self.client.count(CountPointsBuilder::new(collection).exact(true)).await?;

		Ok(response.result.map(|result| result.count).unwrap_or(0))
	}

	pub async fn health(&self) -> Result<()> {
		self.client.health_check().await?;

		Ok(())
	}
}

fn build_payload(payload: &VectorPayload) -> Result<Payload> {
	let created_at = payload
		.created_at
		.format(&Rfc3339)
		.map_err(|err| Error::InvalidArgument(format!("Unformattable created_at: {err}.")))?;
	let mut map = HashMap::new();

	map.insert("namespace".to_string(), Value::from(payload.namespace.clone()));
	map.insert("content".to_string(), Value::from(payload.content.clone()));
	map.insert(
		"title".to_string(),
		Value::from(match payload.title.as_ref() {
			Some(title) => JsonValue::String(title.clone()),
			None => JsonValue::Null,
		}),
	);
	map.insert("embedding_model".to_string(), Value::from(payload.embedding_model.clone()));
	map.insert("created_at".to_string(), Value::from(created_at));

	Ok(Payload::from(map))
}

fn build_filter(filter: &VectorFilter) -> Option<Filter> {
	if filter.is_empty() {
		return None;
	}

	let mut must = Vec::new();
	let mut must_not = Vec::new();

	match filter.has_title {
		Some(true) => must_not.push(Condition::is_null("title")),
		Some(false) => must.push(Condition::is_null("title")),
		None => {},
	}

	if filter.created_after.is_some() || filter.created_before.is_some() {
		must.push(Condition::datetime_range(
			"created_at",
			DatetimeRange {
				gte: filter.created_after.as_ref().map(timestamp),
				lte: filter.created_before.as_ref().map(timestamp),
				gt: None,
				lt: None,
			},
		));
	}

	Some(Filter { must, must_not, ..Default::default() })
}

fn timestamp(ts: &OffsetDateTime) -> Timestamp {
	Timestamp { seconds: ts.unix_timestamp(), nanos: ts.nanosecond() as i32 }
}

fn point_id_to_uuid(point_id: &qdrant_client::qdrant::PointId) -> Option<Uuid> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}

/// Matches a missing point and a collection dropped after the existence check.
fn is_not_found_message(message: &str) -> bool {
	let message = message.to_lowercase();
	let not_found = message.contains("not found") || message.contains("404");
	let point_not_found = not_found && message.contains("point");
	let no_point_found = message.contains("no point") && message.contains("found");
	let collection_missing = message.contains("collection")
		&& (not_found || message.contains("doesn't exist") || message.contains("does not exist"));

	point_not_found || no_point_found || collection_missing
}
