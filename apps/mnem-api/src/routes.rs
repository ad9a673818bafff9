use axum::{
	Json, Router,
	extract::{Path, Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use mnem_service::{
	AgentView, CreateNoteRequest, DeleteNoteRequest, DeleteNoteResponse, Error as ServiceError,
	FilteredSearchRequest, FilteredSearchResponse, GetNoteRequest, HealthStatus,
	HybridSearchRequest, HybridSearchResponse, ListNotesRequest, ListNotesResponse, NoteView,
	SearchBatchRequest, SearchBatchResponse, SearchRequest, SearchResponse, SimilarNotesRequest,
	SimilarNotesResponse, StatsRequest, StatsResponse, SuggestionsRequest, SuggestionsResponse,
	UpdateNoteRequest,
};

#[derive(Debug, Default, Deserialize)]
pub struct AgentQuery {
	pub agent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SimilarQuery {
	pub agent: Option<String>,
	pub k: Option<u32>,
}

/// Body of `PATCH /v1/notes/{id}`. Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct NotePatch {
	pub agent: Option<String>,
	pub content: Option<String>,
	pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AgentsResponse {
	pub default_agent: String,
	pub agents: Vec<AgentView>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let status = match &err {
			ServiceError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
			ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
			ServiceError::InconsistentState { .. } => StatusCode::CONFLICT,
			ServiceError::EmbeddingFailed { .. } => StatusCode::BAD_GATEWAY,
			ServiceError::IndexUnavailable { .. } | ServiceError::Storage { .. } =>
				StatusCode::SERVICE_UNAVAILABLE,
			ServiceError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
		};

		if status.is_server_error() {
			tracing::error!(error = %err, error_code = err.error_code(), "Request failed.");
		}

		Self::new(status, err.error_code(), err.to_string())
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/agents", get(agents))
		.route("/v1/notes", post(create_note).get(list_notes))
		.route("/v1/notes/{id}", get(get_note).patch(update_note).delete(delete_note))
		.route("/v1/notes/{id}/similar", get(similar_notes))
		.route("/v1/search", post(search))
		.route("/v1/search/batch", post(search_batch))
		.route("/v1/search/filtered", post(search_filtered))
		.route("/v1/search/hybrid", post(search_hybrid))
		.route("/v1/suggestions", get(suggestions))
		.route("/v1/stats", get(stats))
		.with_state(state)
}

async fn health(State(state): State<AppState>) -> Response {
	let response = state.service.health().await;
	let status = match response.status {
		HealthStatus::Healthy => StatusCode::OK,
		HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
	};

	(status, Json(response)).into_response()
}

async fn agents(State(state): State<AppState>) -> Result<Json<AgentsResponse>, ApiError> {
	let default_agent = state.service.agent(None)?.id.clone();
	let agents = state.service.list_agents();

	Ok(Json(AgentsResponse { default_agent, agents }))
}

async fn create_note(
	State(state): State<AppState>,
	Json(payload): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<NoteView>), ApiError> {
	let note = state.service.create_note(payload).await?;

	Ok((StatusCode::CREATED, Json(note)))
}

async fn list_notes(
	State(state): State<AppState>,
	Query(query): Query<ListNotesRequest>,
) -> Result<Json<ListNotesResponse>, ApiError> {
	let response = state.service.list_notes(query).await?;

	Ok(Json(response))
}

async fn get_note(
	State(state): State<AppState>,
	Path(id): Path<i64>,
	Query(query): Query<AgentQuery>,
) -> Result<Json<NoteView>, ApiError> {
	let note = state.service.get_note(GetNoteRequest { agent: query.agent, id }).await?;

	Ok(Json(note))
}

async fn update_note(
	State(state): State<AppState>,
	Path(id): Path<i64>,
	Json(patch): Json<NotePatch>,
) -> Result<Json<NoteView>, ApiError> {
	let req =
		UpdateNoteRequest { agent: patch.agent, id, content: patch.content, title: patch.title };
	let note = state.service.update_note(req).await?;

	Ok(Json(note))
}

async fn delete_note(
	State(state): State<AppState>,
	Path(id): Path<i64>,
	Query(query): Query<AgentQuery>,
) -> Result<Json<DeleteNoteResponse>, ApiError> {
	let response = state.service.delete_note(DeleteNoteRequest { agent: query.agent, id }).await?;

	Ok(Json(response))
}

async fn similar_notes(
	State(state): State<AppState>,
	Path(id): Path<i64>,
	Query(query): Query<SimilarQuery>,
) -> Result<Json<SimilarNotesResponse>, ApiError> {
	let req = SimilarNotesRequest { agent: query.agent, id, k: query.k };
	let response = state.service.similar_notes(req).await?;

	Ok(Json(response))
}

async fn search(
	State(state): State<AppState>,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let response = state.service.search(payload).await?;

	Ok(Json(response))
}

async fn search_batch(
	State(state): State<AppState>,
	Json(payload): Json<SearchBatchRequest>,
) -> Result<Json<SearchBatchResponse>, ApiError> {
	let response = state.service.search_batch(payload).await?;

	Ok(Json(response))
}

async fn search_filtered(
	State(state): State<AppState>,
	Json(payload): Json<FilteredSearchRequest>,
) -> Result<Json<FilteredSearchResponse>, ApiError> {
	let response = state.service.search_filtered(payload).await?;

	Ok(Json(response))
}

async fn search_hybrid(
	State(state): State<AppState>,
	Json(payload): Json<HybridSearchRequest>,
) -> Result<Json<HybridSearchResponse>, ApiError> {
	let response = state.service.search_hybrid(payload).await?;

	Ok(Json(response))
}

async fn suggestions(
	State(state): State<AppState>,
	Query(query): Query<SuggestionsRequest>,
) -> Result<Json<SuggestionsResponse>, ApiError> {
	let response = state.service.suggest(query).await?;

	Ok(Json(response))
}

async fn stats(
	State(state): State<AppState>,
	Query(query): Query<StatsRequest>,
) -> Result<Json<StatsResponse>, ApiError> {
	let response = state.service.stats(query).await?;

	Ok(Json(response))
}
