use std::sync::{Arc, atomic::Ordering};

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::Value;
use tower::util::ServiceExt;

use mnem_api::{routes, state::AppState};
use mnem_testkit::memory::{Harness, MemoryIndex};

fn app() -> (Router, Arc<MemoryIndex>) {
	let Harness { service, index, .. } = Harness::new().expect("Failed to build harness.");
	let app = routes::router(AppState::from_service(service));

	(app, index)
}

async fn send(
	app: &Router,
	method: &str,
	uri: &str,
	payload: Option<Value>,
) -> (StatusCode, Value) {
	let builder = Request::builder().method(method).uri(uri);
	let request = match payload {
		Some(payload) => builder
			.header("content-type", "application/json")
			.body(Body::from(payload.to_string())),
		None => builder.body(Body::empty()),
	}
	.expect("Failed to build request.");
	let response = app.clone().oneshot(request).await.expect("Failed to call router.");
	let status = response.status();
	let body = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let json = if body.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&body).expect("Failed to parse response.")
	};

	(status, json)
}

async fn create(app: &Router, content: &str) -> i64 {
	let (status, json) =
		send(app, "POST", "/v1/notes", Some(serde_json::json!({ "content": content }))).await;

	assert_eq!(status, StatusCode::CREATED, "Unexpected body: {json}");

	json["id"].as_i64().expect("Created note must carry an id.")
}

#[tokio::test]
async fn health_reports_every_component() {
	let (app, _) = app();
	let (status, json) = send(&app, "GET", "/health", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["status"], "healthy");
	assert_eq!(json["components"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn note_lifecycle_over_http() {
	let (app, _) = app();
	let id = create(&app, "Buy milk tomorrow").await;
	let (status, json) = send(&app, "GET", &format!("/v1/notes/{id}"), None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["content"], "Buy milk tomorrow");
	assert_eq!(json["namespace"], "notes");

	let (status, json) = send(
		&app,
		"POST",
		"/v1/search",
		Some(serde_json::json!({ "query": "grocery list", "k": 5 })),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["results"][0]["note"]["id"], id);

	let (status, json) = send(&app, "DELETE", &format!("/v1/notes/{id}"), None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["deleted"], true);

	let (status, json) = send(&app, "DELETE", &format!("/v1/notes/{id}"), None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["deleted"], false);

	let (status, json) = send(&app, "GET", &format!("/v1/notes/{id}"), None).await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(json["error_code"], "NOT_FOUND");
}

#[tokio::test]
async fn empty_content_is_a_bad_request() {
	let (app, _) = app();
	let (status, json) =
		send(&app, "POST", "/v1/notes", Some(serde_json::json!({ "content": "   " }))).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "INVALID_INPUT");
}

#[tokio::test]
async fn unknown_agent_is_a_bad_request() {
	let (app, _) = app();
	let (status, json) = send(&app, "GET", "/v1/notes?agent=nobody", None).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "INVALID_INPUT");
}

#[tokio::test]
async fn index_outage_maps_to_service_unavailable() {
	let (app, index) = app();

	create(&app, "Quarterly tax forms").await;
	index.fail_search.store(true, Ordering::SeqCst);

	let (status, json) =
		send(&app, "POST", "/v1/search", Some(serde_json::json!({ "query": "tax" }))).await;

	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(json["error_code"], "INDEX_UNAVAILABLE");
}

#[tokio::test]
async fn patch_rewrites_content() {
	let (app, _) = app();
	let id = create(&app, "Call the plumber").await;
	let (status, json) = send(
		&app,
		"PATCH",
		&format!("/v1/notes/{id}"),
		Some(serde_json::json!({ "content": "Call the electrician", "title": "Chores" })),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["content"], "Call the electrician");
	assert_eq!(json["title"], "Chores");
	assert!(!json["updated_at"].is_null());
}

#[tokio::test]
async fn agents_stats_and_suggestions() {
	let (app, _) = app();
	let (status, json) = send(&app, "GET", "/v1/suggestions", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["suggestions"], serde_json::json!([]));

	let (status, json) = send(&app, "GET", "/v1/agents", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["default_agent"], "default");
	assert_eq!(json["agents"].as_array().map(Vec::len), Some(2));

	create(&app, "Water the ferns on Sunday").await;

	let (status, json) = send(&app, "GET", "/v1/stats", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["notes"], 1);
	assert_eq!(json["vectors"], 1);
	assert_eq!(json["drift"], 0);

	let (status, json) = send(&app, "GET", "/v1/stats?agent=cara", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["namespace"], "agent_cara");
	assert_eq!(json["notes"], 0);
}

#[tokio::test]
async fn filtered_and_hybrid_search_over_http() {
	let (app, _) = app();
	let (status, json) = send(
		&app,
		"POST",
		"/v1/notes",
		Some(serde_json::json!({ "content": "Milk delivery window", "title": "Errands" })),
	)
	.await;

	assert_eq!(status, StatusCode::CREATED, "Unexpected body: {json}");

	let titled = json["id"].as_i64().expect("Created note must carry an id.");

	create(&app, "Buy milk tomorrow").await;

	let (status, json) = send(
		&app,
		"POST",
		"/v1/search/filtered",
		Some(serde_json::json!({ "query": "milk", "filters": { "has_title": true } })),
	)
	.await;

	assert_eq!(status, StatusCode::OK, "Unexpected body: {json}");
	assert_eq!(json["total_results"], 1);
	assert_eq!(json["results"][0]["note"]["id"], titled);
	assert_eq!(json["filters_applied"]["has_title"], true);

	let (status, json) = send(
		&app,
		"POST",
		"/v1/search/hybrid",
		Some(serde_json::json!({ "query": "milk delivery", "semantic_weight": 0.4 })),
	)
	.await;

	assert_eq!(status, StatusCode::OK, "Unexpected body: {json}");
	assert_eq!(json["results"][0]["note"]["id"], titled);
	assert_eq!(json["results"][0]["text_score"], 1.0);
	assert!((json["weights"]["text"].as_f64().unwrap_or_default() - 0.6).abs() < 1e-6);

	let (status, json) = send(
		&app,
		"POST",
		"/v1/search/hybrid",
		Some(serde_json::json!({ "query": "milk", "semantic_weight": 0.9, "text_weight": 0.9 })),
	)
	.await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "INVALID_INPUT");
}
