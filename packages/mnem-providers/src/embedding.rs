use std::time::Duration;

use reqwest::{Client, Response, StatusCode, header::RETRY_AFTER};
use serde_json::Value;

use crate::{Error, Result};
use mnem_config::{EmbeddingProviderConfig, EmbeddingRetry};
use mnem_domain::text;

const MAX_BACKOFF_EXPONENT: u32 = 16;

/// HTTP client for an OpenAI-compatible embeddings endpoint. Built once per process so every
/// request shares one connection pool.
#[derive(Clone, Debug)]
pub struct EmbeddingClient {
	http: Client,
}
impl EmbeddingClient {
	pub fn new() -> Result<Self> {
		Ok(Self { http: Client::builder().build()? })
	}

	/// Embeds `texts` with retries on transient failures.
	///
	/// Inputs are trimmed and cut to `max_input_chars` grapheme clusters before the first attempt,
	/// so every attempt sends identical bodies.
	pub async fn embed(
		&self,
		cfg: &EmbeddingProviderConfig,
		model: &str,
		texts: &[String],
	) -> Result<Vec<Vec<f32>>> {
		let inputs = prepare_inputs(cfg, texts);
		let max_attempts = cfg.retry.max_attempts.max(1);
		let mut attempt = 1;

		loop {
			match self.embed_once(cfg, model, &inputs).await {
				Ok(vectors) => return Ok(vectors),
				Err(err) if attempt < max_attempts && err.is_retryable() => {
					let delay = retry_delay(&cfg.retry, attempt, &err);

					tracing::warn!(
						provider_id = %cfg.provider_id,
						attempt,
						max_attempts,
						delay_ms = delay.as_millis() as u64,
						error = %err,
						"Retrying embedding request."
					);

					tokio::time::sleep(delay).await;

					attempt += 1;
				},
				Err(err) => return Err(err),
			}
		}
	}

	/// Single request without retries.
	pub async fn embed_once(
		&self,
		cfg: &EmbeddingProviderConfig,
		model: &str,
		inputs: &[&str],
	) -> Result<Vec<Vec<f32>>> {
		let url = format!("{}{}", cfg.api_base.trim_end_matches('/'), cfg.path);
		let body = serde_json::json!({
			"model": model,
			"input": inputs,
			"dimensions": cfg.dimensions,
		});
		let res = self
			.http
			.post(url)
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await
			.map_err(classify_transport)?;
		let res = check_status(res).await?;
		let json: Value = res.json().await?;
		let vectors = parse_embedding_response(json)?;

		validate_vectors(&vectors, inputs.len(), cfg.dimensions as usize)?;

		Ok(vectors)
	}
}

pub fn prepare_inputs<'a>(cfg: &EmbeddingProviderConfig, texts: &'a [String]) -> Vec<&'a str> {
	texts
		.iter()
		.map(|raw| text::embedding_input(raw, cfg.max_input_chars as usize))
		.collect()
}

pub fn backoff_for_attempt(retry: &EmbeddingRetry, attempt: u32) -> Duration {
	let exp = attempt.max(1).saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
	let base = retry.base_backoff_ms.saturating_mul(1 << exp);

	Duration::from_millis(base.min(retry.max_backoff_ms))
}

fn retry_delay(retry: &EmbeddingRetry, attempt: u32, err: &Error) -> Duration {
	match err {
		Error::RateLimited { retry_after_ms: Some(ms) } =>
			Duration::from_millis((*ms).min(retry.max_backoff_ms)),
		_ => backoff_for_attempt(retry, attempt),
	}
}

fn classify_transport(err: reqwest::Error) -> Error {
	if err.is_timeout() || err.is_connect() {
		return Error::Unavailable { message: err.to_string() };
	}

	Error::Reqwest(err)
}

async fn check_status(res: Response) -> Result<Response> {
	let status = res.status();

	if status.is_success() {
		return Ok(res);
	}
	if status == StatusCode::TOO_MANY_REQUESTS {
		return Err(Error::RateLimited { retry_after_ms: parse_retry_after(&res) });
	}
	// Auth failures count as an unavailable provider.
	if status.is_server_error()
		|| status == StatusCode::UNAUTHORIZED
		|| status == StatusCode::FORBIDDEN
	{
		return Err(Error::Unavailable { message: format!("Provider returned status {status}.") });
	}

	let message = res.text().await.unwrap_or_default();

	Err(Error::Rejected { status: status.as_u16(), message })
}

fn parse_retry_after(res: &Response) -> Option<u64> {
	let raw = res.headers().get(RETRY_AFTER)?.to_str().ok()?;
	let secs = raw.trim().parse::<u64>().ok()?;

	Some(secs.saturating_mul(1_000))
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json.get("data").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse { message: "Embedding response is missing data array.".to_string() }
	})?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item.get("embedding").and_then(|v| v.as_array()).ok_or_else(|| {
			Error::InvalidResponse {
				message: "Embedding item missing embedding array.".to_string(),
			}
		})?;
		let mut vec = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number = value.as_f64().ok_or_else(|| Error::InvalidResponse {
				message: "Embedding value must be numeric.".to_string(),
			})?;

			vec.push(number as f32);
		}

		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

fn validate_vectors(vectors: &[Vec<f32>], expected: usize, dim: usize) -> Result<()> {
	if vectors.len() != expected {
		return Err(Error::InvalidResponse {
			message: format!(
				"Embedding response has {} vectors for {expected} inputs.",
				vectors.len()
			),
		});
	}

	for vector in vectors {
		if vector.len() != dim {
			return Err(Error::InvalidResponse {
				message: format!(
					"Embedding dimension mismatch: expected {dim}, got {}.",
					vector.len()
				),
			});
		}
		if vector.iter().any(|value| !value.is_finite()) {
			return Err(Error::InvalidResponse {
				message: "Embedding contains non-finite values.".to_string(),
			});
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_embeddings_in_index_order() {
		let json = serde_json::json!({
			"data": [
				{ "index": 1, "embedding": [2.0, 3.0] },
				{ "index": 0, "embedding": [0.5, 1.5] }
			]
		});
		let parsed = parse_embedding_response(json).expect("parse failed");

		assert_eq!(parsed.len(), 2);
		assert_eq!(parsed[0], vec![0.5, 1.5]);
		assert_eq!(parsed[1], vec![2.0, 3.0]);
	}

	#[test]
	fn rejects_wrong_dimension_and_count() {
		let vectors = vec![vec![0.1, 0.2]];

		assert!(validate_vectors(&vectors, 1, 2).is_ok());
		assert!(validate_vectors(&vectors, 1, 3).is_err());
		assert!(validate_vectors(&vectors, 2, 2).is_err());
		assert!(validate_vectors(&[vec![f32::NAN, 0.0]], 1, 2).is_err());
	}

	#[test]
	fn backoff_doubles_and_caps() {
		let retry = EmbeddingRetry { max_attempts: 5, base_backoff_ms: 100, max_backoff_ms: 350 };

		assert_eq!(backoff_for_attempt(&retry, 1), Duration::from_millis(100));
		assert_eq!(backoff_for_attempt(&retry, 2), Duration::from_millis(200));
		assert_eq!(backoff_for_attempt(&retry, 3), Duration::from_millis(350));
		assert_eq!(backoff_for_attempt(&retry, 60), Duration::from_millis(350));
	}

	#[test]
	fn retry_after_overrides_backoff_within_cap() {
		let retry = EmbeddingRetry { max_attempts: 5, base_backoff_ms: 100, max_backoff_ms: 2_000 };
		let limited = Error::RateLimited { retry_after_ms: Some(1_000) };
		let long = Error::RateLimited { retry_after_ms: Some(60_000) };

		assert_eq!(retry_delay(&retry, 1, &limited), Duration::from_millis(1_000));
		assert_eq!(retry_delay(&retry, 1, &long), Duration::from_millis(2_000));
	}
}
