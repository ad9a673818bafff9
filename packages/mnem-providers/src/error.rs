pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
	#[error("Embedding provider is unavailable: {message}")]
	Unavailable { message: String },
	#[error("Embedding provider rate limited the request.")]
	RateLimited { retry_after_ms: Option<u64> },
	#[error("Embedding provider rejected the request with status {status}: {message}")]
	Rejected { status: u16, message: String },
}

impl Error {
	/// Rate limits, server and auth errors, and transport failures are worth another attempt.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Unavailable { .. } | Self::RateLimited { .. } => true,
			Self::Reqwest(err) => err.is_timeout() || err.is_connect(),
			_ => false,
		}
	}
}
