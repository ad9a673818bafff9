pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid input: {message}")]
	InvalidInput { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Embedding failed: {message}")]
	EmbeddingFailed { message: String },
	#[error("Vector index unavailable: {message}")]
	IndexUnavailable { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Inconsistent state: {message}")]
	InconsistentState { message: String },
	#[error("Timed out during {stage}.")]
	Timeout { stage: &'static str },
}
impl Error {
	/// Maps a failure of the vector index stage.
	pub fn index(err: mnem_storage::Error) -> Self {
		match err {
			mnem_storage::Error::InvalidArgument(message) => Self::InvalidInput { message },
			other => Self::IndexUnavailable { message: other.to_string() },
		}
	}

	/// Maps a failure of the metadata store stage.
	pub fn store(err: mnem_storage::Error) -> Self {
		match err {
			mnem_storage::Error::InvalidArgument(message) => Self::InvalidInput { message },
			err @ mnem_storage::Error::DuplicateVectorId(_) =>
				Self::EmbeddingFailed { message: err.to_string() },
			other => Self::Storage { message: other.to_string() },
		}
	}

	pub fn error_code(&self) -> &'static str {
		match self {
			Self::InvalidInput { .. } => "INVALID_INPUT",
			Self::NotFound { .. } => "NOT_FOUND",
			Self::EmbeddingFailed { .. } => "EMBEDDING_FAILED",
			Self::IndexUnavailable { .. } => "INDEX_UNAVAILABLE",
			Self::Storage { .. } => "STORAGE_ERROR",
			Self::InconsistentState { .. } => "INCONSISTENT_STATE",
			Self::Timeout { .. } => "TIMEOUT",
		}
	}
}

impl From<mnem_providers::Error> for Error {
	fn from(err: mnem_providers::Error) -> Self {
		Self::EmbeddingFailed { message: err.to_string() }
	}
}

impl From<mnem_domain::InvalidNamespace> for Error {
	fn from(err: mnem_domain::InvalidNamespace) -> Self {
		Self::InvalidInput { message: err.to_string() }
	}
}
