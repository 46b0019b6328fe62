pub type Result<T, E = Error> = std::result::Result<T, E>;

const MAX_RECORDED_ERROR_CHARS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Timed out: {message}")]
	Timeout { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Object store error: {message}")]
	ObjectStore { message: String },
}
impl Error {
	/// Conflicts, upstream failures and timeouts may succeed when the caller tries again.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Conflict { .. } | Self::Provider { .. } | Self::Timeout { .. })
	}

	/// First line of the message, truncated, for recording on a failed memory.
	pub fn sanitized(&self) -> String {
		let message = self.to_string();
		let first_line = message.lines().next().unwrap_or_default().trim();

		first_line.chars().take(MAX_RECORDED_ERROR_CHARS).collect()
	}

	pub(crate) fn object_store(err: keepsake_storage::Error) -> Self {
		match err {
			keepsake_storage::Error::NotFound(message) => Self::NotFound { message },
			keepsake_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			other => Self::ObjectStore { message: other.to_string() },
		}
	}
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		let code = err.as_database_error().and_then(|db_err| db_err.code());

		if is_transaction_conflict(code.as_deref()) {
			return Self::Conflict { message: err.to_string() };
		}

		Self::Storage { message: err.to_string() }
	}
}

impl From<keepsake_storage::Error> for Error {
	fn from(err: keepsake_storage::Error) -> Self {
		match err {
			keepsake_storage::Error::Sqlx(inner) => Self::from(inner),
			keepsake_storage::Error::Io(inner) => Self::Storage { message: inner.to_string() },
			keepsake_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			keepsake_storage::Error::NotFound(message) => Self::NotFound { message },
			keepsake_storage::Error::Conflict(message) => Self::Conflict { message },
		}
	}
}

/// Deadlocks (40P01) and serialization failures (40001) abort one transaction of a pair; the
/// other commits, so the aborted one may be retried.
fn is_transaction_conflict(code: Option<&str>) -> bool {
	matches!(code, Some("40P01" | "40001"))
}
