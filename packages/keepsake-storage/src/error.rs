#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Conflict: {0}")]
	Conflict(String),
}
impl Error {
	/// True when Postgres rejected a write with a unique-constraint violation (SQLSTATE 23505).
	pub fn is_unique_violation(&self) -> bool {
		match self {
			Self::Sqlx(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
			_ => false,
		}
	}
}
