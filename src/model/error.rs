use thiserror::Error;

pub type DatabaseResult<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("sqlx migrate error: {0}")]
    SqlxMigrateError(#[from] sqlx::migrate::MigrateError),
    #[error("sqlx error: {0}")]
    SqlxError(#[from] sqlx::Error),
    #[error("json error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("access to this resource is forbidden")]
    Forbidden,
    #[error("resource not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(&'static str),
    /// A domain rule rejected the operation (e.g. enrolling into an unpublished course).
    #[error("invalid operation: {0}")]
    Invalid(String),
}

impl DatabaseError {
    pub fn invalid<S: Into<String>>(reason: S) -> Self {
        Self::Invalid(reason.into())
    }

    /// True for unique constraint violations reported by postgres.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::SqlxError(sqlx::Error::Database(e)) => e.is_unique_violation(),
            Self::Conflict(_) => true,
            _ => false,
        }
    }
}
