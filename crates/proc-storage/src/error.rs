/// Errors surfaced by `Store` implementations. Advisory health checks
/// collapse `sqlx::Error` to `false` rather than propagating it (spec.md
/// §4.3 "Health"); every other operation reports it as `StorageError::Db`
/// (spec.md §7 `DATABASE_ERROR`).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("job {0} not found")]
    JobNotFound(uuid::Uuid),
    #[error("illegal job transition: {0}")]
    Lifecycle(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
