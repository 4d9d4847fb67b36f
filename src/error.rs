/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Run cancelled after {processed}/{total} games")]
    Cancelled { processed: usize, total: usize },

    #[error("Deadline exceeded after {processed}/{total} games")]
    DeadlineExceeded { processed: usize, total: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for the two ways a run can be stopped from outside
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            AppError::Cancelled { .. } | AppError::DeadlineExceeded { .. }
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
