use denylist_common::DenylistError;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] object_store::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid stored value: {0}")]
    Decode(String),
}

impl From<DenylistError> for StoreError {
    fn from(err: DenylistError) -> Self {
        StoreError::Decode(err.to_string())
    }
}

impl From<StoreError> for DenylistError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Artifact(object_store::Error::NotFound { path, .. }) => {
                DenylistError::NotFound(format!("artifact {path}"))
            }
            StoreError::Artifact(e) => DenylistError::Artifact(e.to_string()),
            other => DenylistError::Database(other.to_string()),
        }
    }
}
