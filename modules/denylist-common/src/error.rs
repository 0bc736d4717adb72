use thiserror::Error;

#[derive(Error, Debug)]
pub enum DenylistError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Artifact storage error: {0}")]
    Artifact(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
