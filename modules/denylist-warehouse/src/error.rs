use denylist_common::DenylistError;

/// Result type alias for warehouse queries.
pub type Result<T> = std::result::Result<T, WarehouseError>;

#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    #[error("Warehouse query failed: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<WarehouseError> for DenylistError {
    fn from(err: WarehouseError) -> Self {
        DenylistError::Database(err.to_string())
    }
}
