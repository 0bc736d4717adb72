use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::warn;

use denylist_common::DenylistError;
use denylist_store::StoreError;

/// Handler error: a [`DenylistError`] rendered as a JSON body with a
/// matching status code.
#[derive(Debug)]
pub struct ApiError(pub DenylistError);

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self(DenylistError::NotFound(what.into()))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self(DenylistError::Validation(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self.0 {
            DenylistError::NotFound(_) => StatusCode::NOT_FOUND,
            DenylistError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DenylistError> for ApiError {
    fn from(err: DenylistError) -> Self {
        Self(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err.into())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(DenylistError::Anyhow(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(status = status.as_u16(), error = %self.0, "Request failed");
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}
