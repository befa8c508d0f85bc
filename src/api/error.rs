//! Mapping of [`ShopError`] onto HTTP responses.
//!
//! Clients get a fixed message per error kind; storage and internal causes
//! are only logged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::ShopError;

impl ShopError {
    pub fn status(&self) -> StatusCode {
        match self {
            ShopError::Validation(_) => StatusCode::BAD_REQUEST,
            ShopError::NotFound(_) => StatusCode::NOT_FOUND,
            ShopError::Unauthorized => StatusCode::UNAUTHORIZED,
            ShopError::Forbidden => StatusCode::FORBIDDEN,
            ShopError::Storage(_) | ShopError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ShopError::Validation(_) => "validation",
            ShopError::NotFound(_) => "not_found",
            ShopError::Unauthorized => "unauthorized",
            ShopError::Forbidden => "forbidden",
            ShopError::Storage(_) | ShopError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ShopError {
    fn into_response(self) -> Response {
        let message = match &self {
            ShopError::Storage(e) => {
                tracing::error!(error = %e, "storage failure");
                "internal error".to_string()
            }
            ShopError::Internal(cause) => {
                tracing::error!(%cause, "internal failure");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (self.status(), Json(json!({ "error": self.kind(), "message": message }))).into_response()
    }
}
