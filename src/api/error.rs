//! Query API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::envelope::Envelope;
use crate::store::StoreError;

/// Errors returned by the query API handlers.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// No record matches the lookup.
    #[error("Request log not found: {0}")]
    NotFound(String),

    /// A query parameter could not be parsed.
    #[error("Invalid parameter {name}: {value}")]
    BadRequest { name: &'static str, value: String },

    /// The store failed to answer.
    #[error("Failed to read request logs: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Store(err) = &self {
            tracing::error!(error = %err, "Query API store failure");
        }
        let body: Envelope<()> = Envelope::error(status, self.to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = ApiError::NotFound("abc".to_string());
        assert_eq!(err.to_string(), "Request log not found: abc");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_bad_request_display() {
        let err = ApiError::BadRequest {
            name: "page",
            value: "two".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid parameter page: two");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_error_status() {
        let err = ApiError::from(StoreError::TaskCancelled);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("Failed to read request logs"));
    }

    #[test]
    fn test_into_response_status() {
        let response = ApiError::NotFound("x".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
