//! Sommelier Server
//!
//! HTTP surface over the query pipeline and conversation memory.

pub mod http;
pub mod metrics;
pub mod state;

pub use http::create_router;
pub use metrics::{describe_metrics, init_metrics};
pub use state::AppState;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sommelier_core::Error> for ServerError {
    fn from(err: sommelier_core::Error) -> Self {
        if err.is_validation() {
            ServerError::InvalidRequest(err.to_string())
        } else {
            ServerError::Internal(err.to_string())
        }
    }
}

impl From<&ServerError> for StatusCode {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = StatusCode::from(&self);
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sommelier_core::Error;

    #[test]
    fn test_status_mapping() {
        let err = ServerError::from(Error::Validation("rating must be between 1 and 5".into()));
        assert_eq!(StatusCode::from(&err), StatusCode::BAD_REQUEST);

        let err = ServerError::from(Error::StoreUnavailable("down".into()));
        assert_eq!(StatusCode::from(&err), StatusCode::INTERNAL_SERVER_ERROR);

        let err = ServerError::from(Error::EmbeddingUnavailable("down".into()));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
