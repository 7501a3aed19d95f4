//! HTTP error responses

use crate::error::PredictorError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {message}")]
    BadRequest {
        message: String,
        details: Vec<String>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ServerError::BadRequest {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PredictorError> for ServerError {
    fn from(err: PredictorError) -> Self {
        match err {
            PredictorError::Validation(details) => ServerError::BadRequest {
                message: details.join("; "),
                details,
            },
            _ if err.is_client_error() => ServerError::bad_request(err.to_string()),
            PredictorError::NotLoaded => ServerError::Unavailable(err.to_string()),
            PredictorError::ArtifactNotFound { .. } => ServerError::NotFound(err.to_string()),
            PredictorError::ModelLoad { ref source, .. } => match source.as_ref() {
                PredictorError::ArtifactNotFound { .. } => ServerError::NotFound(err.to_string()),
                PredictorError::Config(_) => ServerError::bad_request(err.to_string()),
                _ => ServerError::Internal(err.to_string()),
            },
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::bad_request(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ServerError::BadRequest { message, details } if !details.is_empty() => json!({
                "error": true,
                "message": message,
                "details": details,
            }),
            ServerError::BadRequest { message, .. }
            | ServerError::NotFound(message)
            | ServerError::Unavailable(message) => json!({
                "error": true,
                "message": message,
            }),
            ServerError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal server error");
                json!({
                    "error": true,
                    "message": "An internal error occurred",
                })
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
