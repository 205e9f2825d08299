use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::tools::llm::ModelError;
use crate::workflow::Validation;

pub const UNREACHABLE_MESSAGE: &str =
    "Cannot reach the server. Check that the backend is running and try again.";

/// Errors returned by the HTTP handlers. Rendered as `{"detail": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::UNPROCESSABLE_ENTITY {
            ApiError::Unprocessable(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, "{}", self);
        } else {
            tracing::debug!(%status, "{}", self);
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Transport-level failures seen by the workflow front end.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success status.
    #[error("{detail}")]
    Server { status: u16, detail: String },

    /// No response was obtained at all.
    #[error("{}", UNREACHABLE_MESSAGE)]
    Unreachable(#[source] reqwest::Error),

    #[error("Unexpected response from the server: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Invalid(Validation),

    #[error(transparent)]
    Api(#[from] ClientError),

    #[error("Cannot navigate: {0}")]
    Navigation(String),

    #[error("No presentation has been generated yet")]
    NoDeck,

    #[error("No video has been generated yet")]
    NoVideo,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
