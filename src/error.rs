use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{error, warn};

use crate::store::StoreError;

/// Errors a handler can answer with. Bodies are short plain-text messages;
/// internal failures never leak their cause to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound(not_found_text()),
            StoreError::Conflict { .. } => Self::Conflict(err.to_string()),
            StoreError::Transient { .. } => Self::Internal(err.into()),
        }
    }
}

/// Decodes a JSON request body. An empty body answers `empty_message`;
/// anything that is not the expected JSON is a 400 as well.
pub fn parse_body<T: DeserializeOwned>(body: &[u8], empty_message: &str) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest(empty_message.to_string()));
    }
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "malformed request body");
        ApiError::BadRequest("Malformed request body".to_string())
    })
}

fn not_found_text() -> String {
    StatusCode::NOT_FOUND
        .canonical_reason()
        .unwrap_or("Not Found")
        .to_string()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Internal(err) => {
                error!(error = ?err, "request failed");
                status
                    .canonical_reason()
                    .unwrap_or("Internal Server Error")
                    .to_string()
            }
            other => other.to_string(),
        };
        (status, body).into_response()
    }
}
