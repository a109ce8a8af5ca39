//! HTTP error type: maps [`TraceError`] kinds to status codes.

use crate::error::TraceError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{message}")]
    Upload { status: StatusCode, message: String },

    #[error(transparent)]
    Trace(#[from] TraceError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upload { status, .. } => *status,
            ApiError::Trace(e) => match e {
                TraceError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
                TraceError::MalformedDocument { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                TraceError::MissingCredential { .. } => StatusCode::SERVICE_UNAVAILABLE,
                TraceError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                TraceError::UpstreamError { .. } | TraceError::ResponseFormatError { .. } => {
                    StatusCode::BAD_GATEWAY
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed ({}): {}", status, self);
        } else {
            tracing::warn!("Request rejected ({}): {}", status, self);
        }

        let mut body = json!({
            "success": false,
            "error": self.to_string(),
        });
        if let ApiError::Trace(e) = &self {
            if let Some(raw) = e.raw_response() {
                body["raw_response"] = json!(raw);
            }
        }

        (status, Json(body)).into_response()
    }
}
