use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::server::types::ErrorEnvelope;
use crate::utils::pdf::ParseError;

/// Message used for the 500 envelope regardless of which stage failed.
pub const PROCESSING_FAILED: &str = "Failed to process PDF";

/// Every way a `/parse` request can fail.
///
/// Only [`ServiceError::InvalidInput`] is a client error; everything else
/// surfaces as a 500 and is distinguishable only through `details`.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("URL is required")]
    InvalidInput,

    #[error("download timed out after {}s", .timeout.as_secs_f64())]
    DownloadTimeout { timeout: Duration },

    #[error("PDF exceeds the maximum download size of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("download failed: {message}")]
    DownloadFailed { status: Option<u16>, message: String },

    #[error("failed to parse PDF: {0}")]
    MalformedDocument(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidInput => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// HTTP status reported by the remote host, when the failure came from one.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            ServiceError::DownloadFailed { status, .. } => *status,
            _ => None,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            ServiceError::InvalidInput => ErrorEnvelope {
                error: self.to_string(),
                details: None,
            },
            _ => ErrorEnvelope {
                error: PROCESSING_FAILED.to_string(),
                details: Some(self.to_string()),
            },
        }
    }
}

impl From<ParseError> for ServiceError {
    fn from(err: ParseError) -> Self {
        ServiceError::MalformedDocument(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.envelope())).into_response()
    }
}
