use std::time::Instant;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, info, warn};

use super::router::AppState;
use super::types::{ExtractionRequest, ExtractionResponse, HealthResponse};
use crate::error::ServiceError;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

pub async fn parse(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    // A body that cannot be buffered (e.g. over the body limit) has no usable
    // url either.
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(status = rejection.status().as_u16(), "Rejected unreadable parse body: {}", rejection.body_text());
            return ServiceError::InvalidInput.into_response();
        }
    };
    let Some(request) = ExtractionRequest::from_body(&body) else {
        info!("Rejected parse request without a usable url");
        return ServiceError::InvalidInput.into_response();
    };

    info!(url = %request.url, "Received request to parse");

    match process(&state, &request).await {
        Ok(text) => Json(ExtractionResponse { text }).into_response(),
        Err(e) => {
            error!(url = %request.url, status = ?e.upstream_status(), "Parsing failed: {}", e);
            e.into_response()
        }
    }
}

/// Download, then parse. Either stage failing short-circuits; there is no
/// partial result.
async fn process(state: &AppState, request: &ExtractionRequest) -> Result<String, ServiceError> {
    let document = state.fetcher.fetch(&request.url).await?;
    let size = document.len();
    if document.is_empty() {
        warn!(url = %request.url, "Upstream returned an empty body");
    }
    info!(url = %request.url, bytes = size, "Downloaded document. Parsing...");

    let extractor = state.extractor.clone();
    let started = Instant::now();
    // The parse is CPU-bound; keep it off the async workers. The buffer is
    // moved in and dropped when the task ends.
    let text = tokio::task::spawn_blocking(move || extractor.extract(&document.bytes))
        .await
        .map_err(|e| ServiceError::MalformedDocument(format!("parser task failed: {e}")))??;

    info!(
        url = %request.url,
        bytes = size,
        chars = text.chars().count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Parsing complete"
    );
    Ok(text)
}
