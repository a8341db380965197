//! Axum route handlers for the Ingestion API.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::ingestion::identity::CallerIdentity;
use crate::sanitize::SanitizedText;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    #[serde(alias = "resumeUrl")]
    pub resume_url: String,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub request_id: Uuid,
    pub text: SanitizedText,
    pub limit: u64,
    pub remaining: u64,
    /// ISO-8601, same value as `X-RateLimit-Reset`.
    pub reset: String,
}

/// POST /api/v1/ingest
///
/// Fetches the résumé PDF behind `resume_url` and returns its sanitized text.
/// Rate-limit headers are attached to every response that reached the limiter.
pub async fn handle_ingest(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Json(request): Json<IngestRequest>,
) -> Result<Response, AppError> {
    if request.resume_url.trim().is_empty() {
        return Err(AppError::Validation("resume_url cannot be empty".to_string()));
    }

    let ingested = state
        .pipeline
        .ingest(&request.resume_url, identity.as_str())
        .await?;

    let decision = ingested.rate_limit;
    let mut response = Json(IngestResponse {
        request_id: ingested.request_id,
        text: ingested.text,
        limit: decision.limit,
        remaining: decision.remaining,
        reset: decision.reset_iso(),
    })
    .into_response();
    decision.apply_headers(response.headers_mut());
    Ok(response)
}
