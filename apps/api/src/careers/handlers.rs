//! Axum route handlers for the Careers API.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::careers::generator::CareerRecord;
use crate::errors::AppError;
use crate::ingestion::identity::CallerIdentity;
use crate::state::AppState;

/// Upper bound on the free-text interests field, in characters.
pub const MAX_CONTEXT_CHARS: usize = 2_000;

#[derive(Debug, Deserialize)]
pub struct CareersRequest {
    #[serde(alias = "resumeUrl")]
    pub resume_url: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CareersResponse {
    pub request_id: Uuid,
    pub careers: Vec<CareerRecord>,
}

/// POST /api/v1/careers
///
/// Ingests the résumé and generates career paths in one request, so the
/// sanitized text never round-trips through the client. The careers quota is
/// checked before ingestion spends any of the ingest quota.
pub async fn handle_careers(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Json(request): Json<CareersRequest>,
) -> Result<Response, AppError> {
    if request.resume_url.trim().is_empty() {
        return Err(AppError::Validation("resume_url cannot be empty".to_string()));
    }
    if let Some(context) = &request.context {
        if context.chars().count() > MAX_CONTEXT_CHARS {
            return Err(AppError::Validation(format!(
                "context cannot exceed {MAX_CONTEXT_CHARS} characters"
            )));
        }
    }

    let decision = state.careers_limiter.check(identity.as_str()).await;
    if !decision.allowed {
        return Err(AppError::RateLimited(decision));
    }

    // Past this point responses report the careers quota, unless the ingest
    // quota is the one that denied the request.
    let ingested = state
        .pipeline
        .ingest(&request.resume_url, identity.as_str())
        .await
        .map_err(|e| AppError::from(e).with_rate_limit(decision.clone()))?;

    let context = request
        .context
        .as_deref()
        .map(|c| state.pipeline.normalizer().normalize(c))
        .filter(|c| !c.is_empty());

    if ingested.text.is_empty() && context.is_none() {
        return Err(AppError::UnprocessableEntity {
            message: "The resume contains no readable text. Scanned PDFs are not supported; \
                      upload a text-based PDF or describe your background in the context field."
                .to_string(),
            rate_limit: Some(decision),
        });
    }

    let careers = state
        .careers
        .generate(&ingested.text, context.as_ref())
        .await
        .map_err(|source| AppError::DownstreamFailed {
            source,
            rate_limit: Some(decision.clone()),
        })?;

    info!(request_id = %ingested.request_id, count = careers.len(), "careers returned");

    let mut response = Json(CareersResponse {
        request_id: ingested.request_id,
        careers,
    })
    .into_response();
    decision.apply_headers(response.headers_mut());
    Ok(response)
}
