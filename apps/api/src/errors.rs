use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::careers::generator::CareerError;
use crate::ingestion::extractor::ExtractionError;
use crate::ingestion::fetcher::FetchError;
use crate::ingestion::pipeline::IngestionError;
use crate::ratelimit::RateLimitDecision;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
/// Variants that passed a rate limiter carry its decision so the response still
/// reports the caller's quota.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {message}")]
    UnprocessableEntity {
        message: String,
        rate_limit: Option<RateLimitDecision>,
    },

    #[error("Rate limit exceeded")]
    RateLimited(RateLimitDecision),

    #[error("Fetch failed: {source}")]
    FetchFailed {
        source: FetchError,
        rate_limit: Option<RateLimitDecision>,
    },

    #[error("Extraction failed: {source}")]
    ExtractionFailed {
        source: ExtractionError,
        rate_limit: Option<RateLimitDecision>,
    },

    #[error("Career generation failed: {source}")]
    DownstreamFailed {
        source: CareerError,
        rate_limit: Option<RateLimitDecision>,
    },
}

impl From<IngestionError> for AppError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::RateLimited(decision) => AppError::RateLimited(decision),
            IngestionError::FetchFailed { source, rate_limit } => AppError::FetchFailed {
                source,
                rate_limit: Some(rate_limit),
            },
            IngestionError::ExtractionFailed { source, rate_limit } => {
                AppError::ExtractionFailed {
                    source,
                    rate_limit: Some(rate_limit),
                }
            }
        }
    }
}

impl AppError {
    fn rate_limit(&self) -> Option<&RateLimitDecision> {
        match self {
            AppError::RateLimited(decision) => Some(decision),
            AppError::UnprocessableEntity { rate_limit, .. }
            | AppError::FetchFailed { rate_limit, .. }
            | AppError::ExtractionFailed { rate_limit, .. }
            | AppError::DownstreamFailed { rate_limit, .. } => rate_limit.as_ref(),
            AppError::Validation(_) => None,
        }
    }

    /// Reports `decision` as the caller's quota. A denial keeps the decision of
    /// the limiter that denied it.
    pub fn with_rate_limit(self, decision: RateLimitDecision) -> Self {
        let rate_limit = Some(decision);
        match self {
            AppError::UnprocessableEntity { message, .. } => {
                AppError::UnprocessableEntity { message, rate_limit }
            }
            AppError::FetchFailed { source, .. } => AppError::FetchFailed { source, rate_limit },
            AppError::ExtractionFailed { source, .. } => {
                AppError::ExtractionFailed { source, rate_limit }
            }
            AppError::DownstreamFailed { source, .. } => {
                AppError::DownstreamFailed { source, rate_limit }
            }
            other @ (AppError::Validation(_) | AppError::RateLimited(_)) => other,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity { message, .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                message.clone(),
            ),
            AppError::RateLimited(decision) => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Rate limit exceeded. Try again at {}", decision.reset_iso()),
            ),
            AppError::FetchFailed { source, .. } => {
                tracing::warn!("Fetch error: {source}");
                let status = match source {
                    FetchError::InvalidUrl(_) | FetchError::HostNotAllowed(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    FetchError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    FetchError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    FetchError::Http(_)
                    | FetchError::Status(_)
                    | FetchError::TooManyRedirects(_) => StatusCode::BAD_GATEWAY,
                };
                (status, "FETCH_FAILED", format!("Could not retrieve the resume: {source}"))
            }
            AppError::ExtractionFailed { source, .. } => {
                tracing::warn!("Extraction error: {source}");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "EXTRACTION_FAILED",
                    format!("Could not read text from the resume: {source}"),
                )
            }
            AppError::DownstreamFailed { source, .. } => {
                tracing::error!("Career generation error: {source}");
                let message = match source {
                    CareerError::NoCareers => {
                        "No career paths could be generated. Please try again.".to_string()
                    }
                    CareerError::Llm(_) => {
                        "Failed to generate career paths, please try again.".to_string()
                    }
                };
                (StatusCode::BAD_GATEWAY, "DOWNSTREAM_FAILED", message)
            }
        };

        let body = match &self {
            AppError::RateLimited(decision) => json!({
                "error": { "code": code, "message": message },
                "limit": decision.limit,
                "remaining": decision.remaining,
                "reset": decision.reset_iso(),
            }),
            _ => json!({
                "error": { "code": code, "message": message }
            }),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(decision) = self.rate_limit() {
            decision.apply_headers(response.headers_mut());
        }
        response
    }
}
