use std::sync::Arc;

use crate::careers::generator::CareerGenerator;
use crate::ingestion::pipeline::IngestionPipeline;
use crate::ratelimit::RateLimiter;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Fetch → extract → sanitize, gated by the ingest limiter.
    pub pipeline: Arc<IngestionPipeline>,
    /// Pluggable career generator. Default: LlmCareerGenerator.
    pub careers: Arc<dyn CareerGenerator>,
    /// Separate quota for the careers endpoint, which also spends ingest quota.
    pub careers_limiter: Arc<RateLimiter>,
}
