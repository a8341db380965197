use std::sync::Arc;

use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::ingestion::extractor::{ExtractionError, TextExtractor};
use crate::ingestion::fetcher::{DocumentFetcher, FetchError};
use crate::ratelimit::{RateLimitDecision, RateLimiter};
use crate::sanitize::{SanitizedText, TextNormalizer};

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("Rate limit exceeded")]
    RateLimited(RateLimitDecision),

    #[error("Failed to fetch resume: {source}")]
    FetchFailed {
        #[source]
        source: FetchError,
        rate_limit: RateLimitDecision,
    },

    #[error("Failed to extract resume text: {source}")]
    ExtractionFailed {
        #[source]
        source: ExtractionError,
        rate_limit: RateLimitDecision,
    },
}

/// Successful ingestion: the sanitized text and the quota it was counted against.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub request_id: Uuid,
    pub text: SanitizedText,
    pub rate_limit: RateLimitDecision,
}

/// Rate gate, then fetch, extract, normalize. Short-circuits on the first failure
/// and holds no state of its own between calls.
pub struct IngestionPipeline {
    limiter: Arc<RateLimiter>,
    fetcher: Arc<dyn DocumentFetcher>,
    extractor: Arc<dyn TextExtractor>,
    normalizer: Arc<TextNormalizer>,
}

impl IngestionPipeline {
    pub fn new(
        limiter: Arc<RateLimiter>,
        fetcher: Arc<dyn DocumentFetcher>,
        extractor: Arc<dyn TextExtractor>,
        normalizer: Arc<TextNormalizer>,
    ) -> Self {
        Self {
            limiter,
            fetcher,
            extractor,
            normalizer,
        }
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    pub async fn ingest(&self, url: &str, identity: &str) -> Result<Ingested, IngestionError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("ingest", %request_id);
        self.run(request_id, url, identity).instrument(span).await
    }

    async fn run(
        &self,
        request_id: Uuid,
        url: &str,
        identity: &str,
    ) -> Result<Ingested, IngestionError> {
        let rate_limit = self.limiter.check(identity).await;
        if !rate_limit.allowed {
            info!(reset_at = %rate_limit.reset_iso(), "ingestion rate limited");
            return Err(IngestionError::RateLimited(rate_limit));
        }

        let document = match self.fetcher.fetch(url).await {
            Ok(document) => document,
            Err(source) => {
                warn!("Resume fetch failed: {source}");
                return Err(IngestionError::FetchFailed { source, rate_limit });
            }
        };
        let size = document.bytes.len();

        let extracted = match self.extractor.extract(document).await {
            Ok(extracted) => extracted,
            Err(source) => {
                warn!("Resume extraction failed: {source}");
                return Err(IngestionError::ExtractionFailed { source, rate_limit });
            }
        };

        let (text, redactions) = self.normalizer.normalize_with_summary(extracted.as_str());
        if text.is_empty() {
            warn!(bytes = size, "resume produced no text; likely a scanned PDF");
        }
        info!(
            bytes = size,
            chars = text.len(),
            redactions = redactions.total(),
            redacted_emails = redactions.email,
            redacted_phones = redactions.phone,
            redacted_profiles = redactions.linkedin_profile,
            redacted_websites = redactions.website,
            remaining = rate_limit.remaining,
            "resume ingested"
        );

        Ok(Ingested {
            request_id,
            text,
            rate_limit,
        })
    }
}
