mod careers;
mod config;
mod errors;
mod ingestion;
mod llm_client;
mod ratelimit;
mod routes;
mod sanitize;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::careers::generator::LlmCareerGenerator;
use crate::config::Config;
use crate::ingestion::extractor::PdfTextExtractor;
use crate::ingestion::fetcher::{FetchConfig, HttpDocumentFetcher};
use crate::ingestion::pipeline::IngestionPipeline;
use crate::llm_client::LlmClient;
use crate::ratelimit::clock::SystemClock;
use crate::ratelimit::redis_store::RedisCounterStore;
use crate::ratelimit::store::{CounterStore, InMemoryCounterStore};
use crate::ratelimit::{RateLimitConfig, RateLimiter};
use crate::routes::build_router;
use crate::sanitize::{PiiRedactor, TextNormalizer};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Career API v{}", env!("CARGO_PKG_VERSION"));

    // Rate limiter counters: Redis when configured, process memory otherwise
    let (ingest_store, careers_store) = build_counter_stores(&config)?;
    let clock = Arc::new(SystemClock);
    let ingest_limiter = Arc::new(RateLimiter::new(
        "ingest",
        RateLimitConfig {
            limit: config.ingest_rate_limit,
            window: config.rate_limit_window,
            failure_mode: config.rate_limit_fail_mode,
        },
        ingest_store,
        clock.clone(),
    ));
    let careers_limiter = Arc::new(RateLimiter::new(
        "careers",
        RateLimitConfig {
            limit: config.careers_rate_limit,
            window: config.rate_limit_window,
            failure_mode: config.rate_limit_fail_mode,
        },
        careers_store,
        clock,
    ));
    info!(
        "Rate limits: ingest {}/{:?}, careers {}/{:?}, fail {:?}",
        config.ingest_rate_limit,
        config.rate_limit_window,
        config.careers_rate_limit,
        config.rate_limit_window,
        config.rate_limit_fail_mode
    );

    // Ingestion pipeline
    let fetcher = HttpDocumentFetcher::new(FetchConfig {
        max_bytes: config.fetch_max_bytes,
        timeout: config.fetch_timeout,
        allowed_hosts: config.fetch_allowed_hosts.clone(),
    })
    .context("Failed to build HTTP client for resume fetching")?;
    let extractor = PdfTextExtractor::new(config.extract_timeout);
    let redactor = PiiRedactor::standard(config.website_mode);
    info!("PII redaction categories: {:?}", redactor.categories());
    let pipeline = IngestionPipeline::new(
        ingest_limiter,
        Arc::new(fetcher),
        Arc::new(extractor),
        Arc::new(TextNormalizer::new(redactor)),
    );

    // Initialize LLM client
    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        config.anthropic_model.clone(),
    )
    .context("Failed to build LLM client")?;
    info!("LLM client initialized (model: {})", llm.model());

    // Build app state
    let state = AppState {
        pipeline: Arc::new(pipeline),
        careers: Arc::new(LlmCareerGenerator::new(llm)),
        careers_limiter,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// One counter store per limiter so the two quotas never share keys.
fn build_counter_stores(config: &Config) -> Result<(Arc<dyn CounterStore>, Arc<dyn CounterStore>)> {
    match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str()).context("Invalid REDIS_URL")?;
            info!("Rate limit counters stored in Redis");
            Ok((
                Arc::new(RedisCounterStore::new(client.clone(), "ratelimit:ingest:")),
                Arc::new(RedisCounterStore::new(client, "ratelimit:careers:")),
            ))
        }
        None => {
            info!("REDIS_URL not set; rate limit counters kept in process memory");
            Ok((
                Arc::new(InMemoryCounterStore::new()),
                Arc::new(InMemoryCounterStore::new()),
            ))
        }
    }
}
