use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::{header::LOCATION, redirect, Client, Url};
use thiserror::Error;
use tracing::debug;

const MAX_REDIRECTS: usize = 5;

/// Raw bytes of a fetched document. Lives for a single ingestion call.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub source_url: String,
    pub bytes: Bytes,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid document URL: {0}")]
    InvalidUrl(String),

    #[error("Host '{0}' is not an allowed document host")]
    HostNotAllowed(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Document host returned status {0}")]
    Status(u16),

    #[error("Document exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("Document fetch timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Document host redirected more than {0} times")]
    TooManyRedirects(usize),
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub max_bytes: usize,
    pub timeout: Duration,
    /// Empty means any host.
    pub allowed_hosts: Vec<String>,
}

/// Retrieves document bytes by URL. Implementations do not retry.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawDocument, FetchError>;
}

/// Plain HTTP GET with size, time, scheme and host bounds.
///
/// Redirects are followed by hand so every hop passes the same scheme and host
/// checks as the URL the caller supplied.
pub struct HttpDocumentFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpDocumentFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self { client, config })
    }

    fn validate(&self, url: &str) -> Result<Url, FetchError> {
        let parsed = Url::parse(url.trim()).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl("URL has no host".to_string()))?
            .to_ascii_lowercase();
        if !host_allowed(&host, &self.config.allowed_hosts) {
            return Err(FetchError::HostNotAllowed(host));
        }
        Ok(parsed)
    }

    async fn download(&self, url: Url) -> Result<RawDocument, FetchError> {
        let limit = self.config.max_bytes;
        let mut url = url;
        let mut redirects = 0;

        let mut response = loop {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| self.classify(e))?;

            let status = response.status();
            if !status.is_redirection() {
                break response;
            }
            if redirects == MAX_REDIRECTS {
                return Err(FetchError::TooManyRedirects(MAX_REDIRECTS));
            }
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or(FetchError::Status(status.as_u16()))?;
            let next = url
                .join(location)
                .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
            debug!(from = %url, to = %next, "following redirect");
            url = self.validate(next.as_str())?;
            redirects += 1;
        };
        let source_url = url.to_string();

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        if let Some(length) = response.content_length() {
            if length > limit as u64 {
                return Err(FetchError::TooLarge { limit });
            }
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
            if body.len() + chunk.len() > limit {
                return Err(FetchError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        debug!(bytes = body.len(), "document downloaded");
        Ok(RawDocument {
            source_url,
            bytes: body.freeze(),
        })
    }

    fn classify(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.config.timeout)
        } else {
            FetchError::Http(error)
        }
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, url: &str) -> Result<RawDocument, FetchError> {
        let url = self.validate(url)?;
        match tokio::time::timeout(self.config.timeout, self.download(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.config.timeout)),
        }
    }
}

/// Exact match or subdomain of an allowed host.
fn host_allowed(host: &str, allowed: &[String]) -> bool {
    allowed.is_empty()
        || allowed.iter().any(|a| {
            let a = a.trim().to_ascii_lowercase();
            host == a || host.ends_with(&format!(".{a}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::Redirect, routing::get, Router};
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// Like `serve`, for routers that need their own address.
    async fn serve_with(app: impl FnOnce(SocketAddr) -> Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = app(addr);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn redirecting_server(addr: SocketAddr) -> Router {
        let internal = format!("http://127.0.0.1:{}/internal", addr.port());
        Router::new()
            .route("/internal", get(|| async { "internal-only" }))
            .route("/resume.pdf", get(|| async { vec![b'%'; 64] }))
            .route(
                "/escape",
                get(move || async move { Redirect::temporary(&internal) }),
            )
            .route("/moved", get(|| async { Redirect::permanent("/resume.pdf") }))
            .route("/loop", get(|| async { Redirect::temporary("/loop") }))
            .route(
                "/to-file",
                get(|| async { Redirect::temporary("file:///etc/passwd") }),
            )
    }

    fn document_server() -> Router {
        Router::new()
            .route("/resume.pdf", get(|| async { vec![b'%'; 512] }))
            .route("/huge.pdf", get(|| async { vec![0u8; 4096] }))
            .route("/missing.pdf", get(|| async { StatusCode::NOT_FOUND }))
            .route(
                "/slow.pdf",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    "late"
                }),
            )
    }

    fn fetcher(allowed_hosts: Vec<String>) -> HttpDocumentFetcher {
        HttpDocumentFetcher::new(FetchConfig {
            max_bytes: 1024,
            timeout: Duration::from_millis(300),
            allowed_hosts,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetches_document_within_limits() {
        let addr = serve(document_server()).await;
        let doc = fetcher(vec![])
            .fetch(&format!("http://{addr}/resume.pdf"))
            .await
            .unwrap();

        assert_eq!(doc.bytes.len(), 512);
        assert!(doc.source_url.ends_with("/resume.pdf"));
    }

    #[tokio::test]
    async fn test_oversized_document_is_rejected() {
        let addr = serve(document_server()).await;
        let err = fetcher(vec![])
            .fetch(&format!("http://{addr}/huge.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::TooLarge { limit: 1024 }));
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let addr = serve(document_server()).await;
        let err = fetcher(vec![])
            .fetch(&format!("http://{addr}/missing.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status(404)));
    }

    #[tokio::test]
    async fn test_slow_host_times_out() {
        let addr = serve(document_server()).await;
        let err = fetcher(vec![])
            .fetch(&format!("http://{addr}/slow.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_rejects_non_http_schemes() {
        let err = fetcher(vec![]).fetch("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));

        let err = fetcher(vec![]).fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_rejects_hosts_outside_allowlist() {
        let err = fetcher(vec!["upcdn.io".to_string()])
            .fetch("http://127.0.0.1:9/resume.pdf")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::HostNotAllowed(host) if host == "127.0.0.1"));
    }

    #[tokio::test]
    async fn test_redirect_to_disallowed_host_is_rejected() {
        let addr = serve_with(redirecting_server).await;
        let fetcher = fetcher(vec!["localhost".to_string()]);

        let err = fetcher
            .fetch(&format!("http://localhost:{}/escape", addr.port()))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::HostNotAllowed(host) if host == "127.0.0.1"));
    }

    #[tokio::test]
    async fn test_allowed_redirect_records_final_url() {
        let addr = serve_with(redirecting_server).await;
        let fetcher = fetcher(vec!["localhost".to_string()]);

        let doc = fetcher
            .fetch(&format!("http://localhost:{}/moved", addr.port()))
            .await
            .unwrap();

        assert_eq!(doc.bytes.len(), 64);
        assert_eq!(
            doc.source_url,
            format!("http://localhost:{}/resume.pdf", addr.port())
        );
    }

    #[tokio::test]
    async fn test_redirect_loops_are_cut_off() {
        let addr = serve_with(redirecting_server).await;

        let err = fetcher(vec![])
            .fetch(&format!("http://{addr}/loop"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::TooManyRedirects(5)));
    }

    #[tokio::test]
    async fn test_redirect_to_non_http_scheme_is_rejected() {
        let addr = serve_with(redirecting_server).await;

        let err = fetcher(vec![])
            .fetch(&format!("http://{addr}/to-file"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[test]
    fn test_host_allowlist_matches_subdomains() {
        let allowed = vec!["upcdn.io".to_string()];
        assert!(host_allowed("upcdn.io", &allowed));
        assert!(host_allowed("files.upcdn.io", &allowed));
        assert!(!host_allowed("evilupcdn.io", &allowed));
        assert!(host_allowed("anything.example", &[]));
    }
}
