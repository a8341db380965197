use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

use crate::ratelimit::ANONYMOUS_IDENTITY;

pub const USER_ID_HEADER: &str = "x-user-id";
const MAX_IDENTITY_LEN: usize = 128;

/// Rate-limit partition key for the caller.
///
/// Resolution order: `x-user-id`, first `x-forwarded-for` hop, `x-real-ip`, then
/// the shared anonymous identity. Callers that send none of these share one quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity(pub String);

impl CallerIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        let from_header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(',').next().unwrap_or("").trim())
                .filter(|v| !v.is_empty())
                .map(|v| v.chars().take(MAX_IDENTITY_LEN).collect::<String>())
        };

        let identity = from_header(USER_ID_HEADER)
            .map(|id| format!("user:{id}"))
            .or_else(|| from_header("x-forwarded-for").map(|ip| format!("ip:{ip}")))
            .or_else(|| from_header("x-real-ip").map(|ip| format!("ip:{ip}")))
            .unwrap_or_else(|| ANONYMOUS_IDENTITY.to_string());

        Self(identity)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_user_header_wins() {
        let id = CallerIdentity::from_headers(&headers(&[
            ("x-user-id", "device-42"),
            ("x-forwarded-for", "203.0.113.9"),
        ]));
        assert_eq!(id.as_str(), "user:device-42");
    }

    #[test]
    fn test_first_forwarded_hop_is_used() {
        let id = CallerIdentity::from_headers(&headers(&[(
            "x-forwarded-for",
            "203.0.113.9, 10.0.0.1",
        )]));
        assert_eq!(id.as_str(), "ip:203.0.113.9");
    }

    #[test]
    fn test_real_ip_fallback() {
        let id = CallerIdentity::from_headers(&headers(&[("x-real-ip", "198.51.100.7")]));
        assert_eq!(id.as_str(), "ip:198.51.100.7");
    }

    #[test]
    fn test_blank_headers_fall_back_to_anonymous() {
        let id = CallerIdentity::from_headers(&headers(&[("x-user-id", "   ")]));
        assert_eq!(id.as_str(), ANONYMOUS_IDENTITY);
    }
}
