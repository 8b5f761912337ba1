//! Common API utilities and shared types
//!
//! This module contains shared utilities used across multiple API endpoints.

use axum::{
    body::Bytes,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use serde::{de::DeserializeOwned, Deserialize};

use super::middleware::{ApiError, AuthenticatedUser};
use crate::models::{AdminContext, ListParams};

// ============================================================================
// Pagination
// ============================================================================

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

/// Default page size for admin listings
pub fn default_per_page() -> u32 {
    20
}

/// Pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl PaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

// ============================================================================
// Request bodies
// ============================================================================

/// Decode a required JSON body, reporting malformed input as a
/// `VALIDATION_ERROR` instead of axum's plain-text rejection
pub fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::validation_error(format!("Invalid request body: {}", e)))
}

#[derive(Debug, Deserialize)]
struct ReasonBody {
    reason: Option<String>,
}

/// Read the optional `{"reason": ...}` body of hide and delete requests.
///
/// An empty body means no reason; whether one is required is up to the
/// service.
pub fn parse_reason(body: &Bytes) -> Result<Option<String>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let parsed: ReasonBody = parse_body(body)?;
    Ok(parsed.reason)
}

// ============================================================================
// Client identity
// ============================================================================

/// Client address: first `X-Forwarded-For` entry, then `X-Real-IP`,
/// else "unknown"
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').next().map(str::trim) {
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let ip = real_ip.trim();
        if !ip.is_empty() {
            return ip.to_string();
        }
    }

    "unknown".to_string()
}

/// The acting admin, built from the authenticated user and request headers.
///
/// Only mounted behind `require_admin`, so the role is already checked.
pub struct Admin(pub AdminContext);

impl<S> FromRequestParts<S> for Admin
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;
        Ok(Admin(AdminContext::new(
            user.id,
            user.email,
            client_ip(&parts.headers),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_precedence() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers), "10.0.0.2");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), "203.0.113.7");
    }

    #[test]
    fn test_parse_reason() {
        assert_eq!(parse_reason(&Bytes::new()).unwrap(), None);
        assert_eq!(
            parse_reason(&Bytes::from_static(br#"{"reason":"spam"}"#)).unwrap(),
            Some("spam".to_string())
        );
        assert_eq!(parse_reason(&Bytes::from_static(b"{}")).unwrap(), None);
        assert!(parse_reason(&Bytes::from_static(b"not json")).is_err());
    }

    #[test]
    fn test_parse_body() {
        #[derive(Debug, Deserialize)]
        struct Input {
            package_id: i64,
        }

        let input: Input = parse_body(&Bytes::from_static(br#"{"package_id":3}"#)).unwrap();
        assert_eq!(input.package_id, 3);
        let malformed: [&[u8]; 4] = [b"", b"{", br#"{"package_id":"three"}"#, b"{}"];
        for raw in malformed {
            let err = parse_body::<Input>(&Bytes::copy_from_slice(raw)).unwrap_err();
            assert_eq!(err.error.code, "VALIDATION_ERROR");
        }
    }

    #[test]
    fn test_pagination_is_clamped() {
        let query = PaginationQuery {
            page: 0,
            per_page: 1000,
        };
        let params = query.params();
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
    }
}
