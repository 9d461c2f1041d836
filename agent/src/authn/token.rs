//! API token validation
//!
//! Source-control hosts cannot send custom headers with webhooks, so the
//! webhook route carries the token as a path segment; every other
//! authenticated route uses the `api-token` header.

use axum::http::HeaderMap;

/// Header carrying the API token
pub const API_TOKEN_HEADER: &str = "api-token";

/// Extract the API token from request headers
pub fn header_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
}

/// Validate a presented token against the configured one.
///
/// An empty configured token rejects everything rather than matching an
/// empty presentation.
pub fn validate_token(presented: Option<&str>, expected: &str) -> bool {
    match presented {
        Some(token) => !expected.is_empty() && token == expected,
        None => false,
    }
}
