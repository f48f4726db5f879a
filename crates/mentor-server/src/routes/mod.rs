//! Route handlers for the delivery API.

pub mod lesson;
pub mod pending;

use axum::http::HeaderMap;

use mentor_core::ids::UserId;

use crate::errors::ApiError;

/// Extract the learner identity from the `X-User-Id` header.
///
/// Session management is an upstream concern; by the time a request reaches
/// this service the gateway has resolved the session to a user ID. A missing
/// or empty header is a 401.
pub(crate) fn user_from_headers(headers: &HeaderMap) -> Result<UserId, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(UserId::from)
        .ok_or_else(ApiError::not_authenticated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_header_is_unauthenticated() {
        let headers = HeaderMap::new();
        assert!(user_from_headers(&headers).is_err());
    }

    #[test]
    fn empty_header_is_unauthenticated() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-user-id", HeaderValue::from_static("  "));
        assert!(user_from_headers(&headers).is_err());
    }

    #[test]
    fn valid_header_extracts_user() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-user-id", HeaderValue::from_static("learner-1"));
        assert_eq!(user_from_headers(&headers).unwrap().as_str(), "learner-1");
    }
}
