//! API error codes and engine-error → HTTP response mapping.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use mentor_engine::EngineError;

// ── Error code constants ────────────────────────────────────────────

/// No session identity on the request.
pub const NOT_AUTHENTICATED: &str = "NOT_AUTHENTICATED";
/// No subject could be resolved.
pub const NO_SUBJECT: &str = "NO_SUBJECT";
/// Subject has no curriculum mapping yet.
pub const NOT_READY: &str = "NOT_READY";
/// Generation quota exhausted.
pub const USAGE_LIMIT_EXCEEDED: &str = "USAGE_LIMIT_EXCEEDED";
/// Invalid or missing parameters.
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
/// Unexpected internal error.
pub const SERVER_ERROR: &str = "SERVER_ERROR";

/// Wire-format error body: `{"error": {"code", "message"}}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// The error payload.
    pub error: ErrorDetail,
}

/// Inner error payload.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// API-level error with an HTTP status.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    /// HTTP status.
    pub status: StatusCode,
    /// Machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl ApiError {
    /// 401 — missing session identity.
    pub fn not_authenticated() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: NOT_AUTHENTICATED,
            message: "missing X-User-Id header".into(),
        }
    }

    /// 400 — bad request parameters.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: INVALID_PARAMS,
            message: message.into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let (status, code) = match &err {
            EngineError::NoSubject => (StatusCode::BAD_REQUEST, NO_SUBJECT),
            EngineError::NotReady { .. } => (StatusCode::BAD_REQUEST, NOT_READY),
            // 202-with-retry is handled by the route before conversion; a
            // Generating that falls through here still signals retryable.
            EngineError::Generating { .. } => (StatusCode::ACCEPTED, "GENERATING"),
            EngineError::UsageLimitExceeded { .. } => {
                (StatusCode::FORBIDDEN, USAGE_LIMIT_EXCEEDED)
            }
            EngineError::Store(_) | EngineError::Generator(_) | EngineError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR)
            }
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Internals are logged, not leaked.
            tracing::error!(error = %err, "request failed");
            "internal server error".to_owned()
        } else {
            err.to_string()
        };
        Self {
            status,
            code,
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: ErrorDetail {
                code: self.code.to_owned(),
                message: self.message,
            },
        });
        (self.status, body).into_response()
    }
}

/// Build the 202 "generating" response with a `Retry-After` header.
pub fn generating_response(retry_after_secs: u64) -> Response {
    let body = Json(serde_json::json!({
        "status": "generating",
        "progress": "lesson generation in progress",
    }));
    let mut response = (StatusCode::ACCEPTED, body).into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
        let _ = response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subject_maps_to_400() {
        let api: ApiError = EngineError::NoSubject.into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.code, NO_SUBJECT);
    }

    #[test]
    fn not_ready_maps_to_400() {
        let api: ApiError = EngineError::NotReady {
            message: "no curriculum".into(),
        }
        .into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.code, NOT_READY);
    }

    #[test]
    fn usage_limit_maps_to_403() {
        let api: ApiError = EngineError::UsageLimitExceeded {
            message: "quota".into(),
        }
        .into();
        assert_eq!(api.status, StatusCode::FORBIDDEN);
        assert_eq!(api.code, USAGE_LIMIT_EXCEEDED);
    }

    #[test]
    fn internal_errors_map_to_500_without_leaking() {
        let api: ApiError = EngineError::Internal("secret detail".into()).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.code, SERVER_ERROR);
        assert!(!api.message.contains("secret"));
    }

    #[test]
    fn generating_response_carries_retry_after() {
        let response = generating_response(3);
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            &HeaderValue::from_static("3")
        );
    }

    #[test]
    fn not_authenticated_is_401() {
        let api = ApiError::not_authenticated();
        assert_eq!(api.status, StatusCode::UNAUTHORIZED);
        assert_eq!(api.code, NOT_AUTHENTICATED);
    }
}
