//! `GET /lesson` — the delivery endpoint.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use mentor_engine::{DeliveryRequest, DeliveryResponse, EngineError};

use crate::errors::{ApiError, generating_response};
use crate::routes::user_from_headers;
use crate::state::AppState;

/// Query parameters for `GET /lesson`.
#[derive(Debug, Deserialize)]
pub struct LessonQuery {
    /// Explicit subject; resolved from learner state when absent.
    pub subject: Option<String>,
    /// Prefetch candidates wanted (0–3).
    pub prefetch: Option<usize>,
}

/// Handle `GET /lesson`.
pub async fn get_lesson(
    State(state): State<AppState>,
    Query(query): Query<LessonQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = user_from_headers(&headers)?;
    let prefetch = query.prefetch.unwrap_or(0);
    if prefetch > 3 {
        return Err(ApiError::invalid_params("prefetch must be between 0 and 3"));
    }

    let request = DeliveryRequest {
        user,
        subject: query.subject.filter(|s| !s.trim().is_empty()),
        prefetch,
    };

    match state.orchestrator.next_lesson(&request).await {
        Ok(DeliveryResponse::Lesson(payload)) => Ok(Json(*payload).into_response()),
        Ok(DeliveryResponse::Generating { retry_after_secs })
        | Err(EngineError::Generating { retry_after_secs }) => {
            Ok(generating_response(retry_after_secs))
        }
        Err(err) => Err(err.into()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::server::test_support::{request_json, test_app};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn missing_user_header_is_401() {
        let app = test_app().await;
        let (status, body) = request_json(&app, "GET", "/lesson?subject=Algebra+1", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "NOT_AUTHENTICATED");
    }

    #[tokio::test]
    async fn delivers_lesson_with_next_topic_hint() {
        let app = test_app().await;
        let (status, body) = request_json(
            &app,
            "GET",
            "/lesson?subject=Algebra+1",
            Some("learner-1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subject"], "Algebra 1");
        assert!(body["lesson"]["title"].is_string());
        assert!(body["topic"].as_str().unwrap().contains(" > "));
        assert!(body["nextTopicHint"].is_string());
        assert_eq!(body["source"], "generated");
    }

    #[tokio::test]
    async fn unknown_subject_is_not_ready_400() {
        let app = test_app().await;
        let (status, body) = request_json(
            &app,
            "GET",
            "/lesson?subject=Basketweaving",
            Some("learner-1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "NOT_READY");
    }

    #[tokio::test]
    async fn no_subject_resolvable_is_400() {
        let app = test_app().await;
        let (status, body) =
            request_json(&app, "GET", "/lesson", Some("nobody"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "NO_SUBJECT");
    }

    #[tokio::test]
    async fn oversized_prefetch_is_400() {
        let app = test_app().await;
        let (status, body) = request_json(
            &app,
            "GET",
            "/lesson?subject=Algebra+1&prefetch=7",
            Some("learner-1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_PARAMS");
    }
}
