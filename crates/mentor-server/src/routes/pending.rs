//! `POST /generate-pending` — explicit queue top-up.
//!
//! Unlike the opportunistic background producer, this endpoint runs a
//! production pass synchronously and reports what it enqueued. The pass is
//! still capacity-limited: it never pushes the queue past its max depth.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use mentor_engine::producer::ProduceRequest;

use crate::errors::ApiError;
use crate::routes::user_from_headers;
use crate::state::AppState;

/// Request body for `POST /generate-pending`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePendingBody {
    /// Subject to produce for.
    pub subject: String,
    /// Explicit focus label; defaults to the cursor's current label.
    pub topic_label: Option<String>,
    /// Lessons requested (clamped to remaining queue capacity).
    pub count: Option<usize>,
}

/// Response body for `POST /generate-pending`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePendingResponse {
    /// Lessons actually generated and enqueued.
    pub generated: usize,
    /// IDs of the enqueued lessons.
    pub lesson_ids: Vec<String>,
    /// Queue depth after the pass.
    pub current_count: usize,
    /// Configured max depth.
    pub max_count: usize,
}

/// Handle `POST /generate-pending`.
pub async fn generate_pending(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<GeneratePendingBody>,
) -> Result<Json<GeneratePendingResponse>, ApiError> {
    let user = user_from_headers(&headers)?;
    if body.subject.trim().is_empty() {
        return Err(ApiError::invalid_params("subject must not be empty"));
    }

    let report = state
        .producer
        .produce(&ProduceRequest {
            user,
            subject: body.subject.trim().to_owned(),
            topic_label: body.topic_label,
            count: body.count.unwrap_or(1).min(8),
        })
        .await?;

    Ok(Json(GeneratePendingResponse {
        generated: report.generated,
        lesson_ids: report.lesson_ids,
        current_count: report.current_depth,
        max_count: report.max_depth,
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
