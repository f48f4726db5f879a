//! `MentorServer` — Axum HTTP server assembly.

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::routes;
use crate::state::AppState;

/// The Mentor HTTP server.
pub struct MentorServer {
    config: ServerConfig,
    state: AppState,
}

impl MentorServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind and serve until the cancellation token fires.
    pub async fn serve(
        &self,
        cancel: tokio_util::sync::CancellationToken,
    ) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        tracing::info!(addr = %listener.local_addr()?, "mentor server listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
    }
}

/// Build the router over shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/lesson", get(routes::lesson::get_lesson))
        .route("/generate-pending", post(routes::pending::generate_pending))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(crate::metrics::render)
        .unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Test support
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use mentor_embeddings::MockEmbeddingService;
    use mentor_engine::DeliveryOrchestrator;
    use mentor_engine::producer::PendingProducer;
    use mentor_llm::MockGenerator;
    use mentor_settings::EngineSettings;
    use mentor_store::{CurriculumRow, StateStore};

    use super::build_router;
    use crate::state::AppState;

    /// Router over an in-memory store seeded with one curriculum.
    pub async fn test_app() -> Router {
        let store = Arc::new(StateStore::open_in_memory().unwrap());
        store
            .upsert_curriculum(&CurriculumRow {
                subject: "Algebra 1".into(),
                course: "Math Foundations".into(),
                outline: "Linear equations, inequalities, graphing".into(),
            })
            .unwrap();

        let generator = Arc::new(MockGenerator::new()) as Arc<dyn mentor_llm::Generator>;
        let embedder = Arc::new(MockEmbeddingService::new(8));
        let settings = EngineSettings::default();

        let orchestrator = Arc::new(DeliveryOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&generator),
            Arc::clone(&embedder) as Arc<dyn mentor_embeddings::EmbeddingService>,
            settings.clone(),
            None,
        ));
        let producer = Arc::new(PendingProducer::new(
            store,
            generator,
            embedder,
            settings,
        ));

        build_router(AppState::new(orchestrator, producer, None))
    }

    /// Run one request and parse the JSON body.
    pub async fn request_json(
        app: &Router,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1_000_000)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
