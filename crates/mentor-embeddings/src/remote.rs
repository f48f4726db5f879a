//! HTTP-backed embedding service.
//!
//! Calls the external embedding endpoint with a JSON batch request:
//!
//! ```json
//! { "texts": ["..."] }
//! ```
//!
//! and expects `{ "embeddings": [[f32, ...], ...] }` back. Any failure here
//! degrades the caller to "similarity unknown — accept"; nothing in the
//! delivery path treats an embedding error as fatal.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::errors::{EmbeddingError, Result};
use crate::service::EmbeddingService;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Remote embedding service over HTTP.
pub struct RemoteEmbeddingService {
    client: reqwest::Client,
    base_url: String,
    dims: usize,
}

impl RemoteEmbeddingService {
    /// Create a new remote service.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration, dims: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            dims,
        }
    }

    /// Create with a shared HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>, dims: usize) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            dims,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/embed", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl EmbeddingService for RemoteEmbeddingService {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&EmbedRequest { texts })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "status {status}"
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        if body.embeddings.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} vectors, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }
        debug!(count = body.embeddings.len(), "embeddings received");
        Ok(body.embeddings)
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn embed_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[0.6, 0.8]]
            })))
            .mount(&server)
            .await;

        let svc = RemoteEmbeddingService::new(server.uri(), Duration::from_secs(5), 2);
        let out = svc.embed_single("hello").await.unwrap();
        assert_eq!(out, vec![0.6, 0.8]);
    }

    #[tokio::test]
    async fn embed_rejects_count_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": []
            })))
            .mount(&server)
            .await;

        let svc = RemoteEmbeddingService::new(server.uri(), Duration::from_secs(5), 2);
        let err = svc.embed_single("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn embed_surfaces_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let svc = RemoteEmbeddingService::new(server.uri(), Duration::from_secs(5), 2);
        let err = svc.embed_single("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
    }
}
