//! HTTP generator client.
//!
//! Calls the external generation service's JSON endpoints:
//!
//! - `POST /v1/lessons` — `{subject, topicLabel, model, context}` →
//!   [`LessonDraft`] body
//! - `POST /v1/paths` — `{subject, course, outline, masteryEstimate,
//!   paceNote}` → [`LearningPath`] body
//!
//! Status mapping: 402/403 → `UsageLimitExceeded`; 422 → `InvalidFormat`;
//! 429/5xx → retryable `Api`; other non-2xx → terminal `Api`. Malformed
//! success bodies are `InvalidFormat` — transient and retryable, per the
//! delivery contract.

use std::time::Duration;

use metrics::{counter, histogram};
use serde_json::json;
use tracing::{debug, instrument, warn};

use mentor_core::path::LearningPath;

use crate::errors::{GeneratorError, GeneratorResult};
use crate::generator::Generator;
use crate::types::{LessonDraft, LessonRequest, ModelSpeed, PathRequest};

/// Configuration for the HTTP generator.
#[derive(Clone, Debug)]
pub struct HttpGeneratorConfig {
    /// Base URL of the generation service.
    pub base_url: String,
    /// Bearer API key; empty disables the auth header.
    pub api_key: String,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Model ID for [`ModelSpeed::Fast`].
    pub fast_model: String,
    /// Model ID for [`ModelSpeed::Slow`].
    pub slow_model: String,
}

/// HTTP-backed generator.
pub struct HttpGenerator {
    config: HttpGeneratorConfig,
    client: reqwest::Client,
}

impl HttpGenerator {
    /// Create a new HTTP generator.
    #[must_use]
    pub fn new(config: HttpGeneratorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// Create with a shared HTTP client.
    #[must_use]
    pub fn with_client(config: HttpGeneratorConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn model_for(&self, speed: ModelSpeed) -> &str {
        match speed {
            ModelSpeed::Fast => &self.config.fast_model,
            ModelSpeed::Slow => &self.config.slow_model,
        }
    }

    async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> GeneratorResult<serde_json::Value> {
        let mut request = self.client.post(self.endpoint(path)).json(&body);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let started = std::time::Instant::now();
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GeneratorError::Timeout
            } else {
                GeneratorError::Http(e)
            }
        })?;
        histogram!("generator_request_duration_seconds").record(started.elapsed().as_secs_f64());

        let status = response.status();
        if status.is_success() {
            let value: serde_json::Value = response.json().await.map_err(|e| {
                GeneratorError::InvalidFormat {
                    message: format!("unparseable response body: {e}"),
                }
            })?;
            return Ok(value);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_owned());
        counter!("generator_errors_total", "status" => status.as_u16().to_string()).increment(1);
        warn!(status = status.as_u16(), "generator call failed");

        Err(match status.as_u16() {
            402 | 403 => GeneratorError::UsageLimitExceeded { message },
            422 => GeneratorError::InvalidFormat { message },
            429 => GeneratorError::Api {
                status: 429,
                message,
                retryable: true,
            },
            s if status.is_server_error() => GeneratorError::Api {
                status: s,
                message,
                retryable: true,
            },
            s => GeneratorError::Api {
                status: s,
                message,
                retryable: false,
            },
        })
    }
}

#[async_trait::async_trait]
impl Generator for HttpGenerator {
    #[instrument(skip(self, request), fields(topic_label = %request.topic_label))]
    async fn generate_lesson(&self, request: &LessonRequest) -> GeneratorResult<LessonDraft> {
        let body = json!({
            "subject": request.subject,
            "topicLabel": request.topic_label,
            "model": self.model_for(request.model_speed),
            "context": request.context,
        });
        let value = self.post_json("/v1/lessons", body).await?;
        let draft: LessonDraft =
            serde_json::from_value(value).map_err(|e| GeneratorError::InvalidFormat {
                message: format!("draft shape mismatch: {e}"),
            })?;
        debug!(title = %draft.title, "lesson draft received");
        Ok(draft)
    }

    #[instrument(skip(self, request), fields(subject = %request.subject))]
    async fn generate_path(&self, request: &PathRequest) -> GeneratorResult<LearningPath> {
        let body = json!({
            "subject": request.subject,
            "course": request.course,
            "outline": request.outline,
            "masteryEstimate": request.mastery_estimate,
            "paceNote": request.pace_note,
            "model": self.config.slow_model,
        });
        let value = self.post_json("/v1/paths", body).await?;
        let path: LearningPath =
            serde_json::from_value(value).map_err(|e| GeneratorError::InvalidFormat {
                message: format!("path shape mismatch: {e}"),
            })?;
        debug!(topics = path.topics.len(), "path synthesized");
        Ok(path)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use mentor_core::context::{KnowledgeFragment, StructuredContext};
    use mentor_core::progress::Pace;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> HttpGeneratorConfig {
        HttpGeneratorConfig {
            base_url,
            api_key: String::new(),
            timeout: Duration::from_secs(5),
            fast_model: "lesson-fast-1".into(),
            slow_model: "lesson-deep-1".into(),
        }
    }

    fn request() -> LessonRequest {
        LessonRequest {
            subject: "Algebra 1".into(),
            topic_label: "Topic 1 > Subtopic 1".into(),
            context: StructuredContext {
                focus_label: "Topic 1 > Subtopic 1".into(),
                pace: Pace::Fast,
                accuracy_pct: Some(90),
                knowledge: KnowledgeFragment::default(),
                style_cues: vec!["stretch".into()],
                avoid_titles: vec![],
            },
            model_speed: ModelSpeed::Fast,
        }
    }

    #[tokio::test]
    async fn lesson_success_parses_draft() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/lessons"))
            .and(body_partial_json(serde_json::json!({
                "model": "lesson-fast-1",
                "topicLabel": "Topic 1 > Subtopic 1",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "title": "Stretch Problems",
                "explanation": "Push beyond the basics.",
            })))
            .mount(&server)
            .await;

        let generator = HttpGenerator::new(config(server.uri()));
        let draft = generator.generate_lesson(&request()).await.unwrap();
        assert_eq!(draft.title, "Stretch Problems");
    }

    #[tokio::test]
    async fn quota_status_maps_to_usage_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/lessons"))
            .respond_with(ResponseTemplate::new(403).set_body_string("quota exhausted"))
            .mount(&server)
            .await;

        let generator = HttpGenerator::new(config(server.uri()));
        let err = generator.generate_lesson(&request()).await.unwrap_err();
        assert_matches!(err, GeneratorError::UsageLimitExceeded { .. });
    }

    #[tokio::test]
    async fn unprocessable_maps_to_invalid_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/lessons"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad draft"))
            .mount(&server)
            .await;

        let generator = HttpGenerator::new(config(server.uri()));
        let err = generator.generate_lesson(&request()).await.unwrap_err();
        assert_matches!(err, GeneratorError::InvalidFormat { .. });
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn server_error_is_retryable_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/lessons"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let generator = HttpGenerator::new(config(server.uri()));
        let err = generator.generate_lesson(&request()).await.unwrap_err();
        assert_matches!(err, GeneratorError::Api { retryable: true, .. });
    }

    #[tokio::test]
    async fn malformed_success_body_is_invalid_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/lessons"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let generator = HttpGenerator::new(config(server.uri()));
        let err = generator.generate_lesson(&request()).await.unwrap_err();
        assert_matches!(err, GeneratorError::InvalidFormat { .. });
    }

    #[tokio::test]
    async fn path_success_parses_learning_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/paths"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "topics": [
                    {
                        "name": "Linear Equations",
                        "subtopics": [
                            {"name": "One-Step", "miniLessonCount": 3}
                        ]
                    }
                ]
            })))
            .mount(&server)
            .await;

        let generator = HttpGenerator::new(config(server.uri()));
        let learning_path = generator
            .generate_path(&PathRequest {
                subject: "Algebra 1".into(),
                course: "Math Foundations".into(),
                outline: "Linear equations first".into(),
                mastery_estimate: "beginner".into(),
                pace_note: "steady".into(),
            })
            .await
            .unwrap();
        assert_eq!(learning_path.topics.len(), 1);
        assert_eq!(learning_path.topics[0].subtopics[0].mini_lesson_count, 3);
    }
}
