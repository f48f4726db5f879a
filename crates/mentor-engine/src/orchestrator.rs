//! Delivery orchestrator — the request-level state machine.
//!
//! `ResolveSubject → EnsurePath → ComputeFocus → TryCache → TryPending →
//! Generate → Persist → Respond`. Cache and queue failures degrade to the
//! next source; only generator and store failures on the critical path
//! surface as errors. `Generating` is a retryable signal, never terminal.
//!
//! Live generation runs in a spawned task awaited with a bounded timeout:
//! a timeout (or a disconnected caller dropping this future) does not
//! cancel the task, and its result is cached opportunistically for the
//! next request.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use mentor_core::ids::UserId;
use mentor_core::lesson::{CachedLesson, Lesson};
use mentor_core::path::AdvanceOutcome;
use mentor_core::progress::{ProgressSnapshot, accuracy_band};
use mentor_embeddings::{Deduplicator, EmbeddingService};
use mentor_llm::{Generator, GeneratorError, LessonRequest, ModelSpeed, validate_draft};
use mentor_settings::EngineSettings;
use mentor_store::{PathStateRecord, StateKey, StateStore, TopicKey};

use crate::cache::LessonCache;
use crate::context::{ContextAssembler, DeliveryContext, gather_context};
use crate::errors::{EngineError, EngineResult};
use crate::pathstate::{EnsureOutcome, PathState, next_incomplete_after};
use crate::pending::PendingQueue;
use crate::producer::{ProduceRequest, ProducerHandle, embedding_text};
use crate::rollup::ProgressRollup;
use crate::writer::ProgressWriter;

/// A lesson delivery request.
#[derive(Clone, Debug)]
pub struct DeliveryRequest {
    /// The learner.
    pub user: UserId,
    /// Explicit subject; resolved from state or interests when absent.
    pub subject: Option<String>,
    /// Prefetch candidates wanted (0–3).
    pub prefetch: usize,
}

/// Which source served the lesson.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliverySource {
    /// Warm per-topic cache.
    Cache,
    /// Pre-generated pending queue.
    Pending,
    /// Live generation call.
    Generated,
}

impl DeliverySource {
    /// Metrics label for the source.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Pending => "pending",
            Self::Generated => "generated",
        }
    }
}

/// A served lesson plus response metadata.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredPayload {
    /// Resolved subject.
    pub subject: String,
    /// Focus label the lesson was served under.
    pub topic: String,
    /// The lesson itself.
    pub lesson: Lesson,
    /// Which source produced it.
    pub source: DeliverySource,
    /// Label of the next incomplete subtopic, if any.
    pub next_topic_hint: Option<String>,
    /// Additional warm candidates, when requested.
    pub prefetch: Vec<Lesson>,
}

/// Outcome of a delivery request.
#[derive(Clone, Debug)]
pub enum DeliveryResponse {
    /// A lesson was served.
    Lesson(Box<DeliveredPayload>),
    /// Generation is in progress; retry after the hint.
    Generating {
        /// Suggested retry delay in seconds.
        retry_after_secs: u64,
    },
}

/// The delivery orchestrator.
pub struct DeliveryOrchestrator {
    store: Arc<StateStore>,
    generator: Arc<dyn Generator>,
    embedder: Arc<dyn EmbeddingService>,
    path_state: PathState,
    rollup: ProgressRollup,
    assembler: ContextAssembler,
    cache: LessonCache,
    pending: PendingQueue,
    writer: ProgressWriter,
    dedup: Deduplicator,
    producer: Option<ProducerHandle>,
    settings: EngineSettings,
}

impl DeliveryOrchestrator {
    /// Wire up an orchestrator over shared collaborators.
    pub fn new(
        store: Arc<StateStore>,
        generator: Arc<dyn Generator>,
        embedder: Arc<dyn EmbeddingService>,
        settings: EngineSettings,
        producer: Option<ProducerHandle>,
    ) -> Self {
        let dedup = Deduplicator::new(settings.similarity_threshold);
        Self {
            path_state: PathState::new(
                Arc::clone(&store),
                Arc::clone(&generator),
                settings.clone(),
            ),
            rollup: ProgressRollup::new(Arc::clone(&store), settings.clone()),
            assembler: ContextAssembler::new(settings.clone()),
            cache: LessonCache::new(Arc::clone(&store), dedup.clone(), settings.clone()),
            pending: PendingQueue::new(Arc::clone(&store), dedup.clone(), settings.clone()),
            writer: ProgressWriter::new(Arc::clone(&store), settings.clone()),
            dedup,
            store,
            generator,
            embedder,
            producer,
            settings,
        }
    }

    /// Serve the next lesson for a learner.
    #[instrument(skip(self, request), fields(user = %request.user))]
    pub async fn next_lesson(&self, request: &DeliveryRequest) -> EngineResult<DeliveryResponse> {
        counter!("lesson_requests_total").increment(1);

        // ResolveSubject
        let subject = self.resolve_subject(&request.user, request.subject.as_deref())?;
        let key = StateKey::new(request.user.clone(), subject.clone());

        // Metrics rollup feeds both path synthesis hints and the persona.
        let (snapshot, recomputed) = self.rollup.current(&key)?;
        let snapshot_refresh = recomputed.then(|| snapshot.clone());

        // EnsurePath
        let mastery = mastery_estimate(&snapshot);
        let pace_note = format!("pace {}", snapshot.pace.as_str());
        let mut record = match self.path_state.ensure(&key, &mastery, &pace_note).await? {
            EnsureOutcome::Ready(record) => record,
            EnsureOutcome::Generating { retry_after_secs } => {
                return Ok(DeliveryResponse::Generating { retry_after_secs });
            }
        };

        // ComputeFocus
        match PathState::advance(&record) {
            AdvanceOutcome::Unchanged(cursor) | AdvanceOutcome::Moved(cursor) => {
                record.cursor = cursor;
            }
            AdvanceOutcome::Exhausted => {
                // Every subtopic is complete: keep reinforcing the current
                // position rather than failing the learner.
                if !record.cursor.in_bounds(&record.path) {
                    record.cursor = Default::default();
                }
                debug!(subject = %key.subject, "path exhausted, serving review lesson");
            }
        }
        let focus_label = record
            .path
            .label_at(record.cursor.topic_index, record.cursor.subtopic_index)
            .ok_or_else(|| EngineError::Internal("cursor out of bounds after advance".into()))?;
        let topic_key = TopicKey::new(key.clone(), focus_label.clone());

        let gathered = gather_context(
            &self.store,
            &self.assembler,
            &key,
            &record,
            &focus_label,
            &snapshot,
        )?;

        // TryCache
        if let Some(hit) = self.try_cache(&topic_key, &gathered) {
            degrade_on_err(
                self.cache.touch(&topic_key, hit.lesson.id.as_str()),
                "cache touch",
            );
            return Ok(self.respond(
                &key,
                &record,
                &focus_label,
                hit.lesson.clone(),
                hit.embedding.clone(),
                DeliverySource::Cache,
                snapshot_refresh,
                &gathered,
                request.prefetch,
            ));
        }

        // TryPending
        if let Some(pending) = self.try_pending(&key, &focus_label, &gathered) {
            return Ok(self.respond(
                &key,
                &record,
                &focus_label,
                pending.lesson,
                pending.embedding,
                DeliverySource::Pending,
                snapshot_refresh,
                &gathered,
                request.prefetch,
            ));
        }

        // Generate
        let (lesson, embedding) = match self
            .generate_live(&key, &topic_key, &record, &focus_label, &gathered)
            .await
        {
            Ok(generated) => generated,
            Err(EngineError::Generating { retry_after_secs }) => {
                return Ok(DeliveryResponse::Generating { retry_after_secs });
            }
            Err(e) => return Err(e),
        };

        // A freshly generated near-duplicate is still served — regeneration
        // would cost another full call — but the event is recorded.
        let verdict = self
            .dedup
            .check(embedding.as_deref(), &gathered.recent_embeddings);
        if !verdict.is_acceptable() {
            counter!("near_duplicate_served_total").increment(1);
            warn!(lesson_id = %lesson.id, "serving near-duplicate generated lesson");
        }

        Ok(self.respond(
            &key,
            &record,
            &focus_label,
            lesson,
            embedding,
            DeliverySource::Generated,
            snapshot_refresh,
            &gathered,
            request.prefetch,
        ))
    }

    // ── ResolveSubject ──────────────────────────────────────────────────

    fn resolve_subject(&self, user: &UserId, explicit: Option<&str>) -> EngineResult<String> {
        if let Some(subject) = explicit.map(str::trim).filter(|s| !s.is_empty()) {
            return Ok(subject.to_owned());
        }

        let subjects = self.store.list_subjects(user)?;
        if let Some(most_recent) = subjects.first() {
            return Ok(most_recent.subject.clone());
        }

        if let Some(profile) = self.store.get_profile(user)? {
            for interest in &profile.interests {
                if self.store.get_curriculum(interest)?.is_some() {
                    return Ok(interest.clone());
                }
            }
        }

        Err(EngineError::NoSubject)
    }

    // ── Sources ─────────────────────────────────────────────────────────

    fn try_cache(&self, topic_key: &TopicKey, gathered: &DeliveryContext) -> Option<CachedLesson> {
        match self.cache.find_hit(
            topic_key,
            &gathered.persona_hash,
            &gathered.guardrails,
            &gathered.recent_embeddings,
        ) {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, "cache lookup failed, skipping source");
                None
            }
        }
    }

    fn try_pending(
        &self,
        key: &StateKey,
        focus_label: &str,
        gathered: &DeliveryContext,
    ) -> Option<mentor_core::lesson::PendingLesson> {
        match self.pending.take_valid(
            key,
            focus_label,
            &gathered.persona_hash,
            &gathered.guardrails,
            &gathered.recent_embeddings,
        ) {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "pending lookup failed, skipping source");
                None
            }
        }
    }

    /// Live generation in a spawned task with a bounded timeout.
    ///
    /// The task validates, embeds, and caches its lesson itself, so a
    /// timed-out or abandoned request still leaves a warm cache entry.
    async fn generate_live(
        &self,
        key: &StateKey,
        topic_key: &TopicKey,
        record: &PathStateRecord,
        focus_label: &str,
        gathered: &DeliveryContext,
    ) -> EngineResult<(Lesson, Option<Vec<f32>>)> {
        let generator = Arc::clone(&self.generator);
        let embedder = Arc::clone(&self.embedder);
        let store = Arc::clone(&self.store);
        let settings = self.settings.clone();
        let request = LessonRequest {
            subject: key.subject.clone(),
            topic_label: focus_label.to_owned(),
            context: gathered.context.clone(),
            model_speed: ModelSpeed::Fast,
        };
        let persona_hash = gathered.persona_hash.clone();
        let next_hint = next_incomplete_after(&record.path, &record.completion, record.cursor);
        let topic_key = topic_key.clone();
        let focus = focus_label.to_owned();

        let task = tokio::spawn(async move {
            let draft = generator.generate_lesson(&request).await?;
            let lesson = validate_draft(draft, &focus)?;

            let embedding = match embedder.embed_single(&embedding_text(&lesson)).await {
                Ok(v) => Some(v),
                Err(e) => {
                    debug!(error = %e, "embedding unavailable, similarity unknown");
                    None
                }
            };

            // Cache opportunistically even if nobody is waiting anymore.
            let entry = mentor_core::lesson::CachedLesson {
                lesson: lesson.clone(),
                cached_at: chrono::Utc::now(),
                persona_hash,
                embedding: embedding.clone(),
                next_topic_hint: next_hint,
            };
            if let Err(e) = store.put_lesson_cache(&topic_key, &entry, settings.cache_cap) {
                warn!(error = %e, "failed to cache generated lesson");
            }

            Ok::<_, GeneratorError>((lesson, embedding))
        });

        let timeout = Duration::from_secs(self.settings.generation_timeout_secs);
        match tokio::time::timeout(timeout, task).await {
            // Timeout: the task keeps running and caches its result.
            Err(_elapsed) => {
                counter!("generation_timeouts_total").increment(1);
                Err(EngineError::Generating {
                    retry_after_secs: self.settings.retry_after_secs,
                })
            }
            Ok(Err(join_error)) => Err(EngineError::Internal(format!(
                "generation task failed: {join_error}"
            ))),
            Ok(Ok(Ok(generated))) => Ok(generated),
            Ok(Ok(Err(e))) => {
                counter!("generation_errors_total", "category" => e.category()).increment(1);
                Err(match e {
                    GeneratorError::InvalidFormat { message } => {
                        info!(%message, "transient format error, signaling retry");
                        EngineError::Generating {
                            retry_after_secs: self.settings.retry_after_secs,
                        }
                    }
                    GeneratorError::UsageLimitExceeded { message } => {
                        EngineError::UsageLimitExceeded { message }
                    }
                    other => EngineError::Generator(other),
                })
            }
        }
    }

    // ── Persist + Respond ───────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn respond(
        &self,
        key: &StateKey,
        record: &PathStateRecord,
        focus_label: &str,
        lesson: Lesson,
        embedding: Option<Vec<f32>>,
        source: DeliverySource,
        snapshot_refresh: Option<ProgressSnapshot>,
        gathered: &DeliveryContext,
        prefetch: usize,
    ) -> DeliveryResponse {
        counter!("lessons_served_total", "source" => source.as_str()).increment(1);

        // Persist (failures logged, the computed response is never wasted).
        let outcome = self.writer.persist_or_log(
            key,
            record,
            focus_label,
            &lesson,
            embedding,
            snapshot_refresh,
        );
        let next_topic_hint = outcome.map_or_else(
            || next_incomplete_after(&record.path, &record.completion, record.cursor),
            |o| o.next_topic_hint,
        );

        let prefetch_lessons = match self.cache.prefetch_candidates(
            &TopicKey::new(key.clone(), focus_label.to_owned()),
            &gathered.persona_hash,
            &gathered.guardrails,
            lesson.id.as_str(),
            prefetch.min(3),
        ) {
            Ok(lessons) => lessons,
            Err(e) => {
                warn!(error = %e, "prefetch lookup failed");
                Vec::new()
            }
        };

        // Leave an artifact request for the background producer; never wait.
        if let Some(producer) = &self.producer {
            let _ = producer.nudge(ProduceRequest {
                user: key.user.clone(),
                subject: key.subject.clone(),
                topic_label: None,
                count: 1,
            });
        }

        DeliveryResponse::Lesson(Box::new(DeliveredPayload {
            subject: key.subject.clone(),
            topic: focus_label.to_owned(),
            lesson,
            source,
            next_topic_hint,
            prefetch: prefetch_lessons,
        }))
    }
}

fn degrade_on_err<T>(result: EngineResult<T>, what: &str) {
    if let Err(e) = result {
        warn!(error = %e, what, "non-critical operation failed");
    }
}

/// Rough mastery estimate handed to path synthesis.
fn mastery_estimate(snapshot: &ProgressSnapshot) -> String {
    match snapshot.accuracy_pct {
        None => "unknown".to_owned(),
        Some(pct) => format!("accuracy band {}", accuracy_band(pct)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
