//! Background pre-generation producer.
//!
//! Runs as an independent task fed by a bounded channel — never awaited by
//! a live request. Production is rate-limited by current queue depth: the
//! producer refuses to add more than `max_depth - current_depth` lessons.
//! Failures leave the queue shallow; future requests fall through to live
//! generation, so nothing here is on the correctness path.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mentor_core::ids::UserId;
use mentor_embeddings::EmbeddingService;
use mentor_llm::{Generator, LessonRequest, ModelSpeed, validate_draft};
use mentor_settings::EngineSettings;
use mentor_store::{StateKey, StateStore, StoreError};

use crate::context::{ContextAssembler, gather_context};
use crate::errors::{EngineError, EngineResult};
use crate::rollup::ProgressRollup;

/// A request to top up a learner's pending queue.
#[derive(Clone, Debug)]
pub struct ProduceRequest {
    /// The learner.
    pub user: UserId,
    /// The subject.
    pub subject: String,
    /// Explicit focus label; defaults to the cursor's current label.
    pub topic_label: Option<String>,
    /// Lessons requested (clamped to remaining capacity).
    pub count: usize,
}

/// Result of one production pass.
#[derive(Clone, Debug)]
pub struct ProduceReport {
    /// Lessons actually generated and enqueued.
    pub generated: usize,
    /// IDs of the enqueued lessons.
    pub lesson_ids: Vec<String>,
    /// Queue depth after the pass.
    pub current_depth: usize,
    /// Configured max depth.
    pub max_depth: usize,
}

/// Background producer for the pending-lesson queue.
pub struct PendingProducer {
    store: Arc<StateStore>,
    generator: Arc<dyn Generator>,
    embedder: Arc<dyn EmbeddingService>,
    assembler: ContextAssembler,
    rollup: ProgressRollup,
    settings: EngineSettings,
}

/// Cheap handle for nudging the producer from the request path.
#[derive(Clone)]
pub struct ProducerHandle {
    tx: mpsc::Sender<ProduceRequest>,
}

impl ProducerHandle {
    /// Fire-and-forget a production request.
    ///
    /// Returns false when the producer's inbox is full or closed — callers
    /// never wait on it.
    pub fn nudge(&self, request: ProduceRequest) -> bool {
        self.tx.try_send(request).is_ok()
    }
}

impl PendingProducer {
    /// Create a new producer.
    pub fn new(
        store: Arc<StateStore>,
        generator: Arc<dyn Generator>,
        embedder: Arc<dyn EmbeddingService>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            assembler: ContextAssembler::new(settings.clone()),
            rollup: ProgressRollup::new(Arc::clone(&store), settings.clone()),
            store,
            generator,
            embedder,
            settings,
        }
    }

    /// Run one production pass for a request, synchronously.
    ///
    /// Also the implementation behind the explicit `generate-pending`
    /// endpoint, which wants the report back.
    pub async fn produce(&self, request: &ProduceRequest) -> EngineResult<ProduceReport> {
        let key = StateKey::new(request.user.clone(), request.subject.clone());

        let Some(record) = self.store.get_path_state(&key)? else {
            return Err(EngineError::NotReady {
                message: "no learning path to produce for".into(),
            });
        };

        let focus_label = match &request.topic_label {
            Some(label) => label.clone(),
            None => record
                .path
                .label_at(record.cursor.topic_index, record.cursor.subtopic_index)
                .ok_or_else(|| EngineError::Internal("cursor out of bounds".into()))?,
        };

        let (snapshot, _) = self.rollup.current(&key)?;
        let gathered = gather_context(
            &self.store,
            &self.assembler,
            &key,
            &record,
            &focus_label,
            &snapshot,
        )?;

        let capacity = self
            .settings
            .pending_depth
            .saturating_sub(self.store.pending_depth(&key)?);
        let target = request.count.min(capacity);
        debug!(
            subject = %key.subject,
            target,
            capacity,
            "pending production pass"
        );

        let mut lesson_ids = Vec::new();
        for _ in 0..target {
            let draft = match self
                .generator
                .generate_lesson(&LessonRequest {
                    subject: key.subject.clone(),
                    topic_label: focus_label.clone(),
                    context: gathered.context.clone(),
                    model_speed: ModelSpeed::Slow,
                })
                .await
            {
                Ok(draft) => draft,
                Err(e) => {
                    warn!(error = %e, "background generation failed, stopping pass");
                    break;
                }
            };

            let lesson = match validate_draft(draft, &focus_label) {
                Ok(lesson) => lesson,
                Err(e) => {
                    warn!(error = %e, "background draft invalid, stopping pass");
                    break;
                }
            };

            let embedding = match self.embedder.embed_single(&embedding_text(&lesson)).await {
                Ok(v) => Some(v),
                Err(e) => {
                    debug!(error = %e, "embedding unavailable for pending lesson");
                    None
                }
            };

            match self.store.enqueue_pending(
                &key,
                &focus_label,
                &lesson,
                &gathered.persona_hash,
                embedding.as_deref(),
                self.settings.pending_depth,
            ) {
                Ok(_) => {
                    counter!("pending_produced_total").increment(1);
                    lesson_ids.push(lesson.id.as_str().to_owned());
                }
                Err(StoreError::QueueFull { .. }) => break,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(ProduceReport {
            generated: lesson_ids.len(),
            lesson_ids,
            current_depth: self.store.pending_depth(&key)?,
            max_depth: self.settings.pending_depth,
        })
    }

    /// Spawn the producer loop, returning a nudge handle and the task.
    ///
    /// The loop drains its inbox until the cancellation token fires.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> (ProducerHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<ProduceRequest>(32);
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("pending producer shutting down");
                        break;
                    }
                    request = rx.recv() => {
                        let Some(request) = request else { break };
                        if let Err(e) = self.produce(&request).await {
                            // Production is best-effort; the next live
                            // request simply generates on demand.
                            debug!(error = %e, "pending production skipped");
                        }
                    }
                }
            }
        });
        (ProducerHandle { tx }, handle)
    }
}

/// Text used to embed a lesson for similarity comparisons.
pub(crate) fn embedding_text(lesson: &mentor_core::lesson::Lesson) -> String {
    format!("{}\n{}", lesson.title, lesson.body.explanation)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use mentor_core::path::{CompletionMap, LearningPath, PathCursor, Subtopic, Topic};
    use mentor_embeddings::MockEmbeddingService;
    use mentor_llm::{GeneratorError, MockGenerator};

    fn path() -> LearningPath {
        LearningPath {
            topics: vec![Topic {
                name: "Topic 1".into(),
                subtopics: vec![Subtopic {
                    name: "Subtopic 1".into(),
                    mini_lesson_count: 3,
                    completed: false,
                }],
            }],
        }
    }

    fn producer(generator: Arc<MockGenerator>) -> (PendingProducer, Arc<StateStore>, StateKey) {
        let store = Arc::new(StateStore::open_in_memory().unwrap());
        let key = StateKey::new("u1", "Algebra 1");
        store
            .upsert_path_state(&key, &path(), PathCursor::default(), &CompletionMap::new(), None)
            .unwrap();
        let producer = PendingProducer::new(
            Arc::clone(&store),
            generator,
            Arc::new(MockEmbeddingService::new(8)),
            EngineSettings::default(),
        );
        (producer, store, key)
    }

    fn request(count: usize) -> ProduceRequest {
        ProduceRequest {
            user: UserId::from("u1"),
            subject: "Algebra 1".into(),
            topic_label: None,
            count,
        }
    }

    #[tokio::test]
    async fn produces_up_to_capacity() {
        let generator = Arc::new(MockGenerator::new());
        let (producer, store, key) = producer(Arc::clone(&generator));

        let report = producer.produce(&request(5)).await.unwrap();
        assert_eq!(report.generated, 2, "clamped to max depth");
        assert_eq!(report.current_depth, 2);
        assert_eq!(report.max_depth, 2);
        assert_eq!(store.pending_depth(&key).unwrap(), 2);
        assert_eq!(generator.lesson_calls(), 2);
    }

    #[tokio::test]
    async fn refuses_when_queue_full() {
        let generator = Arc::new(MockGenerator::new());
        let (producer, _store, _key) = producer(Arc::clone(&generator));

        let _ = producer.produce(&request(2)).await.unwrap();
        let report = producer.produce(&request(2)).await.unwrap();
        assert_eq!(report.generated, 0, "no capacity left");
        assert_eq!(generator.lesson_calls(), 2, "no wasted generation calls");
    }

    #[tokio::test]
    async fn generation_failure_stops_pass_quietly() {
        let generator = Arc::new(MockGenerator::new());
        generator.push_lesson(Err(GeneratorError::Other {
            message: "model offline".into(),
        }));
        let (producer, store, key) = producer(Arc::clone(&generator));

        let report = producer.produce(&request(2)).await.unwrap();
        assert_eq!(report.generated, 0);
        assert_eq!(store.pending_depth(&key).unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_path_is_not_ready() {
        let generator = Arc::new(MockGenerator::new());
        let store = Arc::new(StateStore::open_in_memory().unwrap());
        let producer = PendingProducer::new(
            store,
            generator,
            Arc::new(MockEmbeddingService::new(8)),
            EngineSettings::default(),
        );
        let err = producer.produce(&request(1)).await.unwrap_err();
        assert_matches!(err, EngineError::NotReady { .. });
    }

    #[tokio::test]
    async fn explicit_topic_label_overrides_cursor() {
        let generator = Arc::new(MockGenerator::new());
        let (producer, store, key) = producer(Arc::clone(&generator));

        let report = producer
            .produce(&ProduceRequest {
                topic_label: Some("Topic 9 > Elsewhere".into()),
                ..request(1)
            })
            .await
            .unwrap();
        assert_eq!(report.generated, 1);
        let pending = store.dequeue_pending(&key).unwrap().unwrap();
        assert_eq!(pending.lesson.topic_label, "Topic 9 > Elsewhere");
    }

    #[tokio::test]
    async fn spawned_producer_serves_nudges_and_shuts_down() {
        let generator = Arc::new(MockGenerator::new());
        let (producer, store, key) = producer(Arc::clone(&generator));
        let cancel = CancellationToken::new();
        let (handle, task) = Arc::new(producer).spawn(cancel.clone());

        assert!(handle.nudge(request(1)));
        // Wait for the producer to drain its inbox.
        for _ in 0..50 {
            if store.pending_depth(&key).unwrap() > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(store.pending_depth(&key).unwrap(), 1);

        cancel.cancel();
        task.await.unwrap();
    }
}
