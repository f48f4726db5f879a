//! Pending-queue consumption with read-time revalidation.
//!
//! The queue masks generation latency; correctness never depends on its
//! contents being valid. Every dequeued lesson is re-checked against the
//! caller's CURRENT focus label, persona, exclusions, and similarity state.
//! A failing lesson is discarded, never requeued — the engine falls through
//! to live generation instead.

use std::sync::Arc;

use metrics::counter;
use tracing::debug;

use mentor_core::context::Guardrails;
use mentor_core::lesson::PendingLesson;
use mentor_core::text::normalize_title;
use mentor_embeddings::Deduplicator;
use mentor_settings::EngineSettings;
use mentor_store::{StateKey, StateStore};

use crate::errors::EngineResult;

/// Pending-queue consumer.
pub struct PendingQueue {
    store: Arc<StateStore>,
    dedup: Deduplicator,
    settings: EngineSettings,
}

impl PendingQueue {
    /// Create a new queue consumer.
    pub fn new(store: Arc<StateStore>, dedup: Deduplicator, settings: EngineSettings) -> Self {
        Self {
            store,
            dedup,
            settings,
        }
    }

    /// Slots the producer may still fill for this key.
    pub fn remaining_capacity(&self, key: &StateKey) -> EngineResult<usize> {
        let depth = self.store.pending_depth(key)?;
        Ok(self.settings.pending_depth.saturating_sub(depth))
    }

    /// Take the first pending lesson that survives revalidation.
    ///
    /// Dequeues until the queue is empty or a lesson passes all checks:
    /// topic label matches the current focus, persona matches, not
    /// excluded, not a near-duplicate. Rejected lessons are destroyed.
    pub fn take_valid(
        &self,
        key: &StateKey,
        focus_label: &str,
        persona_hash: &str,
        guardrails: &Guardrails,
        recent_embeddings: &[Vec<f32>],
    ) -> EngineResult<Option<PendingLesson>> {
        // Bounded by queue depth; each dequeue destroys a row.
        loop {
            let Some(pending) = self.store.dequeue_pending(key)? else {
                return Ok(None);
            };

            if pending.lesson.topic_label != focus_label {
                debug!(
                    lesson_id = %pending.lesson.id,
                    expected = focus_label,
                    actual = %pending.lesson.topic_label,
                    "pending lesson topic mismatch, discarding"
                );
                counter!("pending_discarded_total", "reason" => "topic_mismatch").increment(1);
                continue;
            }
            if pending.persona_hash != persona_hash {
                counter!("pending_discarded_total", "reason" => "persona_mismatch").increment(1);
                continue;
            }
            let normalized = normalize_title(&pending.lesson.title);
            if guardrails.excludes(pending.lesson.id.as_str(), &normalized) {
                counter!("pending_discarded_total", "reason" => "excluded").increment(1);
                continue;
            }
            let verdict = self
                .dedup
                .check(pending.embedding.as_deref(), recent_embeddings);
            if !verdict.is_acceptable() {
                counter!("pending_discarded_total", "reason" => "near_duplicate").increment(1);
                continue;
            }

            counter!("pending_consumed_total").increment(1);
            return Ok(Some(pending));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mentor_core::ids::LessonId;
    use mentor_core::lesson::{Lesson, LessonBody};

    const FOCUS: &str = "Topic 1 > Subtopic 1";

    fn lesson(id: &str, topic_label: &str) -> Lesson {
        Lesson {
            id: LessonId::from(id),
            title: format!("Lesson {id}"),
            topic_label: topic_label.into(),
            body: LessonBody {
                explanation: "Check your signs.".into(),
                example: None,
                question: None,
            },
            created_at: Utc::now(),
        }
    }

    fn queue() -> (PendingQueue, Arc<StateStore>, StateKey) {
        let store = Arc::new(StateStore::open_in_memory().unwrap());
        let queue = PendingQueue::new(
            Arc::clone(&store),
            Deduplicator::default(),
            EngineSettings::default(),
        );
        (queue, store, StateKey::new("u1", "Algebra 1"))
    }

    #[test]
    fn valid_pending_lesson_consumed() {
        let (queue, store, key) = queue();
        let _ = store
            .enqueue_pending(&key, FOCUS, &lesson("a", FOCUS), "p1", None, 2)
            .unwrap();

        let taken = queue
            .take_valid(&key, FOCUS, "p1", &Guardrails::default(), &[])
            .unwrap()
            .unwrap();
        assert_eq!(taken.lesson.id.as_str(), "a");
        assert_eq!(store.pending_depth(&key).unwrap(), 0);
    }

    #[test]
    fn topic_mismatch_discarded_falls_to_next() {
        let (queue, store, key) = queue();
        let stale_label = "Topic 9 > Gone";
        let _ = store
            .enqueue_pending(&key, stale_label, &lesson("stale", stale_label), "p1", None, 2)
            .unwrap();
        let _ = store
            .enqueue_pending(&key, FOCUS, &lesson("good", FOCUS), "p1", None, 2)
            .unwrap();

        let taken = queue
            .take_valid(&key, FOCUS, "p1", &Guardrails::default(), &[])
            .unwrap()
            .unwrap();
        assert_eq!(taken.lesson.id.as_str(), "good");
        assert_eq!(store.pending_depth(&key).unwrap(), 0, "reject not requeued");
    }

    #[test]
    fn persona_mismatch_discarded() {
        let (queue, store, key) = queue();
        let _ = store
            .enqueue_pending(&key, FOCUS, &lesson("a", FOCUS), "p-old", None, 2)
            .unwrap();

        let taken = queue
            .take_valid(&key, FOCUS, "p-new", &Guardrails::default(), &[])
            .unwrap();
        assert!(taken.is_none());
        assert_eq!(store.pending_depth(&key).unwrap(), 0);
    }

    #[test]
    fn excluded_lesson_discarded() {
        let (queue, store, key) = queue();
        let _ = store
            .enqueue_pending(&key, FOCUS, &lesson("a", FOCUS), "p1", None, 2)
            .unwrap();

        let mut guardrails = Guardrails::default();
        let _ = guardrails.exclude_ids.insert("a".into());
        let taken = queue
            .take_valid(&key, FOCUS, "p1", &guardrails, &[])
            .unwrap();
        assert!(taken.is_none());
    }

    #[test]
    fn near_duplicate_discarded() {
        let (queue, store, key) = queue();
        let _ = store
            .enqueue_pending(
                &key,
                FOCUS,
                &lesson("a", FOCUS),
                "p1",
                Some(&[1.0, 0.0]),
                2,
            )
            .unwrap();

        let recent = vec![vec![1.0, 0.0]];
        let taken = queue
            .take_valid(&key, FOCUS, "p1", &Guardrails::default(), &recent)
            .unwrap();
        assert!(taken.is_none());
    }

    #[test]
    fn empty_queue_returns_none() {
        let (queue, _store, key) = queue();
        let taken = queue
            .take_valid(&key, FOCUS, "p1", &Guardrails::default(), &[])
            .unwrap();
        assert!(taken.is_none());
    }

    #[test]
    fn remaining_capacity_tracks_depth() {
        let (queue, store, key) = queue();
        assert_eq!(queue.remaining_capacity(&key).unwrap(), 2);
        let _ = store
            .enqueue_pending(&key, FOCUS, &lesson("a", FOCUS), "p1", None, 2)
            .unwrap();
        assert_eq!(queue.remaining_capacity(&key).unwrap(), 1);
    }
}
