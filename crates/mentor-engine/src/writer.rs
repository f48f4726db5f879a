//! Progress writer: builds and applies the post-delivery atomic patch.
//!
//! One patch bundles the cursor bump (capped at the subtopic's planned
//! mini-lesson count), the delivered-id/title append with retention trim,
//! the optional snapshot refresh, and the next-topic pointer. The store
//! applies it as a single transaction.
//!
//! A patch failure after the lesson is already computed is logged, not
//! surfaced — the served response is never wasted on a bookkeeping error.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, instrument};

use mentor_core::lesson::{DeliveredLesson, Lesson};
use mentor_core::path::PathCursor;
use mentor_core::progress::ProgressSnapshot;
use mentor_settings::EngineSettings;
use mentor_store::{DeliveredAppend, PathStateRecord, ProgressPatch, StateKey, StateStore};

use crate::errors::EngineResult;
use crate::pathstate::next_incomplete_after;

/// Result of a successful persist.
#[derive(Clone, Debug)]
pub struct PersistOutcome {
    /// Cursor after the bump.
    pub cursor: PathCursor,
    /// Next incomplete focus label after the current one, if any.
    pub next_topic_hint: Option<String>,
}

/// Progress writer.
pub struct ProgressWriter {
    store: Arc<StateStore>,
    settings: EngineSettings,
}

impl ProgressWriter {
    /// Create a new writer.
    pub fn new(store: Arc<StateStore>, settings: EngineSettings) -> Self {
        Self { store, settings }
    }

    /// Build and apply the atomic patch for a served lesson.
    #[instrument(skip_all, fields(user = %key.user, subject = %key.subject, lesson_id = %lesson.id))]
    pub fn persist_delivery(
        &self,
        key: &StateKey,
        record: &PathStateRecord,
        focus_label: &str,
        lesson: &Lesson,
        embedding: Option<Vec<f32>>,
        snapshot: Option<ProgressSnapshot>,
    ) -> EngineResult<PersistOutcome> {
        let planned = record
            .path
            .subtopic_at(record.cursor.topic_index, record.cursor.subtopic_index)
            .map_or(u32::MAX, |s| s.mini_lesson_count.max(1));

        let cursor = PathCursor {
            delivered_mini_count: record.cursor.delivered_mini_count.saturating_add(1).min(planned),
            ..record.cursor
        };
        let next_topic_hint = next_incomplete_after(&record.path, &record.completion, cursor);

        let patch = ProgressPatch {
            cursor,
            completion: record.completion.clone(),
            next_topic: next_topic_hint.clone(),
            delivered: Some(DeliveredAppend {
                topic_label: focus_label.to_owned(),
                record: DeliveredLesson {
                    lesson_id: lesson.id.clone(),
                    title: lesson.title.clone(),
                    embedding,
                    delivered_at: Utc::now(),
                },
                retention: self.settings.delivery_retention,
            }),
            snapshot,
        };

        self.store.apply_progress_patch(key, &patch)?;
        Ok(PersistOutcome {
            cursor,
            next_topic_hint,
        })
    }

    /// Persist, degrading a failure to a log line.
    ///
    /// The lesson was already generated/served; eventual consistency on the
    /// cursor is accepted over wasting the completed work.
    pub fn persist_or_log(
        &self,
        key: &StateKey,
        record: &PathStateRecord,
        focus_label: &str,
        lesson: &Lesson,
        embedding: Option<Vec<f32>>,
        snapshot: Option<ProgressSnapshot>,
    ) -> Option<PersistOutcome> {
        match self.persist_delivery(key, record, focus_label, lesson, embedding, snapshot) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(error = %e, "progress patch failed after serving lesson");
                None
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mentor_core::ids::LessonId;
    use mentor_core::lesson::LessonBody;
    use mentor_core::path::{CompletionMap, LearningPath, Subtopic, Topic};
    use mentor_store::TopicKey;

    fn path() -> LearningPath {
        LearningPath {
            topics: vec![Topic {
                name: "Topic 1".into(),
                subtopics: vec![
                    Subtopic {
                        name: "Subtopic 1".into(),
                        mini_lesson_count: 2,
                        completed: false,
                    },
                    Subtopic {
                        name: "Subtopic 2".into(),
                        mini_lesson_count: 2,
                        completed: false,
                    },
                ],
            }],
        }
    }

    fn lesson(id: &str) -> Lesson {
        Lesson {
            id: LessonId::from(id),
            title: format!("Lesson {id}"),
            topic_label: "Topic 1 > Subtopic 1".into(),
            body: LessonBody {
                explanation: "Balance both sides.".into(),
                example: None,
                question: None,
            },
            created_at: Utc::now(),
        }
    }

    fn setup() -> (ProgressWriter, Arc<StateStore>, StateKey) {
        let store = Arc::new(StateStore::open_in_memory().unwrap());
        let key = StateKey::new("u1", "Algebra 1");
        store
            .upsert_path_state(
                &key,
                &path(),
                PathCursor::default(),
                &CompletionMap::new(),
                None,
            )
            .unwrap();
        let writer = ProgressWriter::new(Arc::clone(&store), EngineSettings::default());
        (writer, store, key)
    }

    fn record(store: &StateStore, key: &StateKey) -> PathStateRecord {
        store.get_path_state(key).unwrap().unwrap()
    }

    #[test]
    fn persist_increments_mini_count_and_appends() {
        let (writer, store, key) = setup();
        let rec = record(&store, &key);

        let outcome = writer
            .persist_delivery(
                &key,
                &rec,
                "Topic 1 > Subtopic 1",
                &lesson("a"),
                Some(vec![0.6, 0.8]),
                None,
            )
            .unwrap();
        assert_eq!(outcome.cursor.delivered_mini_count, 1);
        assert_eq!(
            outcome.next_topic_hint.as_deref(),
            Some("Topic 1 > Subtopic 2")
        );

        let rec = record(&store, &key);
        assert_eq!(rec.cursor.delivered_mini_count, 1);
        let deliveries = store
            .get_deliveries(&TopicKey::new(key.clone(), "Topic 1 > Subtopic 1"), 10)
            .unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].title, "Lesson a");
    }

    #[test]
    fn mini_count_caps_at_planned() {
        let (writer, store, key) = setup();

        for i in 0..4 {
            let rec = record(&store, &key);
            let _ = writer
                .persist_delivery(
                    &key,
                    &rec,
                    "Topic 1 > Subtopic 1",
                    &lesson(&format!("l{i}")),
                    None,
                    None,
                )
                .unwrap();
        }

        let rec = record(&store, &key);
        assert_eq!(rec.cursor.delivered_mini_count, 2, "capped at planned count");
    }

    #[test]
    fn snapshot_refresh_rides_the_patch() {
        let (writer, store, key) = setup();
        let rec = record(&store, &key);

        let snapshot = ProgressSnapshot {
            accuracy_pct: Some(85),
            computed_at: Some(Utc::now()),
            ..Default::default()
        };
        let _ = writer
            .persist_delivery(
                &key,
                &rec,
                "Topic 1 > Subtopic 1",
                &lesson("a"),
                None,
                Some(snapshot),
            )
            .unwrap();

        let stored = store.get_snapshot(&key).unwrap().unwrap();
        assert_eq!(stored.accuracy_pct, Some(85));
    }

    #[test]
    fn persist_or_log_returns_outcome_on_success() {
        let (writer, store, key) = setup();
        let rec = record(&store, &key);
        let outcome = writer.persist_or_log(
            &key,
            &rec,
            "Topic 1 > Subtopic 1",
            &lesson("a"),
            None,
            None,
        );
        assert!(outcome.is_some());
        assert_eq!(record(&store, &key).cursor.delivered_mini_count, 1);
    }
}
