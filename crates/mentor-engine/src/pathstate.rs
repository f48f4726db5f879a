//! Path-state service: load, ensure (synthesize under lock), and advance.
//!
//! Synthesis is guarded by the store's lease lock so concurrent requests for
//! the same (user, subject) — duplicate client retries, multiple tabs — make
//! exactly one generation call; the losers get a retryable `Generating`
//! signal. If the store reports the lock mechanism unsupported, an
//! in-process mutex map guards best-effort.

use std::sync::Arc;

use dashmap::DashMap;
use metrics::counter;
use tracing::{info, instrument, warn};

use mentor_core::path::{
    AdvanceOutcome, CompletionMap, LearningPath, PathCursor, advance_cursor,
};
use mentor_llm::{Generator, PathRequest};
use mentor_settings::EngineSettings;
use mentor_store::{LockStatus, PathStateRecord, StateKey, StateStore};

use crate::errors::{EngineError, EngineResult};

/// Outcome of ensuring a path exists.
#[derive(Debug)]
pub enum EnsureOutcome {
    /// A valid path is available.
    Ready(PathStateRecord),
    /// Another request is synthesizing; retry after the hint.
    Generating {
        /// Suggested retry delay in seconds.
        retry_after_secs: u64,
    },
}

/// Path-state service.
pub struct PathState {
    store: Arc<StateStore>,
    generator: Arc<dyn Generator>,
    settings: EngineSettings,
    /// Best-effort in-process guards, used only when the store lock is
    /// unsupported.
    local_locks: DashMap<(String, String), Arc<tokio::sync::Mutex<()>>>,
}

impl PathState {
    /// Create a new path-state service.
    pub fn new(
        store: Arc<StateStore>,
        generator: Arc<dyn Generator>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            generator,
            settings,
            local_locks: DashMap::new(),
        }
    }

    /// Load the path state for a key, treating corrupt documents as absent.
    ///
    /// The embedded subtopic completion flags seed the completion map for
    /// labels it doesn't know yet (one-time migration fallback; the map
    /// stays authoritative).
    pub fn load(&self, key: &StateKey) -> EngineResult<Option<PathStateRecord>> {
        match self.store.get_path_state(key) {
            Ok(Some(mut record)) => {
                record.completion.seed_from_path(&record.path);
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(mentor_store::StoreError::Corrupt { message, .. }) => {
                warn!(subject = %key.subject, %message, "corrupt path document, regenerating");
                self.store.delete_path_state(key)?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Ensure a valid path exists, synthesizing one under lock if needed.
    #[instrument(skip(self), fields(user = %key.user, subject = %key.subject))]
    pub async fn ensure(
        &self,
        key: &StateKey,
        mastery_estimate: &str,
        pace_note: &str,
    ) -> EngineResult<EnsureOutcome> {
        if let Some(record) = self.load(key)? {
            if !record.path.is_empty() {
                return Ok(EnsureOutcome::Ready(record));
            }
        }

        let Some(curriculum) = self.store.get_curriculum(&key.subject)? else {
            return Err(EngineError::NotReady {
                message: format!("no curriculum mapping for {:?}", key.subject),
            });
        };

        let holder = format!("synth-{}", uuid::Uuid::now_v7());
        let lease_secs = self.settings.lock_lease_secs;
        match self
            .store
            .acquire_generation_lock(key, &holder, lease_secs)?
        {
            LockStatus::Held => {
                let result = self
                    .synthesize(key, &curriculum, mastery_estimate, pace_note)
                    .await;
                self.store.release_generation_lock(key, &holder)?;
                result.map(EnsureOutcome::Ready)
            }
            LockStatus::Busy => {
                counter!("path_synthesis_contention_total").increment(1);
                Ok(EnsureOutcome::Generating {
                    retry_after_secs: self.settings.retry_after_secs,
                })
            }
            LockStatus::Unsupported => {
                // Fall back to a best-effort in-process guard; true
                // cross-process races are then possible but rare.
                let map_key = (key.user.as_str().to_owned(), key.subject.clone());
                let guard = self
                    .local_locks
                    .entry(map_key)
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                    .clone();
                match guard.try_lock() {
                    Ok(_held) => {
                        let result = self
                            .synthesize(key, &curriculum, mastery_estimate, pace_note)
                            .await;
                        result.map(EnsureOutcome::Ready)
                    }
                    Err(_) => Ok(EnsureOutcome::Generating {
                        retry_after_secs: self.settings.retry_after_secs,
                    }),
                }
            }
        }
    }

    async fn synthesize(
        &self,
        key: &StateKey,
        curriculum: &mentor_store::CurriculumRow,
        mastery_estimate: &str,
        pace_note: &str,
    ) -> EngineResult<PathStateRecord> {
        // Re-check under the lock: a concurrent holder may have finished.
        if let Some(record) = self.load(key)? {
            if !record.path.is_empty() {
                return Ok(record);
            }
        }

        counter!("path_synthesis_total").increment(1);
        let path = self
            .generator
            .generate_path(&PathRequest {
                subject: key.subject.clone(),
                course: curriculum.course.clone(),
                outline: curriculum.outline.clone(),
                mastery_estimate: mastery_estimate.to_owned(),
                pace_note: pace_note.to_owned(),
            })
            .await
            .map_err(EngineError::Generator)?;

        if path.is_empty() {
            return Err(EngineError::NotReady {
                message: "synthesized path has no topics".into(),
            });
        }

        let mut completion = CompletionMap::new();
        completion.seed_from_path(&path);
        let cursor = PathCursor::default();
        let next_topic = next_incomplete_after(&path, &completion, cursor);

        self.store
            .upsert_path_state(key, &path, cursor, &completion, next_topic.as_deref())?;
        info!(subject = %key.subject, topics = path.topics.len(), "learning path synthesized");

        self.load(key)?.ok_or_else(|| {
            EngineError::Internal("path state vanished after synthesis".into())
        })
    }

    /// Advance the record's cursor to the next incomplete subtopic.
    #[must_use]
    pub fn advance(record: &PathStateRecord) -> AdvanceOutcome {
        advance_cursor(&record.path, &record.completion, record.cursor)
    }
}

/// The focus label of the next incomplete subtopic after the cursor.
///
/// Forward scan first, then wrap; the cursor's own position never counts.
/// `None` when nothing else remains.
#[must_use]
pub fn next_incomplete_after(
    path: &LearningPath,
    completion: &CompletionMap,
    cursor: PathCursor,
) -> Option<String> {
    let mut wrapped: Option<String> = None;
    for (ti, si, label) in path.positions() {
        let at_cursor = ti == cursor.topic_index && si == cursor.subtopic_index;
        if at_cursor || completion.is_complete(&label) {
            continue;
        }
        let ahead =
            ti > cursor.topic_index || (ti == cursor.topic_index && si > cursor.subtopic_index);
        if ahead {
            return Some(label);
        }
        if wrapped.is_none() {
            wrapped = Some(label);
        }
    }
    wrapped
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
