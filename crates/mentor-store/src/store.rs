//! High-level transactional [`StateStore`] API.
//!
//! Composes all repository operations into key-scoped methods. Every write
//! runs under a per-(user, subject) in-process mutex plus a `SQLite`
//! BUSY/LOCKED retry loop, and multi-table writes run inside a single
//! transaction — callers never observe partial state.
//!
//! INVARIANT: the progress patch ([`StateStore::apply_progress_patch`]) is
//! the only way cursor, delivery log, and snapshot move together; it is one
//! transaction, never separate read-modify-write steps.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, instrument};

use mentor_core::ids::UserId;
use mentor_core::lesson::{CachedLesson, DeliveredLesson, Lesson, PendingLesson};
use mentor_core::path::{CompletionMap, LearningPath, PathCursor};
use mentor_core::progress::{AttemptRow, PreferenceKind, PreferenceSet, ProgressSnapshot};

use crate::connection::{ConnectionConfig, ConnectionPool, PooledConnection, new_file, new_in_memory};
use crate::errors::{Result, StoreError};
use crate::keys::{StateKey, TopicKey};
use crate::migrations::run_migrations;
use crate::repositories::attempts::AttemptRepo;
use crate::repositories::cache::CacheRepo;
use crate::repositories::curricula::CurriculumRepo;
use crate::repositories::delivery::DeliveryRepo;
use crate::repositories::locks::LockRepo;
use crate::repositories::path_state::PathStateRepo;
use crate::repositories::pending::PendingRepo;
use crate::repositories::preferences::PreferenceRepo;
use crate::repositories::profiles::ProfileRepo;
use crate::repositories::snapshots::SnapshotRepo;
use crate::row_types::{CurriculumRow, LearnerProfile, LockStatus, PathStateRecord, SubjectActivity};

/// A delivery-record append bundled into a progress patch.
#[derive(Clone, Debug)]
pub struct DeliveredAppend {
    /// Focus label the lesson was served under.
    pub topic_label: String,
    /// The delivery record.
    pub record: DeliveredLesson,
    /// Retention window for the label's delivery log.
    pub retention: usize,
}

/// The atomic unit applied after a lesson is served.
///
/// Bundles the cursor bump, the delivered-id/title append (with retention
/// trim), the optional metrics refresh, and the next-topic pointer into one
/// transaction so concurrent requests for the same key can't lose updates.
#[derive(Clone, Debug)]
pub struct ProgressPatch {
    /// New cursor position.
    pub cursor: PathCursor,
    /// Completion map after any marks.
    pub completion: CompletionMap,
    /// Next incomplete focus label, if any.
    pub next_topic: Option<String>,
    /// Delivery-record append, when a lesson was served.
    pub delivered: Option<DeliveredAppend>,
    /// Snapshot refresh, when a recompute was triggered.
    pub snapshot: Option<ProgressSnapshot>,
}

/// High-level state store wrapping a connection pool and all repositories.
///
/// INVARIANT: writes for one (user, subject) are serialized via in-process
/// mutex locks (`with_state_write_lock`). Different keys proceed fully in
/// parallel; there is no cross-key locking.
pub struct StateStore {
    pool: ConnectionPool,
    state_write_locks: Mutex<HashMap<(String, String), Weak<Mutex<()>>>>,
}

impl StateStore {
    const SQLITE_BUSY_MAX_RETRIES: u32 = 32;

    /// Create a store over an existing pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            pool,
            state_write_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Open an in-memory store and run migrations (tests, dev).
    pub fn open_in_memory() -> Result<Self> {
        let pool = new_in_memory(&ConnectionConfig::default())?;
        let store = Self::new(pool);
        let _ = store.migrate()?;
        Ok(store)
    }

    /// Open a file-backed store and run migrations.
    pub fn open_file(path: &str, config: &ConnectionConfig) -> Result<Self> {
        let pool = new_file(path, config)?;
        let store = Self::new(pool);
        let _ = store.migrate()?;
        Ok(store)
    }

    /// Run pending schema migrations.
    pub fn migrate(&self) -> Result<u32> {
        run_migrations(&*self.conn()?)
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    fn acquire_state_write_lock(&self, key: &StateKey) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .state_write_locks
            .lock()
            .map_err(|_| StoreError::Internal("state lock map poisoned".into()))?;

        // Opportunistically prune dead weak refs when the map grows.
        if locks.len() > 128 {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }

        let map_key = (key.user.as_str().to_owned(), key.subject.clone());
        if let Some(existing) = locks.get(&map_key).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let lock = Arc::new(Mutex::new(()));
        let _ = locks.insert(map_key, Arc::downgrade(&lock));
        Ok(lock)
    }

    fn with_state_write_lock<T>(&self, key: &StateKey, f: impl FnMut() -> Result<T>) -> Result<T> {
        let state_lock = self.acquire_state_write_lock(key)?;
        let _guard = state_lock
            .lock()
            .map_err(|_| StoreError::Internal("state write lock poisoned".into()))?;
        Self::retry_on_sqlite_busy(f)
    }

    /// Retry an operation on `SQLite` BUSY/LOCKED with linear backoff + jitter.
    ///
    /// Backoff: base = min(attempts * 10, 500) ms, jitter ±25% to prevent
    /// thundering herd when multiple writers contend on the same database.
    fn retry_on_sqlite_busy<T>(mut f: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempts = 0;

        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(err)
                    if Self::is_sqlite_busy_or_locked(&err)
                        && attempts < Self::SQLITE_BUSY_MAX_RETRIES =>
                {
                    attempts += 1;
                    metrics::counter!("store_busy_retries_total").increment(1);
                    let base_ms = u64::from(attempts).saturating_mul(10).min(500);
                    let jitter_range = base_ms / 4;
                    let jitter = if jitter_range > 0 {
                        rand::random::<u64>() % (jitter_range * 2 + 1)
                    } else {
                        0
                    };
                    let backoff_ms = base_ms.saturating_sub(jitter_range) + jitter;
                    std::thread::sleep(Duration::from_millis(backoff_ms));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn is_sqlite_busy_or_locked(err: &StoreError) -> bool {
        match err {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(code, _)) => matches!(
                code.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Path state
    // ─────────────────────────────────────────────────────────────────────

    /// Get the normalized path state for a key.
    pub fn get_path_state(&self, key: &StateKey) -> Result<Option<PathStateRecord>> {
        PathStateRepo::get(&*self.conn()?, key)
    }

    /// Insert or replace the whole path state for a key.
    #[instrument(skip(self, path, completion), fields(user = %key.user, subject = %key.subject))]
    pub fn upsert_path_state(
        &self,
        key: &StateKey,
        path: &LearningPath,
        cursor: PathCursor,
        completion: &CompletionMap,
        next_topic: Option<&str>,
    ) -> Result<()> {
        self.with_state_write_lock(key, || {
            PathStateRepo::upsert(&*self.conn()?, key, path, cursor, completion, next_topic)
        })
    }

    /// Delete the path state for a key (used when a document is corrupt).
    pub fn delete_path_state(&self, key: &StateKey) -> Result<()> {
        self.with_state_write_lock(key, || PathStateRepo::delete(&*self.conn()?, key))
    }

    /// Subjects with state for a user, most recently updated first.
    pub fn list_subjects(&self, user: &UserId) -> Result<Vec<SubjectActivity>> {
        PathStateRepo::list_for_user(&*self.conn()?, user.as_str())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Attempts and snapshots
    // ─────────────────────────────────────────────────────────────────────

    /// Record a practice attempt.
    pub fn record_attempt(&self, user: &UserId, attempt: &AttemptRow) -> Result<()> {
        AttemptRepo::insert(&*self.conn()?, user.as_str(), attempt)
    }

    /// List attempts, newest first, optionally subject-filtered.
    pub fn get_attempts(
        &self,
        user: &UserId,
        subject: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AttemptRow>> {
        AttemptRepo::list(&*self.conn()?, user.as_str(), subject, limit)
    }

    /// Timestamp of the newest attempt for a user.
    pub fn newest_attempt_at(&self, user: &UserId) -> Result<Option<DateTime<Utc>>> {
        AttemptRepo::newest_timestamp(&*self.conn()?, user.as_str())
    }

    /// Get the cached progress snapshot for a key.
    pub fn get_snapshot(&self, key: &StateKey) -> Result<Option<ProgressSnapshot>> {
        SnapshotRepo::get(&*self.conn()?, key)
    }

    /// Insert or replace the progress snapshot for a key.
    pub fn upsert_snapshot(&self, key: &StateKey, snapshot: &ProgressSnapshot) -> Result<()> {
        self.with_state_write_lock(key, || SnapshotRepo::upsert(&*self.conn()?, key, snapshot))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Delivery history
    // ─────────────────────────────────────────────────────────────────────

    /// Delivered lessons for a topic label, most recent first.
    pub fn get_deliveries(&self, key: &TopicKey, limit: usize) -> Result<Vec<DeliveredLesson>> {
        DeliveryRepo::list(&*self.conn()?, key, limit)
    }

    /// Most recent delivered embeddings across a subject.
    pub fn recent_embeddings(&self, key: &StateKey, limit: usize) -> Result<Vec<Vec<f32>>> {
        DeliveryRepo::recent_embeddings(&*self.conn()?, key, limit)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lesson cache
    // ─────────────────────────────────────────────────────────────────────

    /// Non-expired cache entries for a topic label, most recent first.
    pub fn get_lesson_cache(
        &self,
        key: &TopicKey,
        max_age_hours: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<CachedLesson>> {
        CacheRepo::get(&*self.conn()?, key, max_age_hours, now)
    }

    /// Insert a cache entry, enforcing the per-label cap.
    pub fn put_lesson_cache(&self, key: &TopicKey, entry: &CachedLesson, cap: usize) -> Result<()> {
        self.with_state_write_lock(&key.state, || {
            let conn = self.conn()?;
            let tx = conn.unchecked_transaction()?;
            CacheRepo::put(&tx, key, entry, cap)?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Refresh the recency of a just-served cache entry.
    pub fn touch_lesson_cache(
        &self,
        key: &TopicKey,
        lesson_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_state_write_lock(&key.state, || {
            CacheRepo::touch(&*self.conn()?, key, lesson_id, now)
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Pending queue
    // ─────────────────────────────────────────────────────────────────────

    /// Current pending-queue depth for a key.
    pub fn pending_depth(&self, key: &StateKey) -> Result<usize> {
        PendingRepo::depth(&*self.conn()?, key)
    }

    /// Enqueue a pre-generated lesson, refusing past `max_depth`.
    pub fn enqueue_pending(
        &self,
        key: &StateKey,
        topic_label: &str,
        lesson: &Lesson,
        persona_hash: &str,
        embedding: Option<&[f32]>,
        max_depth: usize,
    ) -> Result<i64> {
        self.with_state_write_lock(key, || {
            let conn = self.conn()?;
            let tx = conn.unchecked_transaction()?;
            let seq = PendingRepo::enqueue(
                &tx,
                key,
                topic_label,
                lesson,
                persona_hash,
                embedding,
                Utc::now(),
                max_depth,
            )?;
            tx.commit()?;
            Ok(seq)
        })
    }

    /// Dequeue the oldest pending lesson, destroying the row.
    pub fn dequeue_pending(&self, key: &StateKey) -> Result<Option<PendingLesson>> {
        self.with_state_write_lock(key, || {
            let conn = self.conn()?;
            let tx = conn.unchecked_transaction()?;
            let out = PendingRepo::dequeue(&tx, key)?;
            tx.commit()?;
            Ok(out)
        })
    }

    /// Drop every queued lesson for a key.
    pub fn clear_pending(&self, key: &StateKey) -> Result<usize> {
        self.with_state_write_lock(key, || PendingRepo::clear(&*self.conn()?, key))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Preferences, profiles, curricula
    // ─────────────────────────────────────────────────────────────────────

    /// Record a liked/disliked/saved preference.
    pub fn record_preference(
        &self,
        user: &UserId,
        kind: PreferenceKind,
        lesson_id: &str,
        cap: usize,
    ) -> Result<()> {
        PreferenceRepo::record(&*self.conn()?, user.as_str(), kind, lesson_id, Utc::now(), cap)
    }

    /// Load the full preference set for a user.
    pub fn get_preferences(&self, user: &UserId) -> Result<PreferenceSet> {
        PreferenceRepo::get_set(&*self.conn()?, user.as_str())
    }

    /// Get a learner's profile.
    pub fn get_profile(&self, user: &UserId) -> Result<Option<LearnerProfile>> {
        ProfileRepo::get(&*self.conn()?, user.as_str())
    }

    /// Insert or replace a learner's profile.
    pub fn upsert_profile(&self, user: &UserId, profile: &LearnerProfile) -> Result<()> {
        ProfileRepo::upsert(&*self.conn()?, user.as_str(), profile)
    }

    /// Look up a curriculum mapping by subject (case-insensitive).
    pub fn get_curriculum(&self, subject: &str) -> Result<Option<CurriculumRow>> {
        CurriculumRepo::get(&*self.conn()?, subject)
    }

    /// Insert or replace a curriculum mapping.
    pub fn upsert_curriculum(&self, row: &CurriculumRow) -> Result<()> {
        CurriculumRepo::upsert(&*self.conn()?, row)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Generation locks
    // ─────────────────────────────────────────────────────────────────────

    /// Try to acquire the path-synthesis lease for a key.
    pub fn acquire_generation_lock(
        &self,
        key: &StateKey,
        holder: &str,
        lease_secs: i64,
    ) -> Result<LockStatus> {
        Self::retry_on_sqlite_busy(|| {
            LockRepo::acquire(&*self.conn()?, key, holder, lease_secs, Utc::now())
        })
    }

    /// Release the path-synthesis lease.
    pub fn release_generation_lock(&self, key: &StateKey, holder: &str) -> Result<()> {
        Self::retry_on_sqlite_busy(|| LockRepo::release(&*self.conn()?, key, holder))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Atomic progress patch
    // ─────────────────────────────────────────────────────────────────────

    /// Apply a progress patch as a single transaction.
    ///
    /// Atomic: cursor bump, completion map, next-topic pointer, delivery
    /// append + retention trim, and snapshot refresh all commit together.
    #[instrument(skip(self, patch), fields(user = %key.user, subject = %key.subject))]
    pub fn apply_progress_patch(&self, key: &StateKey, patch: &ProgressPatch) -> Result<()> {
        self.with_state_write_lock(key, || {
            let conn = self.conn()?;
            let tx = conn.unchecked_transaction()?;
            Self::apply_patch_in_tx(&tx, key, patch)?;
            tx.commit()?;
            debug!("progress patch applied");
            Ok(())
        })
    }

    fn apply_patch_in_tx(conn: &Connection, key: &StateKey, patch: &ProgressPatch) -> Result<()> {
        PathStateRepo::update_progress(
            conn,
            key,
            patch.cursor,
            &patch.completion,
            patch.next_topic.as_deref(),
        )?;

        if let Some(ref delivered) = patch.delivered {
            let topic_key = TopicKey::new(key.clone(), delivered.topic_label.clone());
            DeliveryRepo::append(conn, &topic_key, &delivered.record, delivered.retention)?;
        }

        if let Some(ref snapshot) = patch.snapshot {
            SnapshotRepo::upsert(conn, key, snapshot)?;
        }

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
