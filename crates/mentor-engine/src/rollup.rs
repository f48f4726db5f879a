//! Progress-metrics rollup: accuracy and pace from attempt history.
//!
//! The snapshot is cached in the store and recomputed only when the
//! freshest attempt timestamp is newer than the snapshot's
//! `last_attempt_at` — event-driven invalidation, never a TTL. Idle polling
//! costs one timestamp read, not a recompute.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use mentor_core::progress::{AttemptRow, Pace, ProgressSnapshot};
use mentor_settings::EngineSettings;
use mentor_store::{StateKey, StateStore};

use crate::errors::EngineResult;

/// Attempts loaded per recompute. The accuracy sample is bounded; older
/// history no longer moves the number meaningfully.
const ATTEMPT_SAMPLE_LIMIT: usize = 200;

/// Compute a snapshot from an attempt set for one subject.
///
/// Widening fallback: subject-tagged attempts (case-insensitive) → untagged
/// attempts → the full set. A cold-start subject therefore reports a metric
/// whenever the learner has any history at all.
#[must_use]
pub fn compute_snapshot(
    attempts: &[AttemptRow],
    subject: &str,
    now: DateTime<Utc>,
    settings: &EngineSettings,
) -> ProgressSnapshot {
    let subject_lower = subject.to_lowercase();
    let tagged: Vec<&AttemptRow> = attempts
        .iter()
        .filter(|a| {
            a.subject
                .as_deref()
                .is_some_and(|s| s.to_lowercase() == subject_lower)
        })
        .collect();

    let untagged: Vec<&AttemptRow>;
    let everything: Vec<&AttemptRow>;
    let chosen: &[&AttemptRow] = if tagged.is_empty() {
        untagged = attempts.iter().filter(|a| a.subject.is_none()).collect();
        if untagged.is_empty() {
            everything = attempts.iter().collect();
            &everything
        } else {
            &untagged
        }
    } else {
        &tagged
    };

    let total = chosen.len();
    let accuracy_pct = if total > 0 {
        let correct = chosen.iter().filter(|a| a.correct).count();
        Some(((correct as f64 / total as f64) * 100.0).round() as u8)
    } else {
        None
    };

    let window_start = now - Duration::hours(settings.pace_window_hours);
    let recent_sample = chosen
        .iter()
        .filter(|a| a.created_at >= window_start)
        .count();
    let pace = if recent_sample > settings.pace_fast_threshold {
        Pace::Fast
    } else {
        Pace::Slow
    };

    // The invalidation watermark covers the full loaded set, not just the
    // chosen fallback tier, so it lines up with the store's newest-attempt
    // timestamp.
    let last_attempt_at = attempts.iter().map(|a| a.created_at).max();

    ProgressSnapshot {
        accuracy_pct,
        pace,
        computed_at: Some(now),
        sample_size: total,
        recent_sample,
        last_attempt_at,
    }
}

/// Store-backed rollup with event-driven recompute.
pub struct ProgressRollup {
    store: Arc<StateStore>,
    settings: EngineSettings,
}

impl ProgressRollup {
    /// Create a new rollup over the given store.
    pub fn new(store: Arc<StateStore>, settings: EngineSettings) -> Self {
        Self { store, settings }
    }

    /// Current snapshot for a key, recomputing only when a newer attempt
    /// exists.
    ///
    /// Returns `(snapshot, recomputed)`. When `recomputed` is true the
    /// caller is responsible for persisting the snapshot (typically inside
    /// the progress patch); a recompute here never writes on its own.
    pub fn current(&self, key: &StateKey) -> EngineResult<(ProgressSnapshot, bool)> {
        let cached = self.store.get_snapshot(key)?.unwrap_or_default();
        let newest = self.store.newest_attempt_at(&key.user)?;

        if !cached.is_stale_for(newest) {
            return Ok((cached, false));
        }

        let attempts = self
            .store
            .get_attempts(&key.user, None, ATTEMPT_SAMPLE_LIMIT)?;
        let snapshot = compute_snapshot(&attempts, &key.subject, Utc::now(), &self.settings);
        debug!(
            subject = %key.subject,
            accuracy = ?snapshot.accuracy_pct,
            pace = snapshot.pace.as_str(),
            "progress snapshot recomputed"
        );
        Ok((snapshot, true))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
