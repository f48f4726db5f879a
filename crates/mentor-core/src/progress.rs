//! Progress types: attempt history, metric snapshots, and preferences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AttemptId, LessonId};

/// A single practice attempt read from the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRow {
    /// Attempt ID.
    pub id: AttemptId,
    /// Subject the attempt was tagged with, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Whether the answer was correct.
    pub correct: bool,
    /// When the attempt happened.
    pub created_at: DateTime<Utc>,
}

/// Learning pace derived from recent attempt volume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pace {
    /// Fewer recent attempts than the fast threshold.
    #[default]
    Slow,
    /// More recent attempts than the fast threshold.
    Fast,
}

impl Pace {
    /// Stable string form used in persona fingerprints.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Slow => "slow",
            Self::Fast => "fast",
        }
    }
}

/// A cached rollup of accuracy and pace for one (user, subject).
///
/// INVARIANT: recomputed only when the freshest attempt timestamp is newer
/// than `last_attempt_at` — event-driven invalidation, never a TTL.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Rounded accuracy percentage, or `None` with no graded attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_pct: Option<u8>,
    /// Learning pace.
    pub pace: Pace,
    /// When the snapshot was computed.
    pub computed_at: Option<DateTime<Utc>>,
    /// Number of attempts the accuracy was computed over.
    pub sample_size: usize,
    /// Number of attempts inside the pace window.
    pub recent_sample: usize,
    /// Timestamp of the newest attempt seen at compute time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl ProgressSnapshot {
    /// Whether a newer attempt than this snapshot has seen exists.
    #[must_use]
    pub fn is_stale_for(&self, newest_attempt: Option<DateTime<Utc>>) -> bool {
        match (newest_attempt, self.last_attempt_at) {
            (Some(newest), Some(seen)) => newest > seen,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

/// Accuracy band for compact persona signaling.
///
/// 0: <50 %, 1: 50–69 %, 2: 70–84 %, 3: ≥85 %.
#[must_use]
pub fn accuracy_band(pct: u8) -> u8 {
    match pct {
        0..=49 => 0,
        50..=69 => 1,
        70..=84 => 2,
        _ => 3,
    }
}

/// Kind of learner preference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceKind {
    /// Learner liked the lesson.
    Liked,
    /// Learner disliked the lesson.
    Disliked,
    /// Learner saved the lesson.
    Saved,
}

impl PreferenceKind {
    /// Stable string form used as the store discriminator.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Liked => "liked",
            Self::Disliked => "disliked",
            Self::Saved => "saved",
        }
    }

    /// Parse the store discriminator back to a kind.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "liked" => Some(Self::Liked),
            "disliked" => Some(Self::Disliked),
            "saved" => Some(Self::Saved),
            _ => None,
        }
    }
}

/// The learner's capped preference lists, most-recent-first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceSet {
    /// Liked lesson IDs.
    pub liked: Vec<LessonId>,
    /// Disliked lesson IDs.
    pub disliked: Vec<LessonId>,
    /// Saved lesson IDs.
    pub saved: Vec<LessonId>,
}

impl PreferenceSet {
    /// The list for a given kind.
    #[must_use]
    pub fn of(&self, kind: PreferenceKind) -> &[LessonId] {
        match kind {
            PreferenceKind::Liked => &self.liked,
            PreferenceKind::Disliked => &self.disliked,
            PreferenceKind::Saved => &self.saved,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
