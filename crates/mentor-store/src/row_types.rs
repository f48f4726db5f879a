//! Typed records produced at the store boundary.
//!
//! Raw `SQLite` rows are normalized into these structs inside the repository
//! layer. Untyped `serde_json::Value` never leaves this crate — a row that
//! fails normalization surfaces as [`crate::errors::StoreError::Corrupt`]
//! and callers treat the document as structurally invalid.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mentor_core::path::{CompletionMap, LearningPath, PathCursor};

use crate::errors::StoreError;

/// Fully normalized per-(user, subject) path state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathStateRecord {
    /// The curriculum tree.
    pub path: LearningPath,
    /// Current cursor position.
    pub cursor: PathCursor,
    /// Authoritative completion state.
    pub completion: CompletionMap,
    /// Pointer to the next incomplete focus label, if known.
    pub next_topic: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// A subject with recorded state, ordered by recency for subject resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubjectActivity {
    /// Subject name as stored.
    pub subject: String,
    /// Last update time of its path state.
    pub updated_at: DateTime<Utc>,
}

/// Learner profile: interests and recent tone signature.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearnerProfile {
    /// Subject interests, in onboarding order.
    pub interests: Vec<String>,
    /// Recent tone tags (e.g. `"playful"`, `"formal"`), most-recent-first.
    pub tone_tags: Vec<String>,
}

/// A curriculum mapping row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurriculumRow {
    /// Subject name as stored.
    pub subject: String,
    /// Course the subject belongs to.
    pub course: String,
    /// Free-text outline handed to path synthesis.
    pub outline: String,
}

/// Outcome of a generation-lock acquisition attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockStatus {
    /// The caller now holds the lease.
    Held,
    /// Another holder has an unexpired lease.
    Busy,
    /// The backing store cannot provide cross-process locks.
    Unsupported,
}

/// Parse an RFC 3339 timestamp column, mapping failure to a corrupt-row error.
pub(crate) fn parse_ts(table: &'static str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            table,
            message: format!("bad timestamp {raw:?}: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ts_accepts_rfc3339() {
        let ts = parse_ts("path_states", "2026-03-01T12:00:00Z").unwrap();
        assert_eq!(ts.timezone(), Utc);
    }

    #[test]
    fn parse_ts_rejects_garbage() {
        let err = parse_ts("path_states", "yesterday").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { table: "path_states", .. }));
    }

    #[test]
    fn learner_profile_serde_defaults() {
        let profile: LearnerProfile = serde_json::from_str("{}").unwrap();
        assert!(profile.interests.is_empty());
        assert!(profile.tone_tags.is_empty());
    }
}
