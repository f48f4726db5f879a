//! Preference repository — capped liked/disliked/saved lists per learner.
//!
//! Re-recording a lesson moves it to most-recent rather than duplicating it;
//! each kind is trimmed to its retention cap inside the same write.

use rusqlite::{Connection, params};

use mentor_core::ids::LessonId;
use mentor_core::progress::{PreferenceKind, PreferenceSet};

use crate::errors::Result;

/// Preference repository — stateless, every method takes `&Connection`.
pub struct PreferenceRepo;

impl PreferenceRepo {
    /// Record a preference, de-duplicating on most-recent occurrence and
    /// trimming the kind's list to `cap`.
    pub fn record(
        conn: &Connection,
        user: &str,
        kind: PreferenceKind,
        lesson_id: &str,
        recorded_at: chrono::DateTime<chrono::Utc>,
        cap: usize,
    ) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO preferences (user_id, kind, lesson_id, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id, kind, lesson_id) DO UPDATE SET
               created_at = excluded.created_at",
            params![user, kind.as_str(), lesson_id, recorded_at.to_rfc3339()],
        )?;

        let _ = conn.execute(
            "DELETE FROM preferences
             WHERE user_id = ?1 AND kind = ?2
               AND lesson_id NOT IN (
                 SELECT lesson_id FROM preferences
                 WHERE user_id = ?1 AND kind = ?2
                 ORDER BY created_at DESC LIMIT ?3
               )",
            params![user, kind.as_str(), cap as i64],
        )?;
        Ok(())
    }

    /// Load the full preference set for a learner, most-recent-first per kind.
    pub fn get_set(conn: &Connection, user: &str) -> Result<PreferenceSet> {
        let mut stmt = conn.prepare(
            "SELECT kind, lesson_id FROM preferences
             WHERE user_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map([user], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut set = PreferenceSet::default();
        for (kind, lesson_id) in rows {
            let id = LessonId::from_string(lesson_id);
            match PreferenceKind::parse(&kind) {
                Some(PreferenceKind::Liked) => set.liked.push(id),
                Some(PreferenceKind::Disliked) => set.disliked.push(id),
                Some(PreferenceKind::Saved) => set.saved.push(id),
                // CHECK constraint makes this unreachable; skip defensively-typed rows.
                None => {}
            }
        }
        Ok(set)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
