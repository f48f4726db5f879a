//! Progress-snapshot repository — CRUD for the `progress_snapshots` table.

use rusqlite::{Connection, OptionalExtension, params};

use mentor_core::progress::{Pace, ProgressSnapshot};

use crate::errors::Result;
use crate::keys::StateKey;
use crate::row_types::parse_ts;

/// Snapshot repository — stateless, every method takes `&Connection`.
pub struct SnapshotRepo;

impl SnapshotRepo {
    /// Get the cached snapshot for a key, if present.
    pub fn get(conn: &Connection, key: &StateKey) -> Result<Option<ProgressSnapshot>> {
        let row = conn
            .query_row(
                "SELECT accuracy_pct, pace, computed_at, sample_size, recent_sample, last_attempt_at
                 FROM progress_snapshots WHERE user_id = ?1 AND subject = ?2",
                params![key.user.as_str(), key.subject],
                |row| {
                    Ok((
                        row.get::<_, Option<i64>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((accuracy, pace, computed, sample, recent, last_attempt)) = row else {
            return Ok(None);
        };

        Ok(Some(ProgressSnapshot {
            accuracy_pct: accuracy.map(|a| a.clamp(0, 100) as u8),
            pace: if pace == "fast" { Pace::Fast } else { Pace::Slow },
            computed_at: computed
                .map(|c| parse_ts("progress_snapshots", &c))
                .transpose()?,
            sample_size: sample.max(0) as usize,
            recent_sample: recent.max(0) as usize,
            last_attempt_at: last_attempt
                .map(|l| parse_ts("progress_snapshots", &l))
                .transpose()?,
        }))
    }

    /// Insert or replace the snapshot for a key.
    pub fn upsert(conn: &Connection, key: &StateKey, snapshot: &ProgressSnapshot) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO progress_snapshots
               (user_id, subject, accuracy_pct, pace, computed_at,
                sample_size, recent_sample, last_attempt_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (user_id, subject) DO UPDATE SET
               accuracy_pct = excluded.accuracy_pct,
               pace = excluded.pace,
               computed_at = excluded.computed_at,
               sample_size = excluded.sample_size,
               recent_sample = excluded.recent_sample,
               last_attempt_at = excluded.last_attempt_at",
            params![
                key.user.as_str(),
                key.subject,
                snapshot.accuracy_pct.map(i64::from),
                snapshot.pace.as_str(),
                snapshot.computed_at.map(|t| t.to_rfc3339()),
                snapshot.sample_size as i64,
                snapshot.recent_sample as i64,
                snapshot.last_attempt_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
