//! Path-state repository — CRUD for the `path_states` table.
//!
//! The path document and completion map are stored as JSON columns and
//! normalized into [`PathStateRecord`] on every read. A row whose JSON no
//! longer parses is reported as corrupt so callers can regenerate the path
//! wholesale.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use mentor_core::path::{CompletionMap, LearningPath, PathCursor};

use crate::errors::{Result, StoreError};
use crate::keys::StateKey;
use crate::row_types::{PathStateRecord, SubjectActivity, parse_ts};

/// Path-state repository — stateless, every method takes `&Connection`.
pub struct PathStateRepo;

impl PathStateRepo {
    /// Get the normalized path state for a key, if present.
    pub fn get(conn: &Connection, key: &StateKey) -> Result<Option<PathStateRecord>> {
        let row = conn
            .query_row(
                "SELECT path_json, topic_index, subtopic_index, delivered_mini_count,
                        completion_json, next_topic, created_at, updated_at
                 FROM path_states WHERE user_id = ?1 AND subject = ?2",
                params![key.user.as_str(), key.subject],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((path_json, ti, si, mini, completion_json, next_topic, created, updated)) = row
        else {
            return Ok(None);
        };

        let path: LearningPath =
            serde_json::from_str(&path_json).map_err(|e| StoreError::Corrupt {
                table: "path_states",
                message: format!("invalid path JSON: {e}"),
            })?;
        let completion: CompletionMap =
            serde_json::from_str(&completion_json).map_err(|e| StoreError::Corrupt {
                table: "path_states",
                message: format!("invalid completion JSON: {e}"),
            })?;

        Ok(Some(PathStateRecord {
            path,
            cursor: PathCursor {
                topic_index: ti.max(0) as usize,
                subtopic_index: si.max(0) as usize,
                delivered_mini_count: mini.max(0) as u32,
            },
            completion,
            next_topic,
            created_at: parse_ts("path_states", &created)?,
            updated_at: parse_ts("path_states", &updated)?,
        }))
    }

    /// Insert or replace the whole path state for a key.
    pub fn upsert(
        conn: &Connection,
        key: &StateKey,
        path: &LearningPath,
        cursor: PathCursor,
        completion: &CompletionMap,
        next_topic: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO path_states
               (user_id, subject, path_json, topic_index, subtopic_index,
                delivered_mini_count, completion_json, next_topic, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT (user_id, subject) DO UPDATE SET
               path_json = excluded.path_json,
               topic_index = excluded.topic_index,
               subtopic_index = excluded.subtopic_index,
               delivered_mini_count = excluded.delivered_mini_count,
               completion_json = excluded.completion_json,
               next_topic = excluded.next_topic,
               updated_at = excluded.updated_at",
            params![
                key.user.as_str(),
                key.subject,
                serde_json::to_string(path)?,
                cursor.topic_index as i64,
                cursor.subtopic_index as i64,
                i64::from(cursor.delivered_mini_count),
                serde_json::to_string(completion)?,
                next_topic,
                now,
            ],
        )?;
        Ok(())
    }

    /// Update cursor, completion, and next-topic pointer in place.
    ///
    /// Used inside the atomic progress-patch transaction; the path document
    /// itself is untouched.
    pub fn update_progress(
        conn: &Connection,
        key: &StateKey,
        cursor: PathCursor,
        completion: &CompletionMap,
        next_topic: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let _ = conn.execute(
            "UPDATE path_states SET
               topic_index = ?3,
               subtopic_index = ?4,
               delivered_mini_count = ?5,
               completion_json = ?6,
               next_topic = ?7,
               updated_at = ?8
             WHERE user_id = ?1 AND subject = ?2",
            params![
                key.user.as_str(),
                key.subject,
                cursor.topic_index as i64,
                cursor.subtopic_index as i64,
                i64::from(cursor.delivered_mini_count),
                serde_json::to_string(completion)?,
                next_topic,
                now,
            ],
        )?;
        Ok(())
    }

    /// Delete the path state for a key.
    pub fn delete(conn: &Connection, key: &StateKey) -> Result<()> {
        let _ = conn.execute(
            "DELETE FROM path_states WHERE user_id = ?1 AND subject = ?2",
            params![key.user.as_str(), key.subject],
        )?;
        Ok(())
    }

    /// List subjects with state for a user, most recently updated first.
    pub fn list_for_user(conn: &Connection, user: &str) -> Result<Vec<SubjectActivity>> {
        let mut stmt = conn.prepare(
            "SELECT subject, updated_at FROM path_states
             WHERE user_id = ?1 ORDER BY updated_at DESC",
        )?;
        let rows = stmt
            .query_map([user], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(subject, updated)| {
                Ok(SubjectActivity {
                    subject,
                    updated_at: parse_ts("path_states", &updated)?,
                })
            })
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
