//! Pending-lesson repository — the bounded FIFO of pre-generated lessons.
//!
//! The queue exists purely to mask generation latency; validity of its
//! contents is re-checked by the consumer at read time, so this layer only
//! enforces depth and FIFO order.

use rusqlite::{Connection, OptionalExtension, params};

use mentor_core::lesson::{Lesson, PendingLesson};
use mentor_embeddings::normalize::{blob_to_f32_vec, f32_slice_to_blob};

use crate::errors::{Result, StoreError};
use crate::keys::StateKey;
use crate::row_types::parse_ts;

/// Pending repository — stateless, every method takes `&Connection`.
pub struct PendingRepo;

impl PendingRepo {
    /// Current queue depth for a key.
    pub fn depth(conn: &Connection, key: &StateKey) -> Result<usize> {
        let count: i64 = conn.query_row(
            "SELECT count(*) FROM pending_lessons WHERE user_id = ?1 AND subject = ?2",
            params![key.user.as_str(), key.subject],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }

    /// Enqueue a pending lesson, refusing when the queue is at `max_depth`.
    pub fn enqueue(
        conn: &Connection,
        key: &StateKey,
        topic_label: &str,
        lesson: &Lesson,
        persona_hash: &str,
        embedding: Option<&[f32]>,
        enqueued_at: chrono::DateTime<chrono::Utc>,
        max_depth: usize,
    ) -> Result<i64> {
        let depth = Self::depth(conn, key)?;
        if depth >= max_depth {
            return Err(StoreError::QueueFull { depth });
        }

        let blob = embedding.map(f32_slice_to_blob);
        let _ = conn.execute(
            "INSERT INTO pending_lessons
               (user_id, subject, topic_label, payload_json, persona_hash, embedding, enqueued_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                key.user.as_str(),
                key.subject,
                topic_label,
                serde_json::to_string(lesson)?,
                persona_hash,
                blob,
                enqueued_at.to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Dequeue the oldest pending lesson for a key, removing it.
    ///
    /// The row is destroyed regardless of whether the caller ends up serving
    /// it — rejected lessons are never requeued.
    pub fn dequeue(conn: &Connection, key: &StateKey) -> Result<Option<PendingLesson>> {
        let row = conn
            .query_row(
                "SELECT seq, topic_label, payload_json, persona_hash, embedding, enqueued_at
                 FROM pending_lessons
                 WHERE user_id = ?1 AND subject = ?2
                 ORDER BY seq ASC LIMIT 1",
                params![key.user.as_str(), key.subject],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<Vec<u8>>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((seq, _topic_label, payload, persona_hash, blob, enqueued)) = row else {
            return Ok(None);
        };

        let _ = conn.execute("DELETE FROM pending_lessons WHERE seq = ?1", params![seq])?;

        let lesson: Lesson = serde_json::from_str(&payload).map_err(|e| StoreError::Corrupt {
            table: "pending_lessons",
            message: format!("invalid lesson JSON: {e}"),
        })?;

        Ok(Some(PendingLesson {
            seq,
            lesson,
            persona_hash,
            embedding: blob.as_deref().map(blob_to_f32_vec),
            enqueued_at: parse_ts("pending_lessons", &enqueued)?,
        }))
    }

    /// Drop every queued lesson for a key (e.g. after a path reset).
    pub fn clear(conn: &Connection, key: &StateKey) -> Result<usize> {
        let removed = conn.execute(
            "DELETE FROM pending_lessons WHERE user_id = ?1 AND subject = ?2",
            params![key.user.as_str(), key.subject],
        )?;
        Ok(removed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
