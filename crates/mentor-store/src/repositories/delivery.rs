//! Delivery-record repository — the per-topic-label log of served lessons.
//!
//! Records are capped at a retention window per topic label; the trim runs
//! inside the same transaction as the append so readers never observe an
//! over-full list.

use rusqlite::{Connection, params};

use mentor_core::ids::LessonId;
use mentor_core::lesson::DeliveredLesson;
use mentor_embeddings::normalize::{blob_to_f32_vec, f32_slice_to_blob};

use crate::errors::Result;
use crate::keys::{StateKey, TopicKey};
use crate::row_types::parse_ts;

/// Delivery repository — stateless, every method takes `&Connection`.
pub struct DeliveryRepo;

impl DeliveryRepo {
    /// Append a delivered lesson for a topic label and trim to `retention`.
    ///
    /// Re-delivery of the same lesson ID refreshes its recency instead of
    /// duplicating the row.
    pub fn append(
        conn: &Connection,
        key: &TopicKey,
        record: &DeliveredLesson,
        retention: usize,
    ) -> Result<()> {
        let blob = record.embedding.as_deref().map(f32_slice_to_blob);
        let _ = conn.execute(
            "INSERT INTO delivery_records
               (user_id, subject, topic_label, lesson_id, title, embedding, delivered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (user_id, subject, topic_label, lesson_id) DO UPDATE SET
               title = excluded.title,
               embedding = excluded.embedding,
               delivered_at = excluded.delivered_at",
            params![
                key.state.user.as_str(),
                key.state.subject,
                key.topic_label,
                record.lesson_id.as_str(),
                record.title,
                blob,
                record.delivered_at.to_rfc3339(),
            ],
        )?;

        // Trim oldest rows beyond the retention window.
        let _ = conn.execute(
            "DELETE FROM delivery_records
             WHERE user_id = ?1 AND subject = ?2 AND topic_label = ?3
               AND lesson_id NOT IN (
                 SELECT lesson_id FROM delivery_records
                 WHERE user_id = ?1 AND subject = ?2 AND topic_label = ?3
                 ORDER BY delivered_at DESC LIMIT ?4
               )",
            params![
                key.state.user.as_str(),
                key.state.subject,
                key.topic_label,
                retention as i64,
            ],
        )?;
        Ok(())
    }

    /// List delivered lessons for a topic label, most recent first.
    pub fn list(conn: &Connection, key: &TopicKey, limit: usize) -> Result<Vec<DeliveredLesson>> {
        let mut stmt = conn.prepare(
            "SELECT lesson_id, title, embedding, delivered_at FROM delivery_records
             WHERE user_id = ?1 AND subject = ?2 AND topic_label = ?3
             ORDER BY delivered_at DESC LIMIT ?4",
        )?;
        let rows = stmt
            .query_map(
                params![
                    key.state.user.as_str(),
                    key.state.subject,
                    key.topic_label,
                    limit as i64
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<Vec<u8>>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(lesson_id, title, blob, delivered)| {
                Ok(DeliveredLesson {
                    lesson_id: LessonId::from_string(lesson_id),
                    title,
                    embedding: blob.as_deref().map(blob_to_f32_vec),
                    delivered_at: parse_ts("delivery_records", &delivered)?,
                })
            })
            .collect()
    }

    /// Most recent delivered embeddings across all topic labels of a subject.
    ///
    /// Rows without an embedding (embedding service was down at delivery
    /// time) are skipped.
    pub fn recent_embeddings(
        conn: &Connection,
        key: &StateKey,
        limit: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let mut stmt = conn.prepare(
            "SELECT embedding FROM delivery_records
             WHERE user_id = ?1 AND subject = ?2 AND embedding IS NOT NULL
             ORDER BY delivered_at DESC LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(
                params![key.user.as_str(), key.subject, limit as i64],
                |row| row.get::<_, Vec<u8>>(0),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows.iter().map(|blob| blob_to_f32_vec(blob)).collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
