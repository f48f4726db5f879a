//! Lesson-cache repository — the warm per-topic cache of generated lessons.
//!
//! Entries are keyed `(user, subject, topic_label, lesson_id)` and capped per
//! topic label. Eviction prefers the oldest entry whose persona no longer
//! matches the learner's current fingerprint; stale-persona entries are
//! otherwise retained so a persona revert can reuse them cheaply.

use rusqlite::{Connection, params};

use mentor_core::lesson::{CachedLesson, Lesson};
use mentor_embeddings::normalize::{blob_to_f32_vec, f32_slice_to_blob};

use crate::errors::{Result, StoreError};
use crate::keys::TopicKey;
use crate::row_types::parse_ts;

/// Cache repository — stateless, every method takes `&Connection`.
pub struct CacheRepo;

impl CacheRepo {
    /// List cache entries for a topic label, most recent first, dropping
    /// entries older than `max_age_hours`.
    ///
    /// Expired rows are deleted on the way out so the table doesn't
    /// accumulate dead entries.
    pub fn get(
        conn: &Connection,
        key: &TopicKey,
        max_age_hours: i64,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<CachedLesson>> {
        let horizon = (now - chrono::Duration::hours(max_age_hours)).to_rfc3339();
        let _ = conn.execute(
            "DELETE FROM lesson_cache
             WHERE user_id = ?1 AND subject = ?2 AND topic_label = ?3 AND cached_at < ?4",
            params![
                key.state.user.as_str(),
                key.state.subject,
                key.topic_label,
                horizon
            ],
        )?;

        let mut stmt = conn.prepare(
            "SELECT payload_json, persona_hash, embedding, next_topic_hint, cached_at
             FROM lesson_cache
             WHERE user_id = ?1 AND subject = ?2 AND topic_label = ?3
             ORDER BY cached_at DESC",
        )?;
        let rows = stmt
            .query_map(
                params![key.state.user.as_str(), key.state.subject, key.topic_label],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<Vec<u8>>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(payload, persona_hash, blob, hint, cached)| {
                let lesson: Lesson =
                    serde_json::from_str(&payload).map_err(|e| StoreError::Corrupt {
                        table: "lesson_cache",
                        message: format!("invalid lesson JSON: {e}"),
                    })?;
                Ok(CachedLesson {
                    lesson,
                    cached_at: parse_ts("lesson_cache", &cached)?,
                    persona_hash,
                    embedding: blob.as_deref().map(blob_to_f32_vec),
                    next_topic_hint: hint,
                })
            })
            .collect()
    }

    /// Insert a cache entry at the front and enforce the per-label cap.
    ///
    /// A duplicate lesson ID is replaced (recency refresh). When over cap,
    /// eviction removes the oldest entry whose persona differs from the
    /// inserted entry's persona; if every entry matches, the oldest overall
    /// goes.
    pub fn put(conn: &Connection, key: &TopicKey, entry: &CachedLesson, cap: usize) -> Result<()> {
        let blob = entry.embedding.as_deref().map(f32_slice_to_blob);
        let _ = conn.execute(
            "INSERT INTO lesson_cache
               (user_id, subject, topic_label, lesson_id, payload_json,
                persona_hash, embedding, next_topic_hint, cached_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (user_id, subject, topic_label, lesson_id) DO UPDATE SET
               payload_json = excluded.payload_json,
               persona_hash = excluded.persona_hash,
               embedding = excluded.embedding,
               next_topic_hint = excluded.next_topic_hint,
               cached_at = excluded.cached_at",
            params![
                key.state.user.as_str(),
                key.state.subject,
                key.topic_label,
                entry.lesson.id.as_str(),
                serde_json::to_string(&entry.lesson)?,
                entry.persona_hash,
                blob,
                entry.next_topic_hint,
                entry.cached_at.to_rfc3339(),
            ],
        )?;

        loop {
            let count: i64 = conn.query_row(
                "SELECT count(*) FROM lesson_cache
                 WHERE user_id = ?1 AND subject = ?2 AND topic_label = ?3",
                params![key.state.user.as_str(), key.state.subject, key.topic_label],
                |row| row.get(0),
            )?;
            if count <= cap as i64 {
                break;
            }

            // Prefer evicting a stale-persona entry; fall back to oldest.
            let evicted = conn.execute(
                "DELETE FROM lesson_cache WHERE rowid = (
                   SELECT rowid FROM lesson_cache
                   WHERE user_id = ?1 AND subject = ?2 AND topic_label = ?3
                     AND persona_hash != ?4
                   ORDER BY cached_at ASC LIMIT 1
                 )",
                params![
                    key.state.user.as_str(),
                    key.state.subject,
                    key.topic_label,
                    entry.persona_hash
                ],
            )?;
            if evicted == 0 {
                let _ = conn.execute(
                    "DELETE FROM lesson_cache WHERE rowid = (
                       SELECT rowid FROM lesson_cache
                       WHERE user_id = ?1 AND subject = ?2 AND topic_label = ?3
                       ORDER BY cached_at ASC LIMIT 1
                     )",
                    params![key.state.user.as_str(), key.state.subject, key.topic_label],
                )?;
            }
        }
        Ok(())
    }

    /// Refresh the recency of an entry that was just served from cache.
    pub fn touch(
        conn: &Connection,
        key: &TopicKey,
        lesson_id: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let _ = conn.execute(
            "UPDATE lesson_cache SET cached_at = ?5
             WHERE user_id = ?1 AND subject = ?2 AND topic_label = ?3 AND lesson_id = ?4",
            params![
                key.state.user.as_str(),
                key.state.subject,
                key.topic_label,
                lesson_id,
                now.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::StateKey;
    use crate::migrations::run_migrations;
    use chrono::{TimeZone, Utc};
    use mentor_core::ids::LessonId;
    use mentor_core::lesson::LessonBody;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn
    }

    fn key() -> TopicKey {
        TopicKey::new(StateKey::new("u1", "Algebra 1"), "Topic 1 > Subtopic 1")
    }

    fn entry(id: &str, persona: &str, minute: u32) -> CachedLesson {
        CachedLesson {
            lesson: Lesson {
                id: LessonId::from(id),
                title: format!("Lesson {id}"),
                topic_label: "Topic 1 > Subtopic 1".into(),
                body: LessonBody {
                    explanation: "Combine like terms first.".into(),
                    example: None,
                    question: None,
                },
                created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap(),
            },
            cached_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap(),
            persona_hash: persona.into(),
            embedding: Some(vec![1.0, 0.0]),
            next_topic_hint: None,
        }
    }

    #[test]
    fn put_then_get_returns_entry_first() {
        let conn = setup();
        let e = entry("a", "p1", 0);
        CacheRepo::put(&conn, &key(), &e, 5).unwrap();
        let entries = CacheRepo::get(&conn, &key(), 72, e.cached_at).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].lesson.id.as_str(), "a");
        assert_eq!(entries[0].embedding.as_deref(), Some(&[1.0_f32, 0.0][..]));
    }

    #[test]
    fn get_is_most_recent_first() {
        let conn = setup();
        CacheRepo::put(&conn, &key(), &entry("a", "p1", 0), 5).unwrap();
        CacheRepo::put(&conn, &key(), &entry("b", "p1", 5), 5).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 10, 0).unwrap();
        let entries = CacheRepo::get(&conn, &key(), 72, now).unwrap();
        assert_eq!(entries[0].lesson.id.as_str(), "b");
    }

    #[test]
    fn sixth_insert_evicts_to_cap_of_five() {
        let conn = setup();
        for i in 0..6 {
            CacheRepo::put(&conn, &key(), &entry(&format!("l{i}"), "p1", i), 5).unwrap();
        }
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 10, 0).unwrap();
        let entries = CacheRepo::get(&conn, &key(), 72, now).unwrap();
        assert_eq!(entries.len(), 5);
        // The oldest entry went.
        assert!(entries.iter().all(|e| e.lesson.id.as_str() != "l0"));
    }

    #[test]
    fn eviction_prefers_stale_persona() {
        let conn = setup();
        CacheRepo::put(&conn, &key(), &entry("old-match", "p2", 0), 3).unwrap();
        CacheRepo::put(&conn, &key(), &entry("stale", "p1", 1), 3).unwrap();
        CacheRepo::put(&conn, &key(), &entry("newer-match", "p2", 2), 3).unwrap();
        // Inserting a fourth entry with persona p2 should evict "stale" even
        // though "old-match" is older.
        CacheRepo::put(&conn, &key(), &entry("newest", "p2", 3), 3).unwrap();

        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 10, 0).unwrap();
        let entries = CacheRepo::get(&conn, &key(), 72, now).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.lesson.id.as_str() != "stale"));
        assert!(entries.iter().any(|e| e.lesson.id.as_str() == "old-match"));
    }

    #[test]
    fn duplicate_id_replaces_instead_of_duplicating() {
        let conn = setup();
        CacheRepo::put(&conn, &key(), &entry("a", "p1", 0), 5).unwrap();
        CacheRepo::put(&conn, &key(), &entry("a", "p2", 5), 5).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 10, 0).unwrap();
        let entries = CacheRepo::get(&conn, &key(), 72, now).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].persona_hash, "p2");
    }

    #[test]
    fn expired_entries_filtered_and_deleted() {
        let conn = setup();
        CacheRepo::put(&conn, &key(), &entry("old", "p1", 0), 5).unwrap();
        let much_later = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let entries = CacheRepo::get(&conn, &key(), 72, much_later).unwrap();
        assert!(entries.is_empty());

        let count: i64 = conn
            .query_row("SELECT count(*) FROM lesson_cache", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0, "expired rows purged");
    }

    #[test]
    fn touch_refreshes_recency() {
        let conn = setup();
        CacheRepo::put(&conn, &key(), &entry("a", "p1", 0), 5).unwrap();
        CacheRepo::put(&conn, &key(), &entry("b", "p1", 5), 5).unwrap();

        let later = Utc.with_ymd_and_hms(2026, 3, 1, 13, 0, 0).unwrap();
        CacheRepo::touch(&conn, &key(), "a", later).unwrap();

        let entries = CacheRepo::get(&conn, &key(), 72, later).unwrap();
        assert_eq!(entries[0].lesson.id.as_str(), "a");
    }
}
