//! Attempt repository — reads (and test-writes) on the `attempts` table.
//!
//! Attempt rows are produced by the grading flow, which lives outside this
//! service; the delivery engine only reads them for the progress rollup.

use rusqlite::{Connection, OptionalExtension, params};

use chrono::{DateTime, Utc};
use mentor_core::ids::AttemptId;
use mentor_core::progress::AttemptRow;

use crate::errors::Result;
use crate::row_types::parse_ts;

/// Attempt repository — stateless, every method takes `&Connection`.
pub struct AttemptRepo;

impl AttemptRepo {
    /// Insert an attempt row.
    pub fn insert(conn: &Connection, user: &str, attempt: &AttemptRow) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO attempts (id, user_id, subject, correct, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                attempt.id.as_str(),
                user,
                attempt.subject,
                i32::from(attempt.correct),
                attempt.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// List attempts for a user, newest first, optionally filtered by subject
    /// (case-insensitive).
    pub fn list(
        conn: &Connection,
        user: &str,
        subject: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AttemptRow>> {
        let (sql, params_vec): (&str, Vec<Box<dyn rusqlite::types::ToSql>>) = match subject {
            Some(subject) => (
                "SELECT id, subject, correct, created_at FROM attempts
                 WHERE user_id = ?1 AND subject IS NOT NULL AND LOWER(subject) = LOWER(?2)
                 ORDER BY created_at DESC LIMIT ?3",
                vec![
                    Box::new(user.to_owned()),
                    Box::new(subject.to_owned()),
                    Box::new(limit as i64),
                ],
            ),
            None => (
                "SELECT id, subject, correct, created_at FROM attempts
                 WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
                vec![Box::new(user.to_owned()), Box::new(limit as i64)],
            ),
        };

        let mut stmt = conn.prepare(sql)?;
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(Box::as_ref).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i32>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, subject, correct, created)| {
                Ok(AttemptRow {
                    id: AttemptId::from_string(id),
                    subject,
                    correct: correct != 0,
                    created_at: parse_ts("attempts", &created)?,
                })
            })
            .collect()
    }

    /// Timestamp of the newest attempt for a user, if any.
    pub fn newest_timestamp(conn: &Connection, user: &str) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT created_at FROM attempts WHERE user_id = ?1
                 ORDER BY created_at DESC LIMIT 1",
                [user],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|r| parse_ts("attempts", &r)).transpose()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use chrono::TimeZone;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn
    }

    fn attempt(id: &str, subject: Option<&str>, correct: bool, minute: u32) -> AttemptRow {
        AttemptRow {
            id: AttemptId::from(id),
            subject: subject.map(String::from),
            correct,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap(),
        }
    }

    #[test]
    fn insert_and_list_newest_first() {
        let conn = setup();
        AttemptRepo::insert(&conn, "u1", &attempt("a1", Some("Algebra 1"), true, 0)).unwrap();
        AttemptRepo::insert(&conn, "u1", &attempt("a2", Some("Algebra 1"), false, 5)).unwrap();

        let rows = AttemptRepo::list(&conn, "u1", None, 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id.as_str(), "a2");
        assert!(!rows[0].correct);
    }

    #[test]
    fn subject_filter_is_case_insensitive() {
        let conn = setup();
        AttemptRepo::insert(&conn, "u1", &attempt("a1", Some("Algebra 1"), true, 0)).unwrap();
        AttemptRepo::insert(&conn, "u1", &attempt("a2", Some("biology"), true, 1)).unwrap();
        AttemptRepo::insert(&conn, "u1", &attempt("a3", None, true, 2)).unwrap();

        let rows = AttemptRepo::list(&conn, "u1", Some("ALGEBRA 1"), 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id.as_str(), "a1");
    }

    #[test]
    fn list_respects_limit() {
        let conn = setup();
        for i in 0..5 {
            AttemptRepo::insert(&conn, "u1", &attempt(&format!("a{i}"), None, true, i)).unwrap();
        }
        let rows = AttemptRepo::list(&conn, "u1", None, 3).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn newest_timestamp_tracks_latest() {
        let conn = setup();
        assert!(AttemptRepo::newest_timestamp(&conn, "u1").unwrap().is_none());

        AttemptRepo::insert(&conn, "u1", &attempt("a1", None, true, 0)).unwrap();
        AttemptRepo::insert(&conn, "u1", &attempt("a2", None, true, 30)).unwrap();

        let newest = AttemptRepo::newest_timestamp(&conn, "u1").unwrap().unwrap();
        assert_eq!(newest, Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn users_are_isolated() {
        let conn = setup();
        AttemptRepo::insert(&conn, "u1", &attempt("a1", None, true, 0)).unwrap();
        let rows = AttemptRepo::list(&conn, "u2", None, 10).unwrap();
        assert!(rows.is_empty());
    }
}
