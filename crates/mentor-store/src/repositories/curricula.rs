//! Curriculum repository — the subject → course mapping.
//!
//! A subject without a row here has no curriculum and cannot have a path
//! synthesized for it.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::row_types::CurriculumRow;

/// Curriculum repository — stateless, every method takes `&Connection`.
pub struct CurriculumRepo;

impl CurriculumRepo {
    /// Look up a curriculum mapping by subject (case-insensitive).
    pub fn get(conn: &Connection, subject: &str) -> Result<Option<CurriculumRow>> {
        let row = conn
            .query_row(
                "SELECT subject, course, outline FROM curricula
                 WHERE LOWER(subject) = LOWER(?1)",
                [subject],
                |row| {
                    Ok(CurriculumRow {
                        subject: row.get(0)?,
                        course: row.get(1)?,
                        outline: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Insert or replace a curriculum mapping.
    pub fn upsert(conn: &Connection, row: &CurriculumRow) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO curricula (subject, course, outline) VALUES (?1, ?2, ?3)
             ON CONFLICT (subject) DO UPDATE SET
               course = excluded.course,
               outline = excluded.outline",
            params![row.subject, row.course, row.outline],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn get_missing_returns_none() {
        let conn = setup();
        assert!(CurriculumRepo::get(&conn, "Algebra 1").unwrap().is_none());
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let conn = setup();
        CurriculumRepo::upsert(
            &conn,
            &CurriculumRow {
                subject: "Algebra 1".into(),
                course: "Math Foundations".into(),
                outline: "Linear equations, inequalities, graphing".into(),
            },
        )
        .unwrap();

        let row = CurriculumRepo::get(&conn, "algebra 1").unwrap().unwrap();
        assert_eq!(row.course, "Math Foundations");
    }

    #[test]
    fn upsert_replaces() {
        let conn = setup();
        let mut row = CurriculumRow {
            subject: "Biology".into(),
            course: "Life Science".into(),
            outline: String::new(),
        };
        CurriculumRepo::upsert(&conn, &row).unwrap();
        row.course = "Life Science II".into();
        CurriculumRepo::upsert(&conn, &row).unwrap();

        let back = CurriculumRepo::get(&conn, "Biology").unwrap().unwrap();
        assert_eq!(back.course, "Life Science II");
    }
}
