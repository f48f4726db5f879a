//! Learner-profile repository — interests and tone signature per learner.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::{Result, StoreError};
use crate::row_types::LearnerProfile;

/// Profile repository — stateless, every method takes `&Connection`.
pub struct ProfileRepo;

impl ProfileRepo {
    /// Get a learner's profile, if present.
    pub fn get(conn: &Connection, user: &str) -> Result<Option<LearnerProfile>> {
        let row = conn
            .query_row(
                "SELECT interests_json, tone_tags_json FROM learner_profiles WHERE user_id = ?1",
                [user],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((interests_json, tone_json)) = row else {
            return Ok(None);
        };

        let interests: Vec<String> =
            serde_json::from_str(&interests_json).map_err(|e| StoreError::Corrupt {
                table: "learner_profiles",
                message: format!("invalid interests JSON: {e}"),
            })?;
        let tone_tags: Vec<String> =
            serde_json::from_str(&tone_json).map_err(|e| StoreError::Corrupt {
                table: "learner_profiles",
                message: format!("invalid tone tags JSON: {e}"),
            })?;

        Ok(Some(LearnerProfile {
            interests,
            tone_tags,
        }))
    }

    /// Insert or replace a learner's profile.
    pub fn upsert(conn: &Connection, user: &str, profile: &LearnerProfile) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO learner_profiles (user_id, interests_json, tone_tags_json, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id) DO UPDATE SET
               interests_json = excluded.interests_json,
               tone_tags_json = excluded.tone_tags_json,
               updated_at = excluded.updated_at",
            params![
                user,
                serde_json::to_string(&profile.interests)?,
                serde_json::to_string(&profile.tone_tags)?,
                now,
            ],
        )?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
