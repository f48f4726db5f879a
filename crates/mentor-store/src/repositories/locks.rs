//! Generation-lock repository — lease-based advisory locks per (user, subject).
//!
//! Path synthesis must run at most once per key across every process sharing
//! the database, so the lock is a row lease rather than an in-memory map. An
//! expired lease is reclaimable by any caller; release only honors the
//! original holder, so a slow first holder can't delete its successor's
//! lease.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::keys::StateKey;
use crate::row_types::{LockStatus, parse_ts};

/// Lock repository — stateless, every method takes `&Connection`.
pub struct LockRepo;

impl LockRepo {
    /// Try to acquire the lease for a key.
    pub fn acquire(
        conn: &Connection,
        key: &StateKey,
        holder: &str,
        lease_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<LockStatus> {
        let expires = (now + Duration::seconds(lease_secs)).to_rfc3339();

        let inserted = conn.execute(
            "INSERT INTO generation_locks (user_id, subject, holder, acquired_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (user_id, subject) DO NOTHING",
            params![
                key.user.as_str(),
                key.subject,
                holder,
                now.to_rfc3339(),
                expires
            ],
        )?;
        if inserted > 0 {
            return Ok(LockStatus::Held);
        }

        // Row exists; reclaim only if the lease expired.
        let existing: Option<String> = conn
            .query_row(
                "SELECT expires_at FROM generation_locks WHERE user_id = ?1 AND subject = ?2",
                params![key.user.as_str(), key.subject],
                |row| row.get(0),
            )
            .optional()?;
        let Some(raw_expiry) = existing else {
            // Deleted between the insert and the read: retry the insert once.
            let retried = conn.execute(
                "INSERT INTO generation_locks (user_id, subject, holder, acquired_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (user_id, subject) DO NOTHING",
                params![
                    key.user.as_str(),
                    key.subject,
                    holder,
                    now.to_rfc3339(),
                    expires
                ],
            )?;
            return Ok(if retried > 0 {
                LockStatus::Held
            } else {
                LockStatus::Busy
            });
        };

        if parse_ts("generation_locks", &raw_expiry)? > now {
            return Ok(LockStatus::Busy);
        }

        let reclaimed = conn.execute(
            "UPDATE generation_locks
             SET holder = ?3, acquired_at = ?4, expires_at = ?5
             WHERE user_id = ?1 AND subject = ?2 AND expires_at <= ?4",
            params![
                key.user.as_str(),
                key.subject,
                holder,
                now.to_rfc3339(),
                expires
            ],
        )?;
        Ok(if reclaimed > 0 {
            LockStatus::Held
        } else {
            LockStatus::Busy
        })
    }

    /// Release the lease, honoring only the original holder.
    pub fn release(conn: &Connection, key: &StateKey, holder: &str) -> Result<()> {
        let _ = conn.execute(
            "DELETE FROM generation_locks
             WHERE user_id = ?1 AND subject = ?2 AND holder = ?3",
            params![key.user.as_str(), key.subject, holder],
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
    use crate::migrations::run_migrations;
    use chrono::TimeZone;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn first_acquire_holds() {
        let conn = setup();
        let key = StateKey::new("u1", "Algebra 1");
        let status = LockRepo::acquire(&conn, &key, "req-1", 60, now()).unwrap();
        assert_eq!(status, LockStatus::Held);
    }

    #[test]
    fn second_acquire_busy_while_lease_valid() {
        let conn = setup();
        let key = StateKey::new("u1", "Algebra 1");
        let _ = LockRepo::acquire(&conn, &key, "req-1", 60, now()).unwrap();
        let status = LockRepo::acquire(&conn, &key, "req-2", 60, now()).unwrap();
        assert_eq!(status, LockStatus::Busy);
    }

    #[test]
    fn expired_lease_is_reclaimable() {
        let conn = setup();
        let key = StateKey::new("u1", "Algebra 1");
        let _ = LockRepo::acquire(&conn, &key, "req-1", 60, now()).unwrap();
        let later = now() + Duration::seconds(61);
        let status = LockRepo::acquire(&conn, &key, "req-2", 60, later).unwrap();
        assert_eq!(status, LockStatus::Held);
    }

    #[test]
    fn release_frees_the_lease() {
        let conn = setup();
        let key = StateKey::new("u1", "Algebra 1");
        let _ = LockRepo::acquire(&conn, &key, "req-1", 60, now()).unwrap();
        LockRepo::release(&conn, &key, "req-1").unwrap();
        let status = LockRepo::acquire(&conn, &key, "req-2", 60, now()).unwrap();
        assert_eq!(status, LockStatus::Held);
    }

    #[test]
    fn release_by_wrong_holder_is_ignored() {
        let conn = setup();
        let key = StateKey::new("u1", "Algebra 1");
        let _ = LockRepo::acquire(&conn, &key, "req-1", 60, now()).unwrap();
        LockRepo::release(&conn, &key, "req-2").unwrap();
        let status = LockRepo::acquire(&conn, &key, "req-3", 60, now()).unwrap();
        assert_eq!(status, LockStatus::Busy);
    }

    #[test]
    fn keys_are_independent() {
        let conn = setup();
        let a = StateKey::new("u1", "Algebra 1");
        let b = StateKey::new("u1", "Biology");
        let _ = LockRepo::acquire(&conn, &a, "req-1", 60, now()).unwrap();
        let status = LockRepo::acquire(&conn, &b, "req-1", 60, now()).unwrap();
        assert_eq!(status, LockStatus::Held);
    }
}
