//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::*;

mod embedded {
    refinery::embed_migrations!("migrations");
}

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] refinery::Error),
    #[error("database connection lock poisoned")]
    Poisoned,
    #[error("Not found")]
    NotFound,
}

/// Thread-safe database store.
///
/// Each method holds the connection for its whole run, so a single call
/// sees a cycle commit entirely or not at all. Separate calls may observe
/// different cycles; use [`Store::outcome_counts`] when totals must agree.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at the given path and migrate it.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let mut conn = Connection::open(path)?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        embedded::migrations::runner().run(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    // --- Endpoints ---

    /// Add a new endpoint and return its ID.
    pub fn add_endpoint(&self, endpoint: &mut Endpoint) -> Result<i64, DbError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO endpoints (name, kind, address, port, enabled) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                endpoint.name,
                endpoint.kind,
                endpoint.address,
                endpoint.port,
                endpoint.enabled,
            ],
        )?;
        let id = conn.last_insert_rowid();
        endpoint.id = id;
        Ok(id)
    }

    /// Get all endpoints ordered by id.
    pub fn list_endpoints(&self) -> Result<Vec<Endpoint>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, kind, address, port, enabled FROM endpoints ORDER BY id",
        )?;
        let endpoints = stmt
            .query_map([], endpoint_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(endpoints)
    }

    /// Get the endpoints the scheduler should probe.
    pub fn list_enabled_endpoints(&self) -> Result<Vec<Endpoint>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, kind, address, port, enabled FROM endpoints WHERE enabled = 1 ORDER BY id",
        )?;
        let endpoints = stmt
            .query_map([], endpoint_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(endpoints)
    }

    /// Get an endpoint by ID.
    pub fn get_endpoint(&self, id: i64) -> Result<Endpoint, DbError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, kind, address, port, enabled FROM endpoints WHERE id = ?1",
            params![id],
            endpoint_from_row,
        )
        .optional()?
        .ok_or(DbError::NotFound)
    }

    /// Delete an endpoint and its outcomes.
    pub fn delete_endpoint(&self, id: i64) -> Result<(), DbError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM outcomes WHERE endpoint_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM endpoints WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(DbError::NotFound);
        }
        tx.commit()?;
        Ok(())
    }

    // --- Outcomes ---

    /// Append a single outcome.
    pub fn append_outcome(&self, outcome: &ProbeOutcome) -> Result<i64, DbError> {
        let conn = self.conn()?;
        insert_outcome(&conn, outcome)?;
        Ok(conn.last_insert_rowid())
    }

    /// Delete every outcome strictly older than the cutoff.
    pub fn delete_outcomes_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let conn = self.conn()?;
        Ok(delete_before(&conn, cutoff)?)
    }

    /// Append one cycle's outcomes and enforce retention in a single transaction.
    ///
    /// Either every outcome of the cycle is committed together with the
    /// retention delete, or nothing is.
    pub fn commit_cycle(
        &self,
        outcomes: &[ProbeOutcome],
        cutoff: DateTime<Utc>,
    ) -> Result<CycleCommit, DbError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        for outcome in outcomes {
            insert_outcome(&tx, outcome)?;
        }
        let deleted = delete_before(&tx, cutoff)?;

        tx.commit()?;
        Ok(CycleCommit {
            inserted: outcomes.len(),
            deleted,
        })
    }

    /// Count outcomes for an endpoint at or after `since`.
    pub fn count_outcomes(&self, endpoint_id: i64, since: DateTime<Utc>) -> Result<i64, DbError> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM outcomes WHERE endpoint_id = ?1 AND checked_at >= ?2",
            params![endpoint_id, db_time(&since)],
            |r| r.get(0),
        )?)
    }

    /// Count successful outcomes for an endpoint at or after `since`.
    pub fn count_successful_outcomes(
        &self,
        endpoint_id: i64,
        since: DateTime<Utc>,
    ) -> Result<i64, DbError> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM outcomes WHERE endpoint_id = ?1 AND checked_at >= ?2 AND success = 1",
            params![endpoint_id, db_time(&since)],
            |r| r.get(0),
        )?)
    }

    /// Total and successful outcome counts at or after `since`, read together.
    pub fn outcome_counts(&self, endpoint_id: i64, since: DateTime<Utc>) -> Result<(i64, i64), DbError> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(success), 0)
             FROM outcomes WHERE endpoint_id = ?1 AND checked_at >= ?2",
            params![endpoint_id, db_time(&since)],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?)
    }

    /// Newest-first outcomes for an endpoint.
    pub fn recent_outcomes(&self, endpoint_id: i64, limit: u32) -> Result<Vec<ProbeOutcome>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, endpoint_id, success, status_code, latency_ms, error, checked_at
             FROM outcomes WHERE endpoint_id = ?1 ORDER BY checked_at DESC, id DESC LIMIT ?2",
        )?;
        let outcomes = stmt
            .query_map(params![endpoint_id, limit], |row| {
                let time_str: String = row.get(6)?;
                let checked_at = parse_db_time(&time_str)
                    .ok_or_else(|| rusqlite::Error::InvalidColumnType(6, "checked_at".into(), Type::Text))?;
                Ok(ProbeOutcome {
                    id: row.get(0)?,
                    endpoint_id: row.get(1)?,
                    success: row.get(2)?,
                    status_code: row.get(3)?,
                    latency_ms: row.get(4)?,
                    error: row.get(5)?,
                    checked_at,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(outcomes)
    }
}

fn endpoint_from_row(row: &Row<'_>) -> SqlResult<Endpoint> {
    Ok(Endpoint {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: row.get(2)?,
        address: row.get(3)?,
        port: row.get(4)?,
        enabled: row.get(5)?,
    })
}

fn insert_outcome(conn: &Connection, outcome: &ProbeOutcome) -> SqlResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO outcomes (endpoint_id, success, status_code, latency_ms, error, checked_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    stmt.execute(params![
        outcome.endpoint_id,
        outcome.success,
        outcome.status_code,
        outcome.latency_ms,
        outcome.error,
        db_time(&outcome.checked_at),
    ])?;
    Ok(())
}

fn delete_before(conn: &Connection, cutoff: DateTime<Utc>) -> SqlResult<usize> {
    conn.execute(
        "DELETE FROM outcomes WHERE checked_at < ?1",
        params![db_time(&cutoff)],
    )
}

/// Format a timestamp so that text comparison matches time order.
fn db_time(t: &DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [TIME_FORMAT, "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tempfile::NamedTempFile;

    pub(crate) fn temp_store() -> (NamedTempFile, Store) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        (tmp, store)
    }

    pub(crate) fn add(store: &Store, name: &str, kind: &str, port: Option<u16>, enabled: bool) -> i64 {
        let mut endpoint = Endpoint {
            name: name.to_string(),
            kind: kind.to_string(),
            address: "127.0.0.1".to_string(),
            port,
            enabled,
            ..Default::default()
        };
        store.add_endpoint(&mut endpoint).unwrap()
    }

    pub(crate) fn outcome(endpoint_id: i64, success: bool, checked_at: DateTime<Utc>) -> ProbeOutcome {
        ProbeOutcome {
            id: 0,
            endpoint_id,
            success,
            status_code: None,
            latency_ms: 1.5,
            error: if success { None } else { Some("down".to_string()) },
            checked_at,
        }
    }

    #[test]
    fn test_endpoint_crud() {
        let (_tmp, store) = temp_store();

        let id = add(&store, "Test", "tcp", Some(22), true);
        assert!(id > 0);

        let fetched = store.get_endpoint(id).unwrap();
        assert_eq!(fetched.name, "Test");
        assert_eq!(fetched.port, Some(22));
        assert!(fetched.enabled);

        store.delete_endpoint(id).unwrap();
        assert!(matches!(store.get_endpoint(id), Err(DbError::NotFound)));
        assert!(matches!(store.delete_endpoint(id), Err(DbError::NotFound)));
    }

    #[test]
    fn test_list_enabled_skips_disabled() {
        let (_tmp, store) = temp_store();
        add(&store, "a", "icmp", None, true);
        add(&store, "b", "icmp", None, false);
        add(&store, "c", "http", None, true);

        let names: Vec<_> = store
            .list_enabled_endpoints()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(store.list_endpoints().unwrap().len(), 3);
    }

    #[test]
    fn test_outcome_round_trip_newest_first() {
        let (_tmp, store) = temp_store();
        let id = add(&store, "a", "http", None, true);
        let now = Utc::now();

        let mut older = outcome(id, true, now - ChronoDuration::minutes(5));
        older.status_code = Some(200);
        store.append_outcome(&older).unwrap();
        store.append_outcome(&outcome(id, false, now)).unwrap();

        let recent = store.recent_outcomes(id, 10).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(!recent[0].success);
        assert_eq!(recent[0].error.as_deref(), Some("down"));
        assert_eq!(recent[1].status_code, Some(200));
        assert_eq!(recent[1].checked_at, older.checked_at);

        assert_eq!(store.recent_outcomes(id, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_counts_respect_window() {
        let (_tmp, store) = temp_store();
        let id = add(&store, "a", "http", None, true);
        let now = Utc::now();
        let since = now - ChronoDuration::hours(1);

        store.append_outcome(&outcome(id, true, since)).unwrap();
        store.append_outcome(&outcome(id, false, now)).unwrap();
        store
            .append_outcome(&outcome(id, true, since - ChronoDuration::seconds(1)))
            .unwrap();

        assert_eq!(store.count_outcomes(id, since).unwrap(), 2);
        assert_eq!(store.count_successful_outcomes(id, since).unwrap(), 1);
        assert_eq!(store.count_outcomes(id + 1, since).unwrap(), 0);
        assert_eq!(store.outcome_counts(id, since).unwrap(), (2, 1));
        assert_eq!(store.outcome_counts(id + 1, since).unwrap(), (0, 0));
    }

    #[test]
    fn test_commit_cycle_appends_and_prunes() {
        let (_tmp, store) = temp_store();
        let id = add(&store, "a", "icmp", None, true);
        let now = Utc::now();
        let cutoff = now - ChronoDuration::days(7);

        store
            .append_outcome(&outcome(id, true, cutoff - ChronoDuration::seconds(1)))
            .unwrap();
        store.append_outcome(&outcome(id, true, cutoff)).unwrap();

        let batch = vec![outcome(id, true, now), outcome(id, false, now)];
        let commit = store.commit_cycle(&batch, cutoff).unwrap();
        assert_eq!(commit, CycleCommit { inserted: 2, deleted: 1 });
        assert_eq!(store.count_outcomes(id, cutoff).unwrap(), 3);

        let again = store.commit_cycle(&[], cutoff).unwrap();
        assert_eq!(again, CycleCommit::default());
    }

    #[test]
    fn test_delete_endpoint_removes_outcomes() {
        let (_tmp, store) = temp_store();
        let id = add(&store, "a", "icmp", None, true);
        let epoch = Utc::now() - ChronoDuration::days(1);
        store.append_outcome(&outcome(id, true, Utc::now())).unwrap();

        store.delete_endpoint(id).unwrap();
        assert_eq!(store.count_outcomes(id, epoch).unwrap(), 0);
    }

    #[test]
    fn test_parse_db_time_formats() {
        assert!(parse_db_time("2025-12-18 10:00:00.123456789").is_some());
        assert!(parse_db_time("2025-12-18 10:00:00").is_some());
        assert!(parse_db_time("2025-12-18T10:00:00+00:00").is_some());
        assert!(parse_db_time("yesterday").is_none());
    }
}
