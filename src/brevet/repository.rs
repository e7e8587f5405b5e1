//! Read access to stored brevet controls.
//!
//! `RecordRepository` is the only thing the query layer sees. The SQLite
//! implementation keeps rows in insertion order (`ORDER BY id`), which is the
//! order listings come back in.

use super::record::ControlRecord;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::num::NonZeroU64;
use std::path::Path;

/// Ordered, read-only collection of control records.
pub trait RecordRepository: Send + Sync {
    /// Number of records currently stored.
    fn count(&self) -> Result<u64>;

    /// Records in store order, at most `limit` of them when given.
    fn list(&self, limit: Option<NonZeroU64>) -> Result<Vec<ControlRecord>>;
}

// ── SQLite store ────────────────────────────────────────────────

pub struct SqliteRecordRepository {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteRecordRepository {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data dir: {}", parent.display()))?;
        }
        let conn = rusqlite::Connection::open(db_path)
            .with_context(|| format!("Failed to open brevet DB: {}", db_path.display()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &rusqlite::Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS controls (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                open_time  TEXT NOT NULL,
                close_time TEXT NOT NULL,
                extra      TEXT NOT NULL DEFAULT '{}'
            );",
        )?;
        Ok(())
    }

    /// Append records in order. Used by the importer; the HTTP surface never
    /// writes.
    pub fn insert_many(&self, records: &[ControlRecord]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO controls (open_time, close_time, extra) VALUES (?1, ?2, ?3)",
            )?;
            for record in records {
                stmt.execute(rusqlite::params![
                    serde_json::to_string(&record.open_time)?,
                    serde_json::to_string(&record.close_time)?,
                    serde_json::to_string(&record.extra)?,
                ])?;
            }
        }
        tx.commit()?;
        tracing::info!(count = records.len(), "Control records imported");
        Ok(records.len())
    }
}

impl RecordRepository for SqliteRecordRepository {
    fn count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM controls", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn list(&self, limit: Option<NonZeroU64>) -> Result<Vec<ControlRecord>> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map_or(-1, |n| i64::try_from(n.get()).unwrap_or(i64::MAX));

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT open_time, close_time, extra FROM controls ORDER BY id LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(open_time, close_time, extra)| -> Result<ControlRecord> {
                Ok(ControlRecord {
                    open_time: serde_json::from_str(&open_time)
                        .context("Corrupt open_time column")?,
                    close_time: serde_json::from_str(&close_time)
                        .context("Corrupt close_time column")?,
                    extra: serde_json::from_str(&extra).context("Corrupt extra column")?,
                })
            })
            .collect()
    }
}

// ── In-memory store ─────────────────────────────────────────────

/// Vector-backed repository for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryRecordRepository {
    records: Vec<ControlRecord>,
}

impl InMemoryRecordRepository {
    pub fn new(records: Vec<ControlRecord>) -> Self {
        Self { records }
    }
}

impl RecordRepository for InMemoryRecordRepository {
    fn count(&self) -> Result<u64> {
        Ok(self.records.len() as u64)
    }

    fn list(&self, limit: Option<NonZeroU64>) -> Result<Vec<ControlRecord>> {
        let take = limit.map_or(self.records.len(), |n| {
            usize::try_from(n.get()).unwrap_or(usize::MAX)
        });
        Ok(self.records.iter().take(take).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn limit(n: u64) -> Option<NonZeroU64> {
        NonZeroU64::new(n)
    }

    fn sample() -> Vec<ControlRecord> {
        vec![
            ControlRecord::new(10, 20),
            ControlRecord::new(30, 40),
            ControlRecord::new("2017-01-01T05:53:00+00:00", "2017-01-01T08:00:00+00:00"),
        ]
    }

    #[test]
    fn sqlite_lists_in_insertion_order() {
        let repo = SqliteRecordRepository::open_in_memory().unwrap();
        assert_eq!(repo.count().unwrap(), 0);
        assert!(repo.list(None).unwrap().is_empty());

        repo.insert_many(&sample()).unwrap();
        assert_eq!(repo.count().unwrap(), 3);
        assert_eq!(repo.list(None).unwrap(), sample());
    }

    #[test]
    fn sqlite_applies_limit() {
        let repo = SqliteRecordRepository::open_in_memory().unwrap();
        repo.insert_many(&sample()).unwrap();

        let first = repo.list(limit(1)).unwrap();
        assert_eq!(first, vec![ControlRecord::new(10, 20)]);
        assert_eq!(repo.list(limit(2)).unwrap().len(), 2);
        assert_eq!(repo.list(limit(100)).unwrap().len(), 3);
        assert_eq!(repo.list(limit(u64::MAX)).unwrap().len(), 3);
    }

    #[test]
    fn sqlite_preserves_value_types_and_extra_fields() {
        let repo = SqliteRecordRepository::open_in_memory().unwrap();
        let mut record = ControlRecord::new(json!(10), json!("20"));
        record.extra.insert("km".into(), json!(200));
        repo.insert_many(std::slice::from_ref(&record)).unwrap();

        let listed = repo.list(None).unwrap();
        assert_eq!(listed[0].open_time, json!(10));
        assert_eq!(listed[0].close_time, json!("20"));
        assert_eq!(listed[0].extra.get("km"), Some(&json!(200)));
    }

    #[test]
    fn sqlite_store_persists_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("brevet.db");
        SqliteRecordRepository::open(&db_path)
            .unwrap()
            .insert_many(&sample())
            .unwrap();

        let reopened = SqliteRecordRepository::open(&db_path).unwrap();
        assert_eq!(reopened.count().unwrap(), 3);
    }

    #[test]
    fn in_memory_applies_limit() {
        let repo = InMemoryRecordRepository::new(sample());
        assert_eq!(repo.count().unwrap(), 3);
        assert_eq!(repo.list(None).unwrap(), sample());
        assert_eq!(repo.list(limit(2)).unwrap(), sample()[..2].to_vec());
        assert_eq!(repo.list(limit(u64::MAX)).unwrap().len(), 3);
    }
}
