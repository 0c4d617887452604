//! SQLite storage for cached responses and marketplace records
//!
//! Provides a `ResponseCache` holding two tables: `responses` (key, date,
//! JSON blob) and `posted` (append-only price records). Every mutating call
//! is a single auto-committed statement, so it is on disk when it returns.

use std::path::Path;
use std::sync::Mutex;

use chrono::{Local, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use super::{CacheKey, PostedSaleRecord};

/// Date format used for every stored timestamp
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Serializes first-time schema creation within this process
static SCHEMA_LOCK: Mutex<()> = Mutex::new(());

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS responses (
        key TEXT PRIMARY KEY,
        last_update TEXT NOT NULL,
        data BLOB NOT NULL
    );
    CREATE TABLE IF NOT EXISTS posted (
        id INTEGER NOT NULL,
        price REAL NOT NULL,
        count INTEGER NOT NULL,
        sales_hi REAL,
        sales_lo REAL,
        sales_avg REAL,
        sales_mdn REAL,
        date TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS posted_id_date ON posted (id, date);
";

/// Errors raised by the storage layer
#[derive(Debug, Error)]
pub enum CacheError {
    /// SQLite failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A payload could not be encoded or decoded
    #[error("Invalid cached payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// A stored date is not `YYYY-MM-DD`
    #[error("Invalid stored date: '{0}'")]
    InvalidDate(String),

    /// The database directory could not be created
    #[error("Failed to prepare cache directory: {0}")]
    Io(#[from] std::io::Error),
}

/// A payload read back from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    /// The decoded payload
    pub payload: Value,
    /// Day the payload was written
    pub last_update: NaiveDate,
}

/// Today's date in local time
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Number of whole days between `date` and today
///
/// Dates in the future give a negative age.
pub fn age_in_days(date: NaiveDate) -> i64 {
    (today() - date).num_days()
}

fn parse_date(raw: &str) -> Result<NaiveDate, CacheError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| CacheError::InvalidDate(raw.to_string()))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Persistent response cache
///
/// Owns a single SQLite connection. Open it once at startup, pass it where it
/// is needed, and [`close`](ResponseCache::close) it at shutdown.
#[derive(Debug)]
pub struct ResponseCache {
    conn: Connection,
}

impl ResponseCache {
    /// Opens (and if needed creates) the cache database at `path`
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "Opened response cache");
        Self::with_connection(conn)
    }

    /// Opens a throwaway in-memory cache
    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut conn: Connection) -> Result<Self, CacheError> {
        Self::initialize_schema(&mut conn)?;
        Ok(Self { conn })
    }

    fn initialize_schema(conn: &mut Connection) -> Result<(), CacheError> {
        let _guard = SCHEMA_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let exists: bool = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'responses')",
            [],
            |row| row.get(0),
        )?;
        if !exists {
            info!("Creating new database");
        }

        // IMMEDIATE takes the write lock up front so two processes opening a
        // fresh file cannot interleave their CREATE statements.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(SCHEMA)?;
        tx.commit()?;
        Ok(())
    }

    /// Closes the underlying connection, reporting any pending error
    pub fn close(self) -> Result<(), CacheError> {
        self.conn.close().map_err(|(_, e)| CacheError::Database(e))
    }

    /// Looks up a cached payload
    ///
    /// # Returns
    /// * `Ok(Some(CachedResponse))` if an entry exists for `key`
    /// * `Ok(None)` if there is no entry
    /// * `Err` if the database fails or the stored blob is unreadable
    pub fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, CacheError> {
        let row = self
            .conn
            .query_row(
                "SELECT last_update, data FROM responses WHERE key = ?1",
                params![key.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)),
            )
            .optional()?;

        let Some((last_update, blob)) = row else {
            return Ok(None);
        };

        Ok(Some(CachedResponse {
            payload: serde_json::from_slice(&blob)?,
            last_update: parse_date(&last_update)?,
        }))
    }

    /// Stores a payload under `key`, stamped with today's date
    ///
    /// Any existing entry for the key is replaced.
    pub fn put(&self, key: &CacheKey, payload: &Value) -> Result<(), CacheError> {
        let blob = serde_json::to_vec(payload)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO responses (key, last_update, data) VALUES (?1, ?2, ?3)",
            params![key.to_string(), format_date(today()), blob],
        )?;
        debug!(%key, "Cached response");
        Ok(())
    }

    /// Removes the entry for `key`; an absent key is not an error
    pub fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        let removed = self
            .conn
            .execute("DELETE FROM responses WHERE key = ?1", params![key.to_string()])?;
        debug!(%key, removed, "Deleted cached response");
        Ok(())
    }

    /// Appends a marketplace record
    pub fn put_record(&self, record: &PostedSaleRecord) -> Result<(), CacheError> {
        self.conn.execute(
            "INSERT INTO posted (id, price, count, sales_hi, sales_lo, sales_avg, sales_mdn, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id as i64,
                record.price,
                record.count,
                record.sales_hi,
                record.sales_lo,
                record.sales_avg,
                record.sales_mdn,
                format_date(record.date),
            ],
        )?;
        Ok(())
    }

    /// All records for a release, newest first
    pub fn records(&self, id: u64) -> Result<Vec<PostedSaleRecord>, CacheError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, price, count, sales_hi, sales_lo, sales_avg, sales_mdn, date
             FROM posted WHERE id = ?1 ORDER BY date DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(params![id as i64], raw_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    /// The newest record for a release, if it is at most `max_age` days old
    ///
    /// Returns `Ok(None)` both when no record exists and when the newest one
    /// is too old; either way the caller needs fresh data.
    pub fn get_latest_record(
        &self,
        id: u64,
        max_age: i64,
    ) -> Result<Option<PostedSaleRecord>, CacheError> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, price, count, sales_hi, sales_lo, sales_avg, sales_mdn, date
                 FROM posted WHERE id = ?1 ORDER BY date DESC, rowid DESC LIMIT 1",
                params![id as i64],
                raw_record,
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let record = raw.into_record()?;
        if age_in_days(record.date) <= max_age {
            Ok(Some(record))
        } else {
            debug!(id, date = %record.date, max_age, "Latest record is stale");
            Ok(None)
        }
    }
}

/// Row shape before the date column is parsed
struct RawRecord {
    id: i64,
    price: f64,
    count: u32,
    sales_hi: Option<f64>,
    sales_lo: Option<f64>,
    sales_avg: Option<f64>,
    sales_mdn: Option<f64>,
    date: String,
}

fn raw_record(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        id: row.get(0)?,
        price: row.get(1)?,
        count: row.get(2)?,
        sales_hi: row.get(3)?,
        sales_lo: row.get(4)?,
        sales_avg: row.get(5)?,
        sales_mdn: row.get(6)?,
        date: row.get(7)?,
    })
}

impl RawRecord {
    fn into_record(self) -> Result<PostedSaleRecord, CacheError> {
        Ok(PostedSaleRecord {
            id: self.id as u64,
            price: self.price,
            count: self.count,
            sales_hi: self.sales_hi,
            sales_lo: self.sales_lo,
            sales_avg: self.sales_avg,
            sales_mdn: self.sales_mdn,
            date: parse_date(&self.date)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_cache() -> ResponseCache {
        ResponseCache::open_in_memory().expect("Failed to open in-memory cache")
    }

    #[test]
    fn test_get_returns_none_for_missing_key() {
        let cache = create_test_cache();
        let result = cache.get(&CacheKey::Release(1)).expect("Get should succeed");
        assert!(result.is_none());
    }

    #[test]
    fn test_put_then_get_roundtrips_nested_payload() {
        let cache = create_test_cache();
        let payload = json!({
            "title": "Selected Ambient Works",
            "year": 1992,
            "tracklist": [
                {"position": "A1", "title": "Xtal", "type_": "track"},
                {"position": "A2", "title": "Tha", "type_": "track", "extra": null}
            ],
            "labels": [{"name": "Apollo", "catno": "AMB 3922"}],
            "community": {"have": 1.5, "flags": [true, false]}
        });

        cache.put(&CacheKey::Release(42), &payload).expect("Put should succeed");
        let cached = cache
            .get(&CacheKey::Release(42))
            .expect("Get should succeed")
            .expect("Entry should exist");

        assert_eq!(cached.payload, payload);
        assert_eq!(cached.last_update, today());
    }

    #[test]
    fn test_put_overwrites_existing_entry() {
        let cache = create_test_cache();
        let key = CacheKey::Release(7);

        cache.put(&key, &json!({"year": 1999})).unwrap();
        cache.put(&key, &json!({"year": 2001, "tracklist": []})).unwrap();

        let cached = cache.get(&key).unwrap().unwrap();
        assert_eq!(cached.payload, json!({"year": 2001, "tracklist": []}));
    }

    #[test]
    fn test_delete_then_get_returns_none() {
        let cache = create_test_cache();
        let key = CacheKey::Release(9);

        cache.put(&key, &json!({"year": 1999})).unwrap();
        cache.delete(&key).expect("Delete should succeed");

        assert!(cache.get(&key).unwrap().is_none());
    }

    #[test]
    fn test_delete_missing_key_is_not_an_error() {
        let cache = create_test_cache();
        assert!(cache.delete(&CacheKey::Release(404)).is_ok());
    }

    #[test]
    fn test_entries_persist_across_reopen() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("nested").join("disctool.db");

        let cache = ResponseCache::open(&path).expect("Open should succeed");
        cache.put(&CacheKey::Release(5), &json!({"tracklist": []})).unwrap();
        cache.close().expect("Close should succeed");

        assert!(path.exists(), "Database file should exist");

        let reopened = ResponseCache::open(&path).expect("Reopen should succeed");
        let cached = reopened.get(&CacheKey::Release(5)).unwrap();
        assert_eq!(cached.map(|c| c.payload), Some(json!({"tracklist": []})));
    }

    #[test]
    fn test_opening_twice_keeps_schema() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("disctool.db");

        let first = ResponseCache::open(&path).unwrap();
        let second = ResponseCache::open(&path).unwrap();
        first.put(&CacheKey::Release(1), &json!({"a": 1})).unwrap();
        assert!(second.get(&CacheKey::Release(1)).unwrap().is_some());
    }

    #[test]
    fn test_age_in_days() {
        assert_eq!(age_in_days(today()), 0);
        assert_eq!(age_in_days(today() - Duration::days(3)), 3);
        assert_eq!(age_in_days(today() + Duration::days(1)), -1);
    }

    #[test]
    fn test_latest_record_absent_when_no_records() {
        let cache = create_test_cache();
        for max_age in [0, 7, 10_000] {
            assert!(cache.get_latest_record(3, max_age).unwrap().is_none());
        }
    }

    #[test]
    fn test_latest_record_within_max_age() {
        let cache = create_test_cache();
        let record = PostedSaleRecord::new(3, 12.5, 4).dated(today() - Duration::days(2));
        cache.put_record(&record).unwrap();

        assert_eq!(cache.get_latest_record(3, 2).unwrap(), Some(record.clone()));
        assert_eq!(cache.get_latest_record(3, 7).unwrap(), Some(record));
    }

    #[test]
    fn test_latest_record_too_old_is_absent() {
        let cache = create_test_cache();
        let record = PostedSaleRecord::new(3, 12.5, 4).dated(today() - Duration::days(8));
        cache.put_record(&record).unwrap();

        assert!(cache.get_latest_record(3, 7).unwrap().is_none());
    }

    #[test]
    fn test_latest_record_picks_newest_date() {
        let cache = create_test_cache();
        let newer = PostedSaleRecord::new(3, 20.0, 1).dated(today() - Duration::days(1));
        let older = PostedSaleRecord::new(3, 10.0, 9).dated(today() - Duration::days(30));
        cache.put_record(&newer).unwrap();
        cache.put_record(&older).unwrap();
        cache.put_record(&PostedSaleRecord::new(4, 1.0, 1)).unwrap();

        let latest = cache.get_latest_record(3, 7).unwrap().expect("Record should be fresh");
        assert_eq!(latest.price, 20.0);
        assert_eq!(cache.records(3).unwrap(), vec![newer, older]);
    }

    #[test]
    fn test_record_sales_fields_roundtrip() {
        let cache = create_test_cache();
        let mut record = PostedSaleRecord::new(8, 5.0, 2);
        record.sales_hi = Some(30.0);
        record.sales_mdn = Some(14.25);
        cache.put_record(&record).unwrap();

        assert_eq!(cache.records(8).unwrap(), vec![record]);
    }
}
