//! Record CRUD operations.
//!
//! Provides functions for writing, reading, and counting cached response
//! records within a generation.

use super::connection::VersionedStore;
use crate::Error;
use crate::key::request_key;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached origin response.
///
/// Owned exclusively by the store. A put with an existing
/// (generation, request_key) replaces the prior row wholesale; records are
/// never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRecord {
    pub generation: String,
    pub request_key: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl StoreRecord {
    /// Build a record for a response, deriving the request key and stamping
    /// the write time.
    pub fn new(
        generation: impl Into<String>, method: &str, url: &str, status: u16, content_type: Option<String>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            generation: generation.into(),
            request_key: request_key(method, url),
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            status,
            content_type,
            body,
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl VersionedStore {
    /// Insert or replace a cached record.
    ///
    /// Uses UPSERT semantics: inserts if (generation, request_key) doesn't
    /// exist, replaces every field if it does. Quota exhaustion surfaces as
    /// `Error::StorageFull` so opportunistic callers can continue uncached.
    pub async fn put_record(&self, record: &StoreRecord) -> Result<(), Error> {
        let record = record.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO records (
                    generation, request_key, method, url, status, content_type, body, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(generation, request_key) DO UPDATE SET
                    method = excluded.method,
                    url = excluded.url,
                    status = excluded.status,
                    content_type = excluded.content_type,
                    body = excluded.body,
                    stored_at = excluded.stored_at",
                    params![
                        &record.generation,
                        &record.request_key,
                        &record.method,
                        &record.url,
                        record.status as i64,
                        &record.content_type,
                        &record.body,
                        &record.stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a record by generation and request key.
    ///
    /// Returns None if nothing is stored under that key in that generation.
    pub async fn get_record(&self, generation: &str, request_key: &str) -> Result<Option<StoreRecord>, Error> {
        let generation = generation.to_string();
        let request_key = request_key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoreRecord>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT generation, request_key, method, url, status, content_type, body, stored_at
                FROM records WHERE generation = ?1 AND request_key = ?2",
                )?;

                let result = stmt.query_row(params![generation, request_key], |row| {
                    Ok(StoreRecord {
                        generation: row.get(0)?,
                        request_key: row.get(1)?,
                        method: row.get(2)?,
                        url: row.get(3)?,
                        status: row.get::<_, i64>(4)? as u16,
                        content_type: row.get(5)?,
                        body: row.get(6)?,
                        stored_at: row.get(7)?,
                    })
                });

                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Count records stored under a generation.
    pub async fn count_records(&self, generation: &str) -> Result<u64, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM records WHERE generation = ?1", params![generation], |row| {
                        row.get(0)
                    })
                    .map_err(Error::from)?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_record(generation: &str, url: &str, body: &[u8]) -> StoreRecord {
        StoreRecord::new(generation, "GET", url, 200, Some("text/html".to_string()), body.to_vec())
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = VersionedStore::open_in_memory().await.unwrap();
        let record = make_test_record("v1", "https://example.com/", b"<html>");

        store.put_record(&record).await.unwrap();

        let retrieved = store.get_record("v1", &record.request_key).await.unwrap().unwrap();
        assert_eq!(retrieved.url, record.url);
        assert_eq!(retrieved.body, record.body);
        assert_eq!(retrieved.status, 200);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = VersionedStore::open_in_memory().await.unwrap();
        let result = store.get_record("v1", "nonexistent").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_get_wrong_generation() {
        let store = VersionedStore::open_in_memory().await.unwrap();
        let record = make_test_record("v1", "https://example.com/", b"<html>");
        store.put_record(&record).await.unwrap();

        let result = store.get_record("v2", &record.request_key).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_put_identical_is_idempotent() {
        let store = VersionedStore::open_in_memory().await.unwrap();
        let record = make_test_record("v1", "https://example.com/", b"<html>");

        store.put_record(&record).await.unwrap();
        store.put_record(&record).await.unwrap();

        assert_eq!(store.count_records("v1").await.unwrap(), 1);
        let retrieved = store.get_record("v1", &record.request_key).await.unwrap().unwrap();
        assert_eq!(retrieved.body, record.body);
    }

    #[tokio::test]
    async fn test_put_replaces_wholesale() {
        let store = VersionedStore::open_in_memory().await.unwrap();
        let first = make_test_record("v1", "https://example.com/", b"old");
        store.put_record(&first).await.unwrap();

        // Same key, different payload and no content type: nothing of the
        // old row may survive the replacement.
        let second =
            StoreRecord::new("v1", "GET", "https://example.com/", 204, None, b"new".to_vec());
        assert_eq!(first.request_key, second.request_key);
        store.put_record(&second).await.unwrap();

        let retrieved = store.get_record("v1", &first.request_key).await.unwrap().unwrap();
        assert_eq!(retrieved.body, b"new");
        assert_eq!(retrieved.status, 204);
        assert!(retrieved.content_type.is_none());
        assert_eq!(store.count_records("v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_count_records() {
        let store = VersionedStore::open_in_memory().await.unwrap();
        assert_eq!(store.count_records("v1").await.unwrap(), 0);

        store.put_record(&make_test_record("v1", "https://example.com/", b"a")).await.unwrap();
        store.put_record(&make_test_record("v1", "https://example.com/style.css", b"b")).await.unwrap();
        store.put_record(&make_test_record("v2", "https://example.com/", b"c")).await.unwrap();

        assert_eq!(store.count_records("v1").await.unwrap(), 2);
        assert_eq!(store.count_records("v2").await.unwrap(), 1);
    }
}
