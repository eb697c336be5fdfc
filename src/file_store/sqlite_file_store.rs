//! SQLite-backed file store.
//!
//! Uploads go through a single write connection, while listing and reading
//! are spread over a pool of read-only connections. The database runs in WAL
//! mode so readers always see the last committed state and never block on a
//! concurrent insert.

use super::models::{FileRecord, FileSummary};
use super::schema::FILES_VERSIONED_SCHEMAS;
use super::FileStore;
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub struct SqliteFileStore {
    write_conn: Arc<Mutex<Connection>>,
    read_pool: Vec<Arc<Mutex<Connection>>>,
    read_index: Arc<AtomicUsize>,
}

impl SqliteFileStore {
    /// Open (or create) the file database at `db_path`.
    ///
    /// `read_pool_size` is the number of read-only connections used by
    /// `list_all`, `get` and `count`; it is clamped to at least one.
    pub fn new<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let mut write_conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open file database")?;

        if is_new_db {
            info!("Creating new file database at {:?}", path);
            FILES_VERSIONED_SCHEMAS
                .last()
                .context("No file database schema defined")?
                .create(&write_conn)?;
        } else {
            Self::check_version_and_migrate(&mut write_conn)?;
        }

        write_conn.pragma_update(None, "journal_mode", "WAL")?;

        let files_count: i64 = write_conn
            .query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))
            .unwrap_or(0);
        info!("Opened file database with {} files", files_count);

        let pool_size = read_pool_size.max(1);
        let mut read_pool = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let read_conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .context("Failed to open read connection to file database")?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        Ok(Self {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
            read_index: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn check_version_and_migrate(conn: &mut Connection) -> Result<()> {
        let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        let db_version = raw_version - BASE_DB_VERSION as i64;

        if db_version < 1 {
            anyhow::bail!(
                "File database version {} is invalid (expected >= 1)",
                db_version
            );
        }

        let version_index = FILES_VERSIONED_SCHEMAS
            .iter()
            .position(|s| s.version == db_version as usize)
            .with_context(|| format!("Unknown file database version {}", db_version))?;
        FILES_VERSIONED_SCHEMAS[version_index]
            .validate(conn)
            .with_context(|| {
                format!(
                    "File database schema validation failed for version {}",
                    db_version
                )
            })?;

        let tx = conn.transaction()?;
        let mut latest_from = db_version as usize;
        for schema in FILES_VERSIONED_SCHEMAS.iter().skip(version_index + 1) {
            info!(
                "Running file database migration from version {} to {}",
                latest_from, schema.version
            );
            if let Some(migration_fn) = schema.migration {
                migration_fn(&tx).with_context(|| {
                    format!("Failed to run migration to version {}", schema.version)
                })?;
            }
            latest_from = schema.version;
        }
        tx.pragma_update(None, "user_version", BASE_DB_VERSION + latest_from)?;
        tx.commit()?;
        Ok(())
    }

    fn get_read_conn(&self) -> Arc<Mutex<Connection>> {
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    fn parse_timestamp(value: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
    }

    fn row_to_summary(row: &rusqlite::Row) -> rusqlite::Result<FileSummary> {
        let uploaded_at: String = row.get("uploaded_at")?;
        Ok(FileSummary {
            id: row.get("id")?,
            filename: row.get("filename")?,
            uploaded_at: Self::parse_timestamp(&uploaded_at)?,
        })
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<FileRecord> {
        let uploaded_at: String = row.get("uploaded_at")?;
        Ok(FileRecord {
            id: row.get("id")?,
            filename: row.get("filename")?,
            content: row.get("content")?,
            uploaded_at: Self::parse_timestamp(&uploaded_at)?,
        })
    }
}

impl FileStore for SqliteFileStore {
    fn insert(&self, filename: &str, content: &[u8]) -> Result<FileRecord> {
        let uploaded_at = Utc::now();
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO files (filename, content, uploaded_at) VALUES (?1, ?2, ?3)",
            params![filename, content, uploaded_at.to_rfc3339()],
        )
        .with_context(|| format!("Failed to insert file {}", filename))?;

        Ok(FileRecord {
            id: conn.last_insert_rowid(),
            filename: filename.to_string(),
            content: content.to_vec(),
            uploaded_at,
        })
    }

    fn list_all(&self) -> Result<Vec<FileSummary>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let mut stmt =
            conn.prepare_cached("SELECT id, filename, uploaded_at FROM files ORDER BY id")?;
        let summaries = stmt
            .query_map([], Self::row_to_summary)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    fn get(&self, id: i64) -> Result<Option<FileRecord>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let record = conn
            .query_row(
                "SELECT id, filename, content, uploaded_at FROM files WHERE id = ?1",
                params![id],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn make_store() -> (TempDir, SqliteFileStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteFileStore::new(temp_dir.path().join("files.db"), 2).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_new_store_is_empty() {
        let (_dir, store) = make_store();
        assert!(store.list_all().unwrap().is_empty());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let (_dir, store) = make_store();

        let first = store.insert("a.txt", b"hello").unwrap();
        let second = store.insert("b.txt", b"world").unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.filename, "a.txt");
        assert_eq!(first.content, b"hello".to_vec());
    }

    #[test]
    fn test_list_all_returns_summaries_in_id_order() {
        let (_dir, store) = make_store();
        let a = store.insert("a.txt", b"a").unwrap();
        let b = store.insert("b.txt", b"b").unwrap();
        let c = store.insert("c.txt", b"c").unwrap();

        let summaries = store.list_all().unwrap();
        assert_eq!(summaries, vec![a.summary(), b.summary(), c.summary()]);
    }

    #[test]
    fn test_get_round_trips_content_and_timestamp() {
        let (_dir, store) = make_store();
        let inserted = store.insert("image.png", &[0x89, 0x50, 0x4e, 0x47]).unwrap();

        let fetched = store.get(inserted.id).unwrap().unwrap();
        assert_eq!(fetched, inserted);
        assert!(store.get(inserted.id + 100).unwrap().is_none());
    }

    #[test]
    fn test_reads_are_spread_across_pool_and_see_latest_insert() {
        let (_dir, store) = make_store();
        for i in 0..5 {
            store.insert(&format!("{}.txt", i), b"x").unwrap();
            // Every pooled connection must see the committed insert
            for _ in 0..3 {
                assert_eq!(store.list_all().unwrap().len(), i + 1);
            }
        }
        assert_eq!(store.count().unwrap(), 5);
    }

    #[test]
    fn test_reopen_existing_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("files.db");

        {
            let store = SqliteFileStore::new(&db_path, 1).unwrap();
            store.insert("kept.txt", b"still here").unwrap();
        }

        let store = SqliteFileStore::new(&db_path, 1).unwrap();
        let ids: BTreeSet<i64> = store.list_all().unwrap().iter().map(|f| f.id).collect();
        assert_eq!(ids, BTreeSet::from([1]));
        assert_eq!(store.get(1).unwrap().unwrap().content, b"still here".to_vec());
    }

    #[test]
    fn test_reopen_rejects_foreign_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("files.db");
        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute("CREATE TABLE something_else (id INTEGER)", [])
                .unwrap();
        }

        let result = SqliteFileStore::new(&db_path, 1);
        assert!(result.is_err());
        assert!(result.err().unwrap().to_string().contains("invalid"));
    }

    #[test]
    fn test_concurrent_reads_while_inserting() {
        let (_dir, store) = make_store();
        let store = Arc::new(store);

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..20 {
                    store.insert(&format!("{}.bin", i), &[i as u8; 64]).unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        let summaries = store.list_all().unwrap();
                        // A coherent read is always a gap-free prefix of the ids
                        let ids: Vec<i64> = summaries.iter().map(|s| s.id).collect();
                        let expected: Vec<i64> = (1..=ids.len() as i64).collect();
                        assert_eq!(ids, expected);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.count().unwrap(), 20);
    }
}
