//! Store wrapper that can simulate an unreachable database.

use anyhow::{bail, Result};
use filestream_server::file_store::{FileRecord, FileStore, FileSummary, SqliteFileStore};
use std::sync::atomic::{AtomicBool, Ordering};

/// SQLite store whose listing can be switched off.
///
/// Only `list_all` fails, so uploads keep working while observers see
/// errors.
pub struct ToggleStore {
    inner: SqliteFileStore,
    failing: AtomicBool,
}

impl ToggleStore {
    pub fn new(inner: SqliteFileStore) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    #[allow(dead_code)]
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl FileStore for ToggleStore {
    fn insert(&self, filename: &str, content: &[u8]) -> Result<FileRecord> {
        self.inner.insert(filename, content)
    }

    fn list_all(&self) -> Result<Vec<FileSummary>> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("store offline");
        }
        self.inner.list_all()
    }

    fn get(&self, id: i64) -> Result<Option<FileRecord>> {
        self.inner.get(id)
    }

    fn count(&self) -> Result<usize> {
        self.inner.count()
    }
}
