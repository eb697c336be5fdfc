mod models;
mod schema;
mod sqlite_file_store;

pub use models::*;
pub use schema::FILES_VERSIONED_SCHEMAS;
pub use sqlite_file_store::SqliteFileStore;

use anyhow::Result;

/// Durable collection of uploaded files.
///
/// Implementations must be safe to read from many sessions at once and must
/// return a coherent view on every `list_all` call (no partially written rows).
pub trait FileStore: Send + Sync {
    /// Store a new file, returning the created record.
    fn insert(&self, filename: &str, content: &[u8]) -> Result<FileRecord>;

    /// All stored files without their content, in ascending id order.
    fn list_all(&self) -> Result<Vec<FileSummary>>;

    fn get(&self, id: i64) -> Result<Option<FileRecord>>;

    fn count(&self) -> Result<usize>;
}
