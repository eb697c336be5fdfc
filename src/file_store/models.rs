use chrono::{DateTime, Utc};
use serde::Serialize;

/// A stored file, including its content.
#[derive(Clone, Debug, PartialEq)]
pub struct FileRecord {
    pub id: i64,
    pub filename: String,
    pub content: Vec<u8>,
    pub uploaded_at: DateTime<Utc>,
}

/// The part of a [`FileRecord`] that is sent to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub id: i64,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn summary(&self) -> FileSummary {
        FileSummary {
            id: self.id,
            filename: self.filename.clone(),
            uploaded_at: self.uploaded_at,
        }
    }
}
