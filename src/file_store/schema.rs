//! SQLite schema definitions for the file database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - Stored files
// =============================================================================

/// Files table - one row per uploaded file, never updated after insertion
const FILES_TABLE_V1: Table = Table {
    name: "files",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("filename", &SqlType::Text, non_null = true),
        sqlite_column!("content", &SqlType::Blob, non_null = true),
        sqlite_column!("uploaded_at", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_files_uploaded_at", "uploaded_at")],
};

pub const FILES_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[FILES_TABLE_V1],
    migration: None,
}];

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_latest_schema_creates_and_validates() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = FILES_VERSIONED_SCHEMAS.last().unwrap();
        schema.create(&conn).unwrap();
        schema.validate(&conn).unwrap();
    }

    #[test]
    fn test_files_table_accepts_blob_content() {
        let conn = Connection::open_in_memory().unwrap();
        FILES_VERSIONED_SCHEMAS[0].create(&conn).unwrap();

        conn.execute(
            "INSERT INTO files (filename, content, uploaded_at) VALUES ('a.bin', ?1, '2024-01-15T10:30:00Z')",
            [vec![0u8, 159, 146, 150]],
        )
        .unwrap();

        let (id, content): (i64, Vec<u8>) = conn
            .query_row("SELECT id, content FROM files", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(id, 1);
        assert_eq!(content, vec![0u8, 159, 146, 150]);
    }
}
