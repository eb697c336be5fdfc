//! Filestream Server Library
//!
//! File storage with change notifications over server-sent events.
//! This library exposes the internal modules for the binary and for testing.

pub mod config;
pub mod file_store;
pub mod notifier;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use config::{AppConfig, CliConfig, EventsSettings, FileConfig};
pub use file_store::{FileRecord, FileStore, FileSummary, SqliteFileStore};
pub use notifier::{ChangeNotifier, SessionEvent, SubscriptionSession};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
