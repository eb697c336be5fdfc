//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own database directory.

use super::constants::*;
use super::store::ToggleStore;
use filestream_server::config::EventsSettings;
use filestream_server::file_store::SqliteFileStore;
use filestream_server::notifier::ChangeNotifier;
use filestream_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Test server instance with an isolated database
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    #[allow(dead_code)]
    pub port: u16,

    /// Direct access to the store backing the server
    #[allow(dead_code)]
    pub store: Arc<ToggleStore>,

    shutdown: CancellationToken,

    _temp_db_dir: TempDir,
}

impl TestServer {
    /// Spawns a server with default limits and a fast poll interval
    pub async fn spawn() -> Self {
        Self::spawn_with_config(ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            ..Default::default()
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn spawn_with_upload_limit(max_upload_size_bytes: usize) -> Self {
        Self::spawn_with_config(ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            max_upload_size_bytes,
            ..Default::default()
        })
        .await
    }

    async fn spawn_with_config(config: ServerConfig) -> Self {
        let temp_db_dir = TempDir::new().expect("Failed to create temp db dir");
        let sqlite_store = SqliteFileStore::new(temp_db_dir.path().join("files.db"), 2)
            .expect("Failed to create file store");
        let store = Arc::new(ToggleStore::new(sqlite_store));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let shutdown = CancellationToken::new();
        let events = EventsSettings {
            poll_interval_ms: TEST_POLL_INTERVAL_MS,
            max_error_backoff_ms: TEST_POLL_INTERVAL_MS,
            ..EventsSettings::default()
        };
        let notifier = ChangeNotifier::new(store.clone(), events, shutdown.clone());
        let app = make_app(config, store.clone(), notifier);

        // Spawn server in background task with graceful shutdown
        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            store,
            shutdown,
            _temp_db_dir: temp_db_dir,
        };

        server.wait_for_ready().await;

        server
    }

    /// Cancels the shutdown token, ending open event streams
    #[allow(dead_code)]
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Waits for the server to become ready by polling the / endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
