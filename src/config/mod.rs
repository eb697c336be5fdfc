mod file_config;

pub use file_config::{EventsConfig, FileConfig, StoreConfig};

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub content_cache_age_sec: usize,
    pub max_upload_size_mb: u64,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub content_cache_age_sec: usize,
    pub max_upload_size_mb: u64,

    // Feature configs (with defaults)
    pub events: EventsSettings,
    pub store: StoreSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let content_cache_age_sec = file
            .content_cache_age_sec
            .unwrap_or(cli.content_cache_age_sec);
        let max_upload_size_mb = file.max_upload_size_mb.unwrap_or(cli.max_upload_size_mb);

        let events_file = file.events.unwrap_or_default();
        let defaults = EventsSettings::default();
        let poll_interval_ms = events_file
            .poll_interval_ms
            .or(cli.poll_interval_ms)
            .unwrap_or(defaults.poll_interval_ms);
        if poll_interval_ms == 0 {
            bail!("events.poll_interval_ms must be greater than zero");
        }
        let events = EventsSettings {
            poll_interval_ms,
            store_read_timeout_ms: events_file
                .store_read_timeout_ms
                .unwrap_or(defaults.store_read_timeout_ms),
            // Without an explicit cap, failed polls retry at the normal interval
            max_error_backoff_ms: events_file
                .max_error_backoff_ms
                .unwrap_or(poll_interval_ms),
            error_backoff_multiplier: events_file
                .error_backoff_multiplier
                .unwrap_or(defaults.error_backoff_multiplier),
        };
        if events.store_read_timeout_ms == 0 {
            bail!("events.store_read_timeout_ms must be greater than zero");
        }
        if events.error_backoff_multiplier < 1.0 {
            bail!(
                "events.error_backoff_multiplier must be at least 1.0, got {}",
                events.error_backoff_multiplier
            );
        }

        let store_file = file.store.unwrap_or_default();
        let store = StoreSettings {
            read_pool_size: store_file
                .read_pool_size
                .unwrap_or(StoreSettings::default().read_pool_size),
        };

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            content_cache_age_sec,
            max_upload_size_mb,
            events,
            store,
        })
    }

    pub fn files_db_path(&self) -> PathBuf {
        self.db_dir.join("files.db")
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        (self.max_upload_size_mb as usize).saturating_mul(1024 * 1024)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventsSettings {
    pub poll_interval_ms: u64,
    pub store_read_timeout_ms: u64,
    pub max_error_backoff_ms: u64,
    pub error_backoff_multiplier: f64,
}

impl Default for EventsSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            store_read_timeout_ms: 5000,
            max_error_backoff_ms: 1000,
            error_backoff_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub read_pool_size: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { read_pool_size: 4 }
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
