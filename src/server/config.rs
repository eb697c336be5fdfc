use super::RequestsLoggingLevel;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub metrics_port: u16,
    /// max-age sent with file downloads; stored files never change.
    pub content_cache_age_sec: usize,
    pub max_upload_size_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 5000,
            metrics_port: 9091,
            content_cache_age_sec: 3600,
            max_upload_size_bytes: 100 * 1024 * 1024,
        }
    }
}
