use axum::extract::FromRef;

use crate::file_store::FileStore;
use crate::notifier::ChangeNotifier;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedFileStore = Arc<dyn FileStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub file_store: GuardedFileStore,
    pub notifier: ChangeNotifier,
    pub hash: String,
}

impl FromRef<ServerState> for GuardedFileStore {
    fn from_ref(input: &ServerState) -> Self {
        input.file_store.clone()
    }
}

impl FromRef<ServerState> for ChangeNotifier {
    fn from_ref(input: &ServerState) -> Self {
        input.notifier.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
