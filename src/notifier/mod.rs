//! Change notifications for the file store.
//!
//! Every observer gets its own [`SubscriptionSession`], which polls the store
//! on a fixed schedule and reports when the set of stored file ids moves.
//! Sessions share nothing but read access to the store.

mod schedule;
mod session;
mod snapshot;

pub use schedule::PollSchedule;
pub use session::{SessionEvent, SubscriptionSession};
pub use snapshot::{diff, PollError, PollOutcome, Snapshot, SnapshotDiffer};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::EventsSettings;
use crate::file_store::FileStore;

/// Factory for subscription sessions.
#[derive(Clone)]
pub struct ChangeNotifier {
    store: Arc<dyn FileStore>,
    settings: EventsSettings,
    shutdown: CancellationToken,
}

impl ChangeNotifier {
    pub fn new(
        store: Arc<dyn FileStore>,
        settings: EventsSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            settings,
            shutdown,
        }
    }

    /// Start a session with an empty baseline.
    pub fn open_session(&self) -> SubscriptionSession {
        let differ = SnapshotDiffer::new(
            self.store.clone(),
            Duration::from_millis(self.settings.store_read_timeout_ms),
        );
        SubscriptionSession::new(
            differ,
            PollSchedule::new(&self.settings),
            self.shutdown.child_token(),
        )
    }
}
