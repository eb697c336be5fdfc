//! Per-observer polling loop.

use futures::stream::{self, Stream};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::schedule::PollSchedule;
use super::snapshot::{PollOutcome, Snapshot, SnapshotDiffer};
use crate::file_store::FileSummary;
use crate::server::metrics;

/// One item of a session's output.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Sent once, right after the observer connects.
    Opened,
    /// The stored id set moved; carries every current summary.
    Changed(Vec<FileSummary>),
    /// A poll failed. The session keeps going.
    Failed(String),
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Opened => "opened",
            SessionEvent::Changed(_) => "changed",
            SessionEvent::Failed(_) => "failed",
        }
    }

    /// JSON payload carried by the event's frame.
    pub fn payload(&self) -> String {
        let value = match self {
            SessionEvent::Opened => json!({}),
            SessionEvent::Changed(summaries) => json!(summaries),
            SessionEvent::Failed(message) => json!({ "error": message }),
        };
        value.to_string()
    }
}

/// Polling state for one connected observer.
///
/// The session owns its snapshot baseline; nothing else reads or writes it.
/// It produces events lazily and only stops when the shutdown token is
/// cancelled. An observer going away is noticed by whoever drives the
/// session, which simply drops it.
pub struct SubscriptionSession {
    id: String,
    differ: SnapshotDiffer,
    schedule: PollSchedule,
    baseline: Snapshot,
    opened: bool,
    consecutive_failures: u32,
    shutdown: CancellationToken,
}

impl SubscriptionSession {
    pub fn new(differ: SnapshotDiffer, schedule: PollSchedule, shutdown: CancellationToken) -> Self {
        let id = Uuid::new_v4().to_string();
        metrics::record_session_opened();
        info!("Event stream session {} opened", id);
        Self {
            id,
            differ,
            schedule,
            baseline: Snapshot::default(),
            opened: false,
            consecutive_failures: 0,
            shutdown,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn baseline(&self) -> &Snapshot {
        &self.baseline
    }

    /// Produce the next event, waiting through unchanged poll cycles.
    ///
    /// Returns `None` once the shutdown token is cancelled.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if !self.opened {
            self.opened = true;
            return Some(SessionEvent::Opened);
        }

        loop {
            let delay = self.schedule.delay(self.consecutive_failures);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.cancelled() => {
                    debug!("Event stream session {} stopping for shutdown", self.id);
                    return None;
                }
            }

            let result = tokio::select! {
                result = self.differ.poll(&self.baseline) => result,
                _ = self.shutdown.cancelled() => {
                    debug!("Event stream session {} stopping for shutdown", self.id);
                    return None;
                }
            };

            match result {
                Ok(PollOutcome::Unchanged) => {
                    self.consecutive_failures = 0;
                }
                Ok(PollOutcome::Changed {
                    snapshot,
                    summaries,
                }) => {
                    debug!(
                        "Event stream session {}: file set changed ({} -> {} files)",
                        self.id,
                        self.baseline.len(),
                        snapshot.len()
                    );
                    self.baseline = snapshot;
                    self.consecutive_failures = 0;
                    return Some(SessionEvent::Changed(summaries));
                }
                Err(err) => {
                    self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                    warn!(
                        "Event stream session {}: poll failed ({} in a row): {}",
                        self.id, self.consecutive_failures, err
                    );
                    metrics::record_poll_error();
                    return Some(SessionEvent::Failed(err.to_string()));
                }
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = SessionEvent> + Send {
        stream::unfold(self, |mut session| async move {
            let event = session.next_event().await?;
            Some((event, session))
        })
    }
}

impl Drop for SubscriptionSession {
    fn drop(&mut self) {
        metrics::record_session_closed();
        info!("Event stream session {} closed", self.id);
    }
}
