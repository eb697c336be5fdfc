//! Change detection over the file store.
//!
//! A [`Snapshot`] is the set of file ids seen by one observer at its last
//! successful poll. [`SnapshotDiffer::poll`] reads the store again and tells
//! whether that set moved.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::file_store::{FileStore, FileSummary};

/// Identifier set of the store contents at a point in time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot(BTreeSet<i64>);

impl Snapshot {
    pub fn from_summaries(summaries: &[FileSummary]) -> Self {
        Self(summaries.iter().map(|s| s.id).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.0.contains(&id)
    }
}

impl FromIterator<i64> for Snapshot {
    fn from_iter<T: IntoIterator<Item = i64>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, PartialEq)]
pub enum PollOutcome {
    Unchanged,
    Changed {
        snapshot: Snapshot,
        summaries: Vec<FileSummary>,
    },
}

/// Errors that can occur while polling the store.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("{0}")]
    StoreRead(String),

    #[error("store read timed out after {0}ms")]
    Timeout(u128),

    #[error("store read task failed: {0}")]
    TaskFailed(String),
}

/// Compare the store contents against the previous snapshot.
///
/// Equality is on the id set, so a deletion paired with an insertion is a
/// change even though the count stays the same.
pub fn diff(previous: &Snapshot, summaries: Vec<FileSummary>) -> PollOutcome {
    let snapshot = Snapshot::from_summaries(&summaries);
    if &snapshot == previous {
        PollOutcome::Unchanged
    } else {
        PollOutcome::Changed {
            snapshot,
            summaries,
        }
    }
}

pub struct SnapshotDiffer {
    store: Arc<dyn FileStore>,
    read_timeout: Duration,
    // Read that outlived its timeout; the next poll waits on it again
    pending: Option<JoinHandle<Result<Vec<FileSummary>>>>,
}

impl SnapshotDiffer {
    pub fn new(store: Arc<dyn FileStore>, read_timeout: Duration) -> Self {
        Self {
            store,
            read_timeout,
            pending: None,
        }
    }

    /// Whether a timed-out store read is still running.
    pub fn has_pending_read(&self) -> bool {
        self.pending.is_some()
    }

    /// Read the current store contents and diff them against `previous`.
    ///
    /// The read runs on the blocking pool. When it outlives the read timeout
    /// the poll fails, but the read is kept and the next poll resumes waiting
    /// on it instead of starting another one, so at most one read per differ
    /// is ever in flight. `previous` is never modified; adopting the new
    /// snapshot is up to the caller.
    pub async fn poll(&mut self, previous: &Snapshot) -> Result<PollOutcome, PollError> {
        let mut read = match self.pending.take() {
            Some(read) => read,
            None => {
                let store = self.store.clone();
                tokio::task::spawn_blocking(move || store.list_all())
            }
        };

        let summaries = match tokio::time::timeout(self.read_timeout, &mut read).await {
            Err(_) => {
                self.pending = Some(read);
                return Err(PollError::Timeout(self.read_timeout.as_millis()));
            }
            Ok(Err(join_err)) => return Err(PollError::TaskFailed(join_err.to_string())),
            Ok(Ok(Err(store_err))) => return Err(PollError::StoreRead(format!("{:#}", store_err))),
            Ok(Ok(Ok(summaries))) => summaries,
        };

        Ok(diff(previous, summaries))
    }
}
