//! Shared constants for end-to-end tests

/// How often event stream sessions poll the store in tests
pub const TEST_POLL_INTERVAL_MS: u64 = 50;

/// Maximum time to wait for the server to accept requests
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Upper bound for any single expected event stream frame
pub const FRAME_TIMEOUT_MS: u64 = 3000;

/// How long a stream must stay silent to count as "no event"
#[allow(dead_code)]
pub const QUIET_PERIOD_MS: u64 = 400;

/// The first frame of every event stream
#[allow(dead_code)]
pub const OPENED_FRAME: &str = "data: {}\n\n";
