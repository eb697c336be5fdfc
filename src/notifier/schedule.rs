//! Timing between poll cycles.

use std::time::Duration;

use crate::config::EventsSettings;

/// Delay policy for a session's poll loop.
///
/// Healthy sessions wait `poll_interval` between cycles. After consecutive
/// failed polls the wait grows by `backoff_multiplier` per failure, capped at
/// `max_error_backoff` (never below `poll_interval`).
#[derive(Debug, Clone)]
pub struct PollSchedule {
    pub poll_interval: Duration,
    pub max_error_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl PollSchedule {
    pub fn new(settings: &EventsSettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            max_error_backoff: Duration::from_millis(settings.max_error_backoff_ms),
            backoff_multiplier: settings.error_backoff_multiplier,
        }
    }

    pub fn delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures <= 1 {
            return self.poll_interval;
        }
        let cap = self.max_error_backoff.max(self.poll_interval);
        let exponent = (consecutive_failures - 1).min(i32::MAX as u32) as i32;
        let backoff = self.poll_interval.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if !backoff.is_finite() || backoff >= cap.as_secs_f64() {
            cap
        } else {
            Duration::from_secs_f64(backoff).max(self.poll_interval)
        }
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::new(&EventsSettings::default())
    }
}
