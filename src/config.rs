//! Session configuration.

use crate::error::{Error, Result};
use std::time::Duration;

/// Tunables for a tailing session.
///
/// A zero `timeout` fails the initial attach on the first error. A nonzero
/// `timeout` keeps retrying the initial attach, every `retry_interval`, for up
/// to that long. Re-attach cycles after a rotation are never bounded by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Window for the initial attach.
    pub timeout: Duration,
    /// Pause between open/watch attempts.
    pub retry_interval: Duration,
    /// Fallback cadence for re-reading and re-checking the file when no
    /// notification arrives. A truncation is detected when the file is seen
    /// shorter than the read position, so a truncated file that grows past
    /// the old position before any check is read as if it had been appended.
    pub poll_interval: Duration,
    /// Output queue capacity. `None` is unbounded.
    pub capacity: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            retry_interval: Duration::from_millis(50),
            poll_interval: Duration::from_millis(250),
            capacity: None,
        }
    }
}

impl Config {
    /// Sets the initial attach window. Zero fails on the first error.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the pause between open/watch attempts.
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Sets the fallback re-check cadence.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Bounds the output queue to `capacity` lines.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.retry_interval.is_zero() {
            return Err(invalid("retry_interval must be greater than zero"));
        }
        if self.poll_interval.is_zero() {
            return Err(invalid("poll_interval must be greater than zero"));
        }
        if self.capacity == Some(0) {
            return Err(invalid("capacity must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidConfig {
        message: message.to_string(),
    }
}
