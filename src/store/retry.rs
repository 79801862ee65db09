use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::cancel::CancelFlag;
use crate::error::TransportError;
use crate::logging::status;

/// Fixed-delay retry budget for transport calls
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Call `op` until it succeeds, fails with a non-retryable error, or the
    /// budget is spent. On failure returns the number of attempts made and the
    /// last error.
    pub fn run<T, F>(
        &self,
        operation: &str,
        key: &str,
        cancel: &CancelFlag,
        mut op: F,
    ) -> Result<T, (usize, TransportError)>
    where
        F: FnMut(usize) -> Result<T, TransportError>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() || attempt >= max_attempts => {
                    return Err((attempt, err));
                }
                Err(err) => {
                    warn!(
                        operation = operation,
                        status = status::RETRY,
                        key = %key,
                        attempt,
                        "{}; retrying in {:?}",
                        err,
                        self.delay
                    );
                    if !sleep_unless_cancelled(self.delay, cancel) {
                        return Err((attempt, TransportError::Cancelled));
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Sleep in short slices; false if the flag was set meanwhile
pub(crate) fn sleep_unless_cancelled(duration: Duration, cancel: &CancelFlag) -> bool {
    let slice = Duration::from_millis(100);
    let started = Instant::now();
    while started.elapsed() < duration {
        if cancel.is_cancelled() {
            return false;
        }
        thread::sleep(slice.min(duration.saturating_sub(started.elapsed())));
    }
    !cancel.is_cancelled()
}
