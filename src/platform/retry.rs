//! Retry policy for resource-management calls.
//!
//! Providers wrap join/install/instantiate in [`run`]; only
//! [`PlatformError::Transient`] failures are retried.

use std::time::Duration;

use tracing::warn;

use super::PlatformError;

/// Exponential backoff settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first try. `0` disables retrying.
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_factor: f64,
}

impl RetryPolicy {
    /// Default for resource-management operations: 5 retries, 1s initial
    /// backoff growing ×2.5 up to 5s.
    pub fn resmgmt_default() -> Self {
        Self {
            attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
            backoff_factor: 2.5,
        }
    }

    /// Single try, no retries.
    pub fn none() -> Self {
        Self {
            attempts: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_factor: 1.0,
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let scaled = self.initial_backoff.as_secs_f64() * self.backoff_factor.powi(retry as i32);
        let capped = scaled.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::resmgmt_default()
    }
}

/// Run `op`, retrying transient failures per `policy`. Blocks the calling
/// thread between tries.
pub fn run<T, F>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T, PlatformError>
where
    F: FnMut() -> Result<T, PlatformError>,
{
    let mut retry = 0;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && retry < policy.attempts => {
                let delay = policy.backoff(retry);
                warn!(
                    operation,
                    retry = retry + 1,
                    of = policy.attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying"
                );
                std::thread::sleep(delay);
                retry += 1;
            }
            Err(e) if e.is_transient() => {
                return Err(PlatformError::RetriesExhausted {
                    attempts: retry + 1,
                    last: Box::new(e),
                });
            }
            Err(e) => return Err(e),
        }
    }
}
