//! Bounded retry combinator
//!
//! Wraps any fallible async operation. Only retryable errors (transport and
//! dispatch failures) are attempted again; the first failure is logged at
//! warn level and later ones at debug so a flapping device does not flood
//! the log.

use std::future::Future;
use std::time::Duration;

use errors::AcqResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Fixed-delay retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl RetryPolicy {
    /// Register I/O and dispatch
    pub const IO: Self = Self::new(3, 100);
    /// Device connect
    pub const CONNECT: Self = Self::new(10, 100);

    pub const fn new(attempts: u32, delay_ms: u64) -> Self {
        Self { attempts, delay_ms }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::IO
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up. The last error is returned.
pub async fn retry_async<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> AcqResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AcqResult<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{}: succeeded on attempt {}", label, attempt);
                }
                return Ok(value);
            },
            Err(e) if !e.is_retryable() || attempt >= attempts => {
                if attempt > 1 {
                    debug!("{}: giving up after {} attempts", label, attempt);
                }
                return Err(e);
            },
            Err(e) => {
                if attempt == 1 {
                    warn!("{}: {} (retrying up to {} times)", label, e, attempts - 1);
                } else {
                    debug!("{}: attempt {} failed: {}", label, attempt, e);
                }
                attempt += 1;
                tokio::time::sleep(policy.delay()).await;
            },
        }
    }
}
