use std::{fmt::Display, future::Future, time::Duration};

use tracing::warn;

/// Bounded retry: at most `max_attempts` tries with a fixed pause between consecutive tries
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Runs `op` until it succeeds or the attempts run out. `op` gets the 1-based attempt number.
    /// Exhaustion is an ordinary outcome and yields `None`.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Option<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        for attempt in 1..=self.max_attempts {
            match op(attempt).await {
                Ok(value) => return Some(value),
                Err(e) => {
                    warn!(attempt, max_attempts = self.max_attempts, "Attempt failed: {}", e);
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }
        None
    }
}
