//! Bounded-retry polling for asynchronous provider jobs.
//!
//! One fixed budget for everyone: wait 10 seconds between checks, give up
//! after 30 of them (about 5 minutes). Nothing escapes this boundary as an
//! error — the caller gets a terminal outcome and decides whether a timeout
//! is fatal for that item.

use std::future::Future;
use std::time::Duration;

use crate::providers::ProviderError;

pub const POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const MAX_ATTEMPTS: u32 = 30;

/// What one status check reported.
#[derive(Debug, Clone)]
pub enum PollCheck<T> {
    Pending,
    Completed(T),
    Failed(String),
}

/// Terminal outcome of a poll loop.
#[derive(Debug, Clone)]
pub enum PollOutcome<T> {
    Completed(T),
    Failed(String),
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    max_attempts: u32,
}

impl Default for Poller {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl Poller {
    /// Custom schedule, for tests and callers with tighter deadlines.
    pub fn with_schedule(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Poll `check` until it reports a terminal status or the attempt budget
    /// is exhausted. A check that errors consumes an attempt and polling
    /// continues; the job may still be running server-side.
    pub async fn wait_for<T, F, Fut>(&self, mut check: F) -> PollOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollCheck<T>, ProviderError>>,
    {
        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.interval).await;
            match check().await {
                Ok(PollCheck::Completed(value)) => return PollOutcome::Completed(value),
                Ok(PollCheck::Failed(reason)) => return PollOutcome::Failed(reason),
                Ok(PollCheck::Pending) => {}
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "status check failed, continuing to poll");
                }
            }
        }
        PollOutcome::TimedOut
    }
}
