//! Bounded polling loop for create-then-poll providers.
//!
//! The loop has an explicit iteration ceiling rather than a wall-clock
//! deadline so its worst-case budget is a simple product the server can
//! check against the platform request timeout at startup: the poll
//! budget must never exceed the request deadline, or the request is
//! killed mid-ledger-operation.

use std::future::Future;
use std::time::Duration;

/// Tunable parameters for the polling strategy.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between consecutive status checks.
    pub interval: Duration,
    /// Maximum number of status checks before giving up.
    pub max_polls: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_polls: 45,
        }
    }
}

impl PollConfig {
    /// Worst-case wall-clock time the loop can occupy.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_polls
    }
}

/// One observation of the remote job.
#[derive(Debug)]
pub enum PollStatus<T> {
    /// No terminal status yet; keep polling.
    Pending,
    /// The job reached a successful terminal status.
    Ready(T),
}

/// Poll `check` until it yields [`PollStatus::Ready`], an error, or the
/// ceiling is reached.
///
/// Returns `Ok(None)` when `max_polls` checks all came back `Pending` --
/// reaching the ceiling is itself a failure the caller maps to its
/// timeout error.
pub async fn run<T, E, F, Fut>(config: &PollConfig, mut check: F) -> Result<Option<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PollStatus<T>, E>>,
{
    for attempt in 1..=config.max_polls {
        match check(attempt).await? {
            PollStatus::Ready(value) => return Ok(Some(value)),
            PollStatus::Pending => {}
        }

        if attempt < config.max_polls {
            tokio::time::sleep(config.interval).await;
        }
    }
    Ok(None)
}
