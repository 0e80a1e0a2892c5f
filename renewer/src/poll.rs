//! Bounded, fixed-interval polling shared by the in-place renewal's pod and node checks.
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_retry::{strategy::FixedInterval, RetryIf};
use tracing::{event, Level};

pub const POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const POLL_MAX_ATTEMPTS: usize = 30;

/// The result of a single poll attempt.
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// The awaited condition holds.
    Ready(T),
    /// The condition does not hold yet.
    NotReady,
    /// The check itself failed. Logged, and counted against the budget like `NotReady`.
    Transient(E),
    /// The condition can no longer be reached. Polling stops immediately.
    Abort,
}

/// Why a poll ended without reaching its condition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PollError {
    Exhausted { attempts: usize },
    Aborted { attempts: usize },
}

#[derive(Debug)]
enum Miss {
    NotReady,
    Abort,
}

/// How many times to check a condition, and how long to wait between checks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollPolicy {
    /// Total checks, including the first. The condition is always checked at least once, so zero
    /// behaves like one.
    pub max_attempts: usize,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            max_attempts: POLL_MAX_ATTEMPTS,
            interval: POLL_INTERVAL,
        }
    }
}

impl PollPolicy {
    pub fn new(max_attempts: usize, interval: Duration) -> Self {
        PollPolicy {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    /// Delays between consecutive attempts. The first attempt runs immediately.
    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        FixedInterval::new(self.interval).take(self.max_attempts.saturating_sub(1))
    }

    /// Runs `attempt` until it reports `Ready`, it reports `Abort`, or `max_attempts` checks have
    /// been made.
    pub async fn poll<T, E, F, Fut>(&self, what: &str, mut attempt: F) -> Result<T, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
        E: Display,
    {
        let mut attempts = 0;
        let result = RetryIf::spawn(
            self.retry_strategy(),
            || {
                attempts += 1;
                let current = attempts;
                let check = attempt();
                async move {
                    match check.await {
                        Attempt::Ready(value) => Ok(value),
                        Attempt::NotReady => {
                            event!(Level::DEBUG, what, attempt = current, "Condition not met yet.");
                            Err(Miss::NotReady)
                        }
                        Attempt::Transient(err) => {
                            event!(
                                Level::WARN,
                                what,
                                attempt = current,
                                error = %err,
                                "Check failed, will retry."
                            );
                            Err(Miss::NotReady)
                        }
                        Attempt::Abort => Err(Miss::Abort),
                    }
                }
            },
            |miss: &Miss| matches!(miss, Miss::NotReady),
        )
        .await;

        result.map_err(|miss| match miss {
            Miss::NotReady => PollError::Exhausted { attempts },
            Miss::Abort => PollError::Aborted { attempts },
        })
    }
}
