//! Retry state machine with exponential backoff and bounded jitter.
//!
//! # Overview
//!
//! A verification attempt sequence is modelled as a small state machine:
//!
//! ```text
//! Attempting(n) --success--> Succeeded { attempts: n }
//! Attempting(n) --failure, n < max--> BackingOff { attempt: n, delay }
//! Attempting(n) --failure, n = max--> Exhausted { attempts: n }
//! BackingOff { attempt: n, .. } --elapsed--> Attempting(n + 1)
//! ```
//!
//! Transitions are pure functions of the current state, the options and an
//! injected random source, so they can be tested without I/O or real time.
//! [`run_with_retry`] drives the machine over an async operation.
//!
//! # Delay calculation
//!
//! ```text
//! delay(n) = min(base_delay * 2^(n-1), max_delay)
//! jittered = delay(n) + uniform(0, 25%) * delay(n)
//! ```
//!
//! The jittered delay therefore never exceeds twice the un-jittered value.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

/// Default number of attempts per object.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the second attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default cap on a single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Upper bound of the jitter fraction added to each delay.
const MAX_JITTER_FRACTION: f64 = 0.25;

/// Per-run retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOptions {
    /// Total attempts per object, including the first (minimum 1).
    pub max_retries: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Cap on a single un-jittered delay.
    pub max_delay: Duration,
    /// Whether failures judged permanent are retried too.
    pub retry_permanent: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            retry_permanent: true,
        }
    }
}

impl RetryOptions {
    /// Effective attempt budget, never below one.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Un-jittered delay after failed attempt `attempt` (1-indexed).
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay after failed attempt `attempt`, plus up to 25% jitter.
    pub fn jittered_delay<G: Rng + ?Sized>(&self, attempt: u32, rng: &mut G) -> Duration {
        let delay = self.backoff_delay(attempt);
        let fraction = rng.gen_range(0.0..=MAX_JITTER_FRACTION);
        delay + delay.mul_f64(fraction)
    }
}

/// Position in one object's attempt sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Attempt `n` (1-indexed) is about to run or running.
    Attempting(u32),
    /// Attempt `attempt` failed; waiting `delay` before the next one.
    BackingOff {
        /// The attempt that failed.
        attempt: u32,
        /// Wait before the next attempt.
        delay: Duration,
    },
    /// An attempt succeeded.
    Succeeded {
        /// Attempts used, including the successful one.
        attempts: u32,
    },
    /// Every allowed attempt failed, or a permanent failure stopped retrying.
    Exhausted {
        /// Attempts used.
        attempts: u32,
    },
}

impl RetryState {
    /// The state before the first attempt.
    #[must_use]
    pub fn start() -> Self {
        Self::Attempting(1)
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Exhausted { .. })
    }

    /// Attempt number of the current or most recent attempt.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match *self {
            Self::Attempting(attempt) | Self::BackingOff { attempt, .. } => attempt,
            Self::Succeeded { attempts } | Self::Exhausted { attempts } => attempts,
        }
    }

    /// The running attempt succeeded.
    #[must_use]
    pub fn on_success(self) -> Self {
        match self {
            Self::Attempting(attempts) => Self::Succeeded { attempts },
            other => other,
        }
    }

    /// The running attempt failed.
    ///
    /// `permanent` stops retrying early unless the options allow retrying
    /// permanent failures. No backoff follows the final attempt.
    #[must_use]
    pub fn on_failure<G: Rng + ?Sized>(
        self,
        options: &RetryOptions,
        permanent: bool,
        rng: &mut G,
    ) -> Self {
        match self {
            Self::Attempting(attempt) => {
                let give_up = attempt >= options.max_attempts()
                    || (permanent && !options.retry_permanent);
                if give_up {
                    Self::Exhausted { attempts: attempt }
                } else {
                    Self::BackingOff {
                        attempt,
                        delay: options.jittered_delay(attempt, rng),
                    }
                }
            }
            other => other,
        }
    }

    /// The backoff delay elapsed.
    #[must_use]
    pub fn on_backoff_elapsed(self) -> Self {
        match self {
            Self::BackingOff { attempt, .. } => Self::Attempting(attempt + 1),
            other => other,
        }
    }
}

/// Result of driving [`RetryState`] over an operation.
#[derive(Debug)]
pub struct RetryReport<T, E> {
    /// Value of the successful attempt, or the error of the last one.
    pub result: Result<T, E>,
    /// Attempts made.
    pub attempts: u32,
    /// Sum of backoff delays slept.
    pub total_backoff: Duration,
}

/// Runs `operation` until it succeeds or the retry budget is spent.
///
/// `operation` receives the 1-indexed attempt number. `is_permanent` decides
/// whether an error ends the sequence early when
/// [`RetryOptions::retry_permanent`] is `false`.
pub async fn run_with_retry<T, E, F, Fut, P, G>(
    options: &RetryOptions,
    rng: &mut G,
    mut operation: F,
    is_permanent: P,
) -> RetryReport<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    G: Rng + ?Sized,
    E: std::fmt::Display,
{
    let mut state = RetryState::start();
    let mut total_backoff = Duration::ZERO;

    loop {
        let result = operation(state.attempts()).await;
        state = match &result {
            Ok(_) => state.on_success(),
            Err(error) => state.on_failure(options, is_permanent(error), rng),
        };

        if let RetryState::BackingOff { attempt, delay } = state {
            if let Err(error) = &result {
                debug!(
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    %error,
                    "attempt failed, backing off"
                );
            }
            tokio::time::sleep(delay).await;
            total_backoff += delay;
            state = state.on_backoff_elapsed();
        }

        if state.is_terminal() {
            return RetryReport {
                result,
                attempts: state.attempts(),
                total_backoff,
            };
        }
    }
}
