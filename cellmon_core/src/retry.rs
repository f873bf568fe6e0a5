//! Bounded retry with an explicit backoff policy.
//!
//! Knows nothing about buses: callers supply the operation and decide which
//! errors are worth retrying and what to do once attempts run out.

use cellmon_traits::Clock;
use std::time::Duration;

/// Pause inserted after a failed attempt, before the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Same pause after every failure.
    Fixed(Duration),
    /// `step * n` after the n-th failure, capped at `max`.
    Linear { step: Duration, max: Duration },
    /// `base * 2^(n-1)` after the n-th failure, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Pause after the `failures`-th consecutive failure (1-based).
    pub fn delay(&self, failures: u32) -> Duration {
        let n = failures.max(1);
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(d) => d,
            Backoff::Linear { step, max } => step.saturating_mul(n).min(max),
            Backoff::Exponential { base, max } => {
                let factor = 1u32.checked_shl(n - 1).unwrap_or(u32::MAX);
                base.saturating_mul(factor).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts in total, first try included. Zero is treated as one.
    pub max_attempts: u8,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Fixed(Duration::from_millis(2)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed; `last` is the final error.
    Exhausted { attempts: u8, last: E },
    /// The operation failed with an error the caller does not retry.
    Aborted { attempt: u8, error: E },
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Aborted { error, .. } => error,
        }
    }
}

impl RetryPolicy {
    #[inline]
    pub fn attempts(&self) -> u8 {
        self.max_attempts.max(1)
    }

    /// Run `op` until it succeeds or the attempts are spent, retrying every error.
    pub fn run<T, E, C: Clock>(
        &self,
        clock: &C,
        op: impl FnMut(u8) -> Result<T, E>,
    ) -> Result<T, RetryError<E>> {
        self.run_if(clock, |_| true, op)
    }

    /// Like `run`, but errors for which `retryable` is false end the loop at once.
    ///
    /// `op` receives the 1-based attempt number. The clock sleeps only between
    /// attempts, never after the last one.
    pub fn run_if<T, E, C: Clock>(
        &self,
        clock: &C,
        retryable: impl Fn(&E) -> bool,
        mut op: impl FnMut(u8) -> Result<T, E>,
    ) -> Result<T, RetryError<E>> {
        let attempts = self.attempts();
        let mut attempt = 1u8;
        loop {
            match op(attempt) {
                Ok(v) => return Ok(v),
                Err(e) if !retryable(&e) => return Err(RetryError::Aborted { attempt, error: e }),
                Err(e) if attempt >= attempts => {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(_) => {
                    clock.sleep(self.backoff.delay(u32::from(attempt)));
                    attempt += 1;
                }
            }
        }
    }
}
