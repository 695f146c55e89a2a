//! Bounded retry policy and the sleeper it pauses with.

use async_trait::async_trait;
use std::time::Duration;

/// Pause schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// Doubles after every failure, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_PAUSE: Duration = Duration::from_secs(1);

    /// `max_attempts` counts the first try; values below 1 are raised to 1.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn fixed(max_attempts: u32, pause: Duration) -> Self {
        Self::new(max_attempts, Backoff::Fixed(pause))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Pause to take after the `attempt`-th failure (1-based).
    pub fn pause_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(pause) => pause,
            Backoff::Exponential { initial, max } => {
                let exponent = attempt.saturating_sub(1).min(16);
                initial.saturating_mul(1u32 << exponent).min(max)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_PAUSE)
    }
}

/// Something that can wait. Production code sleeps on the tokio timer;
/// tests record the requested pauses instead.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}
