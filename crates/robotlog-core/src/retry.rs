//! Bounded retry policy for unique-constraint races on the write path.
//!
//! Two writers creating the same robot (or the same attribute) race on a
//! unique constraint. The loser's transaction rolls back and the whole
//! upsert is replayed; on replay the row exists and the update path is
//! taken. Replays are bounded and spaced by jittered exponential backoff.

use std::time::Duration;

use rand::Rng;

use crate::config::UpsertConfig;

/// Largest exponent applied to the base backoff.
const MAX_BACKOFF_SHIFT: u32 = 6;

/// How often, and how patiently, a conflicting upsert is replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_backoff: Duration,
}

impl RetryPolicy {
    /// Create a policy allowing `max_retries` replays after the first attempt.
    pub const fn new(max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
        }
    }

    /// Build the policy from the `upsert` configuration section.
    pub const fn from_config(config: &UpsertConfig) -> Self {
        Self::new(
            config.max_conflict_retries,
            Duration::from_millis(config.retry_backoff_ms),
        )
    }

    /// Total attempts, the first one included.
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub const fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts()
    }

    /// Delay before replaying after attempt number `attempt` (1-based).
    ///
    /// `base * 2^(attempt - 1)`, capped, plus up to `base` of random jitter
    /// so racing writers do not collide again in lockstep.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        let factor = 1_u32.checked_shl(shift).unwrap_or(1);
        let exponential = self.base_backoff.saturating_mul(factor);

        let base_ms = u64::try_from(self.base_backoff.as_millis()).unwrap_or(u64::MAX);
        let jitter_ms = if base_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=base_ms)
        };

        exponential.saturating_add(Duration::from_millis(jitter_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&UpsertConfig::default())
    }
}
