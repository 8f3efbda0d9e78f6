//! Time source for stores that assign their own timestamps.
//!
//! `PostgreSQL` assigns `now()` inside the upsert transaction; the memory
//! store asks a [`Clock`] instead. Tests use a manual clock to move time
//! forward deterministically.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};

/// Wall clock or manually driven clock.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    /// Reads the system clock.
    #[default]
    System,
    /// Holds a fixed instant (microseconds since the Unix epoch) that only
    /// moves when told to. Clones share the instant.
    Manual(Arc<AtomicI64>),
}

impl Clock {
    /// Create a manual clock starting at `start`.
    pub fn manual(start: DateTime<Utc>) -> Self {
        Self::Manual(Arc::new(AtomicI64::new(start.timestamp_micros())))
    }

    /// Current instant, at microsecond precision.
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System => {
                let now = Utc::now();
                DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
            }
            Self::Manual(micros) => {
                DateTime::from_timestamp_micros(micros.load(Ordering::SeqCst))
                    .unwrap_or_else(Utc::now)
            }
        }
    }

    /// Move a manual clock forward by `by`.
    ///
    /// Returns `false` for the system clock or when the result would
    /// overflow; the clock is left unchanged in both cases.
    pub fn advance(&self, by: TimeDelta) -> bool {
        let Self::Manual(micros) = self else {
            return false;
        };
        let Some(delta) = by.num_microseconds() else {
            return false;
        };
        micros
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_add(delta)
            })
            .is_ok()
    }
}
