//! The registry service: the operations exposed to the transport layer.
//!
//! | Operation | Result | Failure |
//! |-----------|--------|---------|
//! | [`Registry::upsert`] | full snapshot | invalid name, conflict retries exhausted, store faults |
//! | [`Registry::snapshot`] | key/value mapping | [`RegistryError::NotFound`] |
//! | [`Registry::history`] | timestamp/event mapping | [`RegistryError::NotFound`] |
//! | [`Registry::list`] | name and last update per robot | store faults |
//!
//! Upserts that lose a unique-constraint race are replayed under the
//! configured [`RetryPolicy`]. The replay sees the winner's row and takes
//! the update path, so racing first writes to one name both succeed.

use robotlog_core::{NameError, RetryPolicy, assemble_history, snapshot_from, validate_robot_name};
use robotlog_types::{AttributeChanges, History, Robot, RobotSummary, Snapshot};

use crate::attribute_store::UpsertOutcome;
use crate::error::DbError;
use crate::store::RobotStore;

/// Errors surfaced to registry callers.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No robot with this name has ever been written.
    #[error("robot not found: {0}")]
    NotFound(String),

    /// The robot name cannot be used.
    #[error("invalid robot name: {0}")]
    InvalidName(#[from] NameError),

    /// Concurrent writers kept winning the unique-constraint race.
    #[error("upsert of robot {name:?} still conflicted after {attempts} attempts")]
    ConflictRetryExhausted {
        /// The robot name.
        name: String,
        /// Attempts made, the first one included.
        attempts: u32,
    },

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] DbError),

    /// Any other store failure.
    #[error("store error: {0}")]
    Store(#[source] DbError),
}

impl From<DbError> for RegistryError {
    fn from(err: DbError) -> Self {
        if err.is_unavailable() {
            Self::StoreUnavailable(err)
        } else {
            Self::Store(err)
        }
    }
}

/// Robot attribute registry over a [`RobotStore`].
///
/// Cheap to clone; clones share the store.
#[derive(Debug, Clone)]
pub struct Registry {
    store: RobotStore,
    retry: RetryPolicy,
}

impl Registry {
    /// Create a registry with the default retry policy.
    pub fn new(store: RobotStore) -> Self {
        Self::with_retry(store, RetryPolicy::default())
    }

    /// Create a registry with an explicit retry policy.
    pub const fn with_retry(store: RobotStore, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Create or update a robot's attributes and return its full snapshot.
    ///
    /// # Errors
    ///
    /// See [`Registry::upsert_detailed`].
    pub async fn upsert(
        &self,
        name: &str,
        changes: &AttributeChanges,
    ) -> Result<Snapshot, RegistryError> {
        Ok(self.upsert_detailed(name, changes).await?.snapshot)
    }

    /// Create or update a robot's attributes, returning everything the call
    /// wrote.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidName`] for an empty name,
    /// [`RegistryError::ConflictRetryExhausted`] when every permitted
    /// attempt lost a unique-constraint race, and
    /// [`RegistryError::StoreUnavailable`] / [`RegistryError::Store`] for
    /// store failures (not retried). Never returns
    /// [`RegistryError::NotFound`].
    pub async fn upsert_detailed(
        &self,
        name: &str,
        changes: &AttributeChanges,
    ) -> Result<UpsertOutcome, RegistryError> {
        let name = validate_robot_name(name)?;
        let mut attempt: u32 = 1;

        loop {
            match self.store.upsert(name, changes).await {
                Ok(outcome) => {
                    if outcome.created {
                        tracing::info!(
                            robot = name,
                            attributes = outcome.snapshot.len(),
                            "Robot created"
                        );
                    }
                    return Ok(outcome);
                }
                Err(err) if err.is_conflict() => {
                    if !self.retry.allows_retry_after(attempt) {
                        tracing::warn!(
                            robot = name,
                            attempts = attempt,
                            error = %err,
                            "Upsert conflict retries exhausted"
                        );
                        return Err(RegistryError::ConflictRetryExhausted {
                            name: name.to_owned(),
                            attempts: attempt,
                        });
                    }
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        robot = name,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Upsert lost a unique-constraint race, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Current attribute values of a robot, in introduction order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the robot does not exist.
    pub async fn snapshot(&self, name: &str) -> Result<Snapshot, RegistryError> {
        let robot = self.require_robot(name).await?;
        let attributes = self.store.attributes(robot.id).await?;
        Ok(snapshot_from(&attributes))
    }

    /// The robot's change history, one event per second in which it changed.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the robot does not exist.
    pub async fn history(&self, name: &str) -> Result<History, RegistryError> {
        let robot = self.require_robot(name).await?;
        let records = self.store.audit_records(robot.id).await?;
        let history = assemble_history(&records);
        tracing::debug!(
            robot = name,
            records = records.len(),
            events = history.len(),
            "Assembled robot history"
        );
        Ok(history)
    }

    /// Every robot with the time of its latest change.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::StoreUnavailable`] / [`RegistryError::Store`]
    /// on store failures.
    pub async fn list(&self) -> Result<Vec<RobotSummary>, RegistryError> {
        Ok(self.store.list_robots().await?)
    }

    async fn require_robot(&self, name: &str) -> Result<Robot, RegistryError> {
        self.store
            .find_robot(name)
            .await?
            .ok_or_else(|| RegistryError::NotFound(name.to_owned()))
    }
}
