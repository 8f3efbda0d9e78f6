//! Backend selection for the registry.
//!
//! Uses enum dispatch instead of trait objects because async methods are
//! not dyn-compatible.

use robotlog_core::{StorageBackend, StorageConfig};
use robotlog_types::{AttributeChanges, AuditRecord, Robot, RobotAttribute, RobotId, RobotSummary};

use crate::attribute_store::{AttributeStore, UpsertOutcome};
use crate::audit_log::AuditLog;
use crate::error::DbError;
use crate::memory::MemoryStore;
use crate::postgres::{PostgresConfig, PostgresPool};

/// A store the registry can run against.
#[derive(Debug, Clone)]
pub enum RobotStore {
    /// `PostgreSQL` via a connection pool.
    Postgres(PostgresPool),
    /// In-process memory.
    Memory(MemoryStore),
}

impl RobotStore {
    /// Open the backend selected by the `storage` config section.
    ///
    /// For `PostgreSQL` this connects the pool and, if configured, runs
    /// pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if connecting or migrating fails.
    pub async fn open(config: &StorageConfig) -> Result<Self, DbError> {
        match config.backend {
            StorageBackend::Memory => {
                tracing::info!("Using in-memory store");
                Ok(Self::Memory(MemoryStore::new()))
            }
            StorageBackend::Postgres => {
                let pool = PostgresPool::connect(&PostgresConfig::from_storage(config)).await?;
                if config.run_migrations {
                    pool.run_migrations().await?;
                }
                Ok(Self::Postgres(pool))
            }
        }
    }

    /// Human-readable backend name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }

    /// Create or update a robot's attributes atomically.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] from the backend; see [`DbError::is_conflict`].
    pub async fn upsert(
        &self,
        name: &str,
        changes: &AttributeChanges,
    ) -> Result<UpsertOutcome, DbError> {
        match self {
            Self::Postgres(pg) => AttributeStore::new(pg.pool()).upsert(name, changes).await,
            Self::Memory(memory) => memory.upsert(name, changes).await,
        }
    }

    /// Look a robot up by name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] from the backend.
    pub async fn find_robot(&self, name: &str) -> Result<Option<Robot>, DbError> {
        match self {
            Self::Postgres(pg) => AttributeStore::new(pg.pool()).find_robot(name).await,
            Self::Memory(memory) => memory.find_robot(name).await,
        }
    }

    /// All attributes of a robot, in introduction order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] from the backend.
    pub async fn attributes(&self, robot_id: RobotId) -> Result<Vec<RobotAttribute>, DbError> {
        match self {
            Self::Postgres(pg) => AttributeStore::new(pg.pool()).attributes(robot_id).await,
            Self::Memory(memory) => memory.attributes(robot_id).await,
        }
    }

    /// All audit records of a robot.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] from the backend.
    pub async fn audit_records(&self, robot_id: RobotId) -> Result<Vec<AuditRecord>, DbError> {
        match self {
            Self::Postgres(pg) => AuditLog::new(pg.pool()).records_for_robot(robot_id).await,
            Self::Memory(memory) => memory.audit_records(robot_id).await,
        }
    }

    /// Every robot with the time of its latest change.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] from the backend.
    pub async fn list_robots(&self) -> Result<Vec<RobotSummary>, DbError> {
        match self {
            Self::Postgres(pg) => AttributeStore::new(pg.pool()).list_robots().await,
            Self::Memory(memory) => memory.list_robots().await,
        }
    }

    /// Release backend resources.
    pub async fn close(&self) {
        if let Self::Postgres(pg) = self {
            pg.close().await;
        }
    }
}

impl From<MemoryStore> for RobotStore {
    fn from(store: MemoryStore) -> Self {
        Self::Memory(store)
    }
}

impl From<PostgresPool> for RobotStore {
    fn from(pool: PostgresPool) -> Self {
        Self::Postgres(pool)
    }
}
