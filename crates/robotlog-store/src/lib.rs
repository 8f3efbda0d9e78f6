//! Persistence and the registry service for robot attributes.
//!
//! `PostgreSQL` is the production store; an in-process store with the same
//! semantics backs development setups and tests. The [`Registry`] sits on
//! top of either and exposes the upsert, snapshot, history, and listing
//! operations.
//!
//! # Architecture
//!
//! ```text
//! Registry (validation, conflict retries, history assembly)
//!     |
//!     +-- RobotStore::Postgres --> PostgresPool
//!     |       |-- AttributeStore   (robots + robot_attributes, upsert tx)
//!     |       +-- AuditLog         (append-only audits)
//!     |
//!     +-- RobotStore::Memory ----> MemoryStore
//! ```
//!
//! # Modules
//!
//! - [`registry`] -- The registry service and its error type
//! - [`store`] -- Backend selection
//! - [`attribute_store`] -- Upsert transaction, lookups, listing
//! - [`audit_log`] -- Audit record persistence
//! - [`memory`] -- In-process backend
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`error`] -- Store error type

pub mod attribute_store;
pub mod audit_log;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod registry;
pub mod store;

pub use attribute_store::{AttributeRow, AttributeStore, RobotRow, UpsertOutcome};
pub use audit_log::{AuditLog, AuditRow};
pub use error::DbError;
pub use memory::MemoryStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use registry::{Registry, RegistryError};
pub use store::RobotStore;
