//! Domain logic of the robot attribute registry.
//!
//! Everything in this crate is pure: no I/O, no database handles. Stores
//! in `robotlog-store` load rows, hand them to the planners and assemblers
//! here, and write back what they return.
//!
//! # Modules
//!
//! - [`name`] -- Robot name validation
//! - [`upsert`] -- Turning a write request into inserts, updates, and one audit record
//! - [`history`] -- Grouping audit records into second-resolution history events
//! - [`clock`] -- Wall or manual time source for app-assigned timestamps
//! - [`retry`] -- Bounded, jittered replay of conflicting upserts
//! - [`config`] -- YAML configuration with environment overrides

pub mod clock;
pub mod config;
pub mod history;
pub mod name;
pub mod retry;
pub mod upsert;

pub use clock::Clock;
pub use config::{
    ConfigError, HttpConfig, LogFormat, LoggingConfig, RegistryConfig, StorageBackend,
    StorageConfig, UpsertConfig,
};
pub use history::{assemble_history, history_key, truncate_to_second};
pub use name::{NameError, validate_robot_name};
pub use retry::RetryPolicy;
pub use upsert::{
    AttributeInsert, AttributeUpdate, PendingAudit, UpsertPlan, plan_upsert, snapshot_from,
};
