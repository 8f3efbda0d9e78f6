//! Shared type definitions for the robot attribute registry.
//!
//! This crate is the single source of truth for the data shapes that flow
//! between the store, the history assembler, and the HTTP adapter. Types
//! defined here are also exported to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifiers
//! - [`enums`] -- Audit subjects, audit actions, history event types
//! - [`structs`] -- Robots, attributes, audit records, history events

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{AuditAction, AuditSubject, HistoryEventType};
pub use ids::{AttributeId, AuditId, RobotId};
pub use structs::{
    AttributeChanges, AuditRecord, ChangedFields, FieldChange, History, HistoryEvent, Robot,
    RobotAttribute, RobotSummary, Snapshot,
};
