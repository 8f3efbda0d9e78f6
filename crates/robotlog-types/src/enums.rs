//! Enumeration types for audit records and history events.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// What kind of subject an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AuditSubject {
    /// The robot itself (its genesis, together with its initial attributes).
    Robot,
    /// One or more attributes of an existing robot.
    Attribute,
}

impl AuditSubject {
    /// Name of the variant in the `audit_subject` `PostgreSQL` enum.
    pub const fn as_db(self) -> &'static str {
        match self {
            Self::Robot => "robot",
            Self::Attribute => "attribute",
        }
    }

    /// Parse the `PostgreSQL` enum text back into a variant.
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "robot" => Some(Self::Robot),
            "attribute" => Some(Self::Attribute),
            _ => None,
        }
    }
}

/// The action an audit record captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AuditAction {
    /// The subject came into existence.
    Create,
    /// The subject was modified.
    Update,
}

impl AuditAction {
    /// Name of the variant in the `audit_action` `PostgreSQL` enum.
    pub const fn as_db(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }

    /// Parse the `PostgreSQL` enum text back into a variant.
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            _ => None,
        }
    }
}

/// Type of a caller-facing history event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum HistoryEventType {
    /// The event contains the robot's creation.
    Create,
    /// Every other event.
    Update,
}
