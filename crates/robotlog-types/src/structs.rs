//! Core entity structs: robots, attributes, audit records, and history events.
//!
//! Ordered mappings use [`IndexMap`] throughout: attribute snapshots list
//! keys in the order they were first introduced, and history timelines list
//! events in the order they were assembled.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{AuditAction, AuditSubject, HistoryEventType};
use crate::ids::{AttributeId, AuditId, RobotId};

/// Current attribute values of a robot, keyed by attribute key.
pub type Snapshot = IndexMap<String, String>;

/// Requested attribute writes, in caller order.
pub type AttributeChanges = IndexMap<String, String>;

/// Field-level diff carried by an audit record or history event.
pub type ChangedFields = IndexMap<String, FieldChange>;

/// Reconstructed timeline, keyed by second-precision timestamp.
pub type History = IndexMap<String, HistoryEvent>;

/// A uniquely named robot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Robot {
    /// Unique identifier.
    pub id: RobotId,
    /// Unique, immutable name.
    pub name: String,
    /// When the robot was first written.
    pub created_at: DateTime<Utc>,
}

/// A single named string value attached to a robot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RobotAttribute {
    /// Store-assigned id; reflects the order keys were introduced.
    pub id: AttributeId,
    /// Owning robot.
    pub robot_id: RobotId,
    /// Attribute key, immutable once the row exists.
    pub key: String,
    /// Current value.
    pub value: String,
    /// When the key was first written.
    pub created_at: DateTime<Utc>,
    /// When the value last changed.
    pub updated_at: DateTime<Utc>,
}

/// Before/after pair for one field.
///
/// `old` is the empty string when the field did not exist before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FieldChange {
    /// Value before the change.
    pub old: String,
    /// Value after the change.
    pub new: String,
}

impl FieldChange {
    /// Build a change from its before and after values.
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }

    /// A change introducing a field that did not exist.
    pub fn introduced(new: impl Into<String>) -> Self {
        Self::new(String::new(), new)
    }
}

/// An immutable, append-only record of one atomic set of field changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AuditRecord {
    /// Store-assigned id; breaks ties between records with equal timestamps.
    pub id: AuditId,
    /// Robot the record traces back to.
    pub robot_id: RobotId,
    /// Kind of subject that changed.
    pub subject: AuditSubject,
    /// What happened to the subject.
    pub action: AuditAction,
    /// Every field that changed, in the order it was written.
    pub changed_fields: ChangedFields,
    /// Transaction timestamp shared by all writes of the originating call.
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Whether this record is the robot's genesis.
    pub fn is_robot_creation(&self) -> bool {
        self.subject == AuditSubject::Robot && self.action == AuditAction::Create
    }
}

/// One caller-facing entry of a robot's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HistoryEvent {
    /// `create` if the event contains the robot's creation, else `update`.
    #[serde(rename = "type")]
    pub event_type: HistoryEventType,
    /// Union of all field changes in the event.
    pub changes: ChangedFields,
}

/// Listing entry for one robot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RobotSummary {
    /// Robot name.
    pub name: String,
    /// Latest of the robot's creation and any attribute update.
    pub last_update: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn history_event_uses_type_key() {
        let mut changes = ChangedFields::new();
        changes.insert(String::from("weight"), FieldChange::new("100kg", "50kg"));
        let event = HistoryEvent {
            event_type: HistoryEventType::Update,
            changes,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "update",
                "changes": { "weight": { "old": "100kg", "new": "50kg" } }
            })
        );
    }

    #[test]
    fn introduced_change_has_empty_old_value() {
        let change = FieldChange::introduced("German");
        assert_eq!(change.old, "");
        assert_eq!(change.new, "German");
    }

    #[test]
    fn snapshot_serializes_in_insertion_order() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(String::from("weight"), String::from("100kg"));
        snapshot.insert(String::from("color"), String::from("red"));

        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"{"weight":"100kg","color":"red"}"#);
    }

    #[test]
    fn robot_creation_is_detected() {
        let record = AuditRecord {
            id: 1,
            robot_id: RobotId::new(),
            subject: AuditSubject::Robot,
            action: AuditAction::Create,
            changed_fields: ChangedFields::new(),
            created_at: Utc::now(),
        };
        assert!(record.is_robot_creation());

        let update = AuditRecord {
            subject: AuditSubject::Attribute,
            action: AuditAction::Update,
            ..record
        };
        assert!(!update.is_robot_creation());
    }
}
