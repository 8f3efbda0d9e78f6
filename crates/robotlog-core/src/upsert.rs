//! Upsert planning: deciding what a write request actually changes.
//!
//! A write request carries a robot name and an ordered mapping of attribute
//! keys to new values. Before touching the store, the request is turned into
//! an [`UpsertPlan`]: the attribute rows to insert, the rows to update, and
//! the single audit record (if any) describing the call. Stores execute the
//! plan inside one transaction so the audit trail never disagrees with the
//! attribute rows.
//!
//! # Audit rules
//!
//! | Situation | Audit record |
//! |-----------|--------------|
//! | Robot does not exist | `robot` / `create`, every requested key with `old = ""` |
//! | Robot exists, some keys new or different | `attribute` / `update`, only the keys that changed |
//! | Robot exists, every value identical | none |

use robotlog_types::{
    AttributeChanges, AttributeId, AuditAction, AuditSubject, ChangedFields, FieldChange,
    RobotAttribute, Snapshot,
};

/// A new attribute row to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInsert {
    /// Attribute key.
    pub key: String,
    /// Initial value.
    pub value: String,
}

/// An existing attribute row whose value changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeUpdate {
    /// Row to update.
    pub id: AttributeId,
    /// Key of the row (for logging; keys never change).
    pub key: String,
    /// New value.
    pub value: String,
}

/// An audit record waiting for its id and timestamp from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAudit {
    /// Kind of subject that changed.
    pub subject: AuditSubject,
    /// What happened to the subject.
    pub action: AuditAction,
    /// Every field that changed, in request order.
    pub changed_fields: ChangedFields,
}

/// Everything one upsert call will write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertPlan {
    /// Attribute rows to create, in request order.
    pub inserts: Vec<AttributeInsert>,
    /// Attribute rows to modify, in request order.
    pub updates: Vec<AttributeUpdate>,
    /// The audit record for this call, absent for a pure no-op.
    pub audit: Option<PendingAudit>,
}

impl UpsertPlan {
    /// Whether executing the plan writes nothing.
    pub const fn is_noop(&self) -> bool {
        self.audit.is_none()
    }

    /// Number of attribute keys the plan creates or modifies.
    pub fn changed_count(&self) -> usize {
        self.inserts.len().saturating_add(self.updates.len())
    }
}

/// Plan an upsert.
///
/// `existing` is `None` when the robot does not exist yet, otherwise the
/// robot's current attribute rows.
pub fn plan_upsert(existing: Option<&[RobotAttribute]>, changes: &AttributeChanges) -> UpsertPlan {
    match existing {
        None => plan_creation(changes),
        Some(attributes) => plan_update(attributes, changes),
    }
}

/// Plan the write that brings a robot into existence.
///
/// All initial attributes belong to the one `robot`/`create` record, which
/// is emitted even when `changes` is empty.
pub fn plan_creation(changes: &AttributeChanges) -> UpsertPlan {
    let inserts = changes
        .iter()
        .map(|(key, value)| AttributeInsert {
            key: key.clone(),
            value: value.clone(),
        })
        .collect();

    let changed_fields = changes
        .iter()
        .map(|(key, value)| (key.clone(), FieldChange::introduced(value.as_str())))
        .collect();

    UpsertPlan {
        inserts,
        updates: Vec::new(),
        audit: Some(PendingAudit {
            subject: AuditSubject::Robot,
            action: AuditAction::Create,
            changed_fields,
        }),
    }
}

/// Plan a write against an existing robot.
///
/// Keys absent from `existing` are inserted, keys with a different value are
/// updated, identical values are skipped. New keys are recorded as
/// `update`s of the robot with an empty old value.
pub fn plan_update(existing: &[RobotAttribute], changes: &AttributeChanges) -> UpsertPlan {
    let mut plan = UpsertPlan::default();
    let mut changed_fields = ChangedFields::new();

    for (key, value) in changes {
        match existing.iter().find(|attribute| attribute.key == *key) {
            None => {
                plan.inserts.push(AttributeInsert {
                    key: key.clone(),
                    value: value.clone(),
                });
                changed_fields.insert(key.clone(), FieldChange::introduced(value.as_str()));
            }
            Some(current) if current.value != *value => {
                plan.updates.push(AttributeUpdate {
                    id: current.id,
                    key: key.clone(),
                    value: value.clone(),
                });
                changed_fields.insert(
                    key.clone(),
                    FieldChange::new(current.value.as_str(), value.as_str()),
                );
            }
            Some(_) => {}
        }
    }

    if !changed_fields.is_empty() {
        plan.audit = Some(PendingAudit {
            subject: AuditSubject::Attribute,
            action: AuditAction::Update,
            changed_fields,
        });
    }

    plan
}

/// Build the key/value snapshot of a robot from its attribute rows.
///
/// Rows are ordered by id, so keys appear in the order they were introduced
/// regardless of the order the store returned them in.
pub fn snapshot_from(attributes: &[RobotAttribute]) -> Snapshot {
    let mut rows: Vec<&RobotAttribute> = attributes.iter().collect();
    rows.sort_by_key(|attribute| attribute.id);
    rows.into_iter()
        .map(|attribute| (attribute.key.clone(), attribute.value.clone()))
        .collect()
}
