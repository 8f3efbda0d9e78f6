//! Audit log operations on the `audits` table.
//!
//! The audit log is the source of truth for a robot's history. Records are
//! appended inside the upsert transaction that produced them and never
//! modified afterwards (a trigger rejects `UPDATE` and `DELETE`).
//!
//! `changed_fields` is stored as a JSONB array of `{key, old, new}` objects
//! rather than a JSONB object, because JSONB does not preserve object key
//! order and the order fields were written in is part of the record.

use chrono::{DateTime, Utc};
use robotlog_core::PendingAudit;
use robotlog_types::{AuditAction, AuditRecord, AuditSubject, ChangedFields, FieldChange, RobotId};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::DbError;

/// Operations on the `audits` table.
pub struct AuditLog<'a> {
    pool: &'a PgPool,
}

impl<'a> AuditLog<'a> {
    /// Create a new audit log bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append one record on an open transaction.
    ///
    /// `created_at` is the transaction timestamp shared with every other
    /// write of the same upsert.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails, or
    /// [`DbError::Serialization`] if the changed fields cannot be encoded.
    pub async fn append(
        conn: &mut PgConnection,
        robot_id: RobotId,
        pending: &PendingAudit,
        created_at: DateTime<Utc>,
    ) -> Result<AuditRecord, DbError> {
        let changed_fields = encode_changed_fields(&pending.changed_fields)?;

        let row = sqlx::query_as::<_, AuditRow>(
            r"INSERT INTO audits (robot_id, subject_type, action, changed_fields, created_at)
              VALUES ($1, $2::audit_subject, $3::audit_action, $4, $5)
              RETURNING id, robot_id, subject_type::TEXT AS subject_type, action::TEXT AS action, changed_fields, created_at",
        )
        .bind(robot_id.into_inner())
        .bind(pending.subject.as_db())
        .bind(pending.action.as_db())
        .bind(&changed_fields)
        .bind(created_at)
        .fetch_one(conn)
        .await?;

        tracing::debug!(
            robot_id = %robot_id,
            audit_id = row.id,
            fields = pending.changed_fields.len(),
            "Appended audit record"
        );

        row.try_into()
    }

    /// All records of one robot, oldest first (ties broken by id).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::InvalidRow`] if a stored record does not decode.
    pub async fn records_for_robot(&self, robot_id: RobotId) -> Result<Vec<AuditRecord>, DbError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r"SELECT id, robot_id, subject_type::TEXT AS subject_type, action::TEXT AS action, changed_fields, created_at
              FROM audits
              WHERE robot_id = $1
              ORDER BY created_at, id",
        )
        .bind(robot_id.into_inner())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(AuditRecord::try_from).collect()
    }

    /// Number of records of one robot.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn count_for_robot(&self, robot_id: RobotId) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audits WHERE robot_id = $1")
            .bind(robot_id.into_inner())
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

/// A row from the `audits` table.
///
/// Enum columns are cast to `TEXT` in every query and parsed back here.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditRow {
    /// Auto-incremented record id.
    pub id: i64,
    /// Robot the record belongs to.
    pub robot_id: Uuid,
    /// `audit_subject` enum value as text.
    pub subject_type: String,
    /// `audit_action` enum value as text.
    pub action: String,
    /// JSON array of `{key, old, new}` objects.
    pub changed_fields: serde_json::Value,
    /// Transaction timestamp of the originating upsert.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditRecord {
    type Error = DbError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let subject = AuditSubject::from_db(&row.subject_type).ok_or_else(|| {
            DbError::InvalidRow(format!(
                "audit {}: unknown subject_type {:?}",
                row.id, row.subject_type
            ))
        })?;
        let action = AuditAction::from_db(&row.action).ok_or_else(|| {
            DbError::InvalidRow(format!("audit {}: unknown action {:?}", row.id, row.action))
        })?;

        Ok(Self {
            id: row.id,
            robot_id: RobotId::from(row.robot_id),
            subject,
            action,
            changed_fields: decode_changed_fields(row.changed_fields)?,
            created_at: row.created_at,
        })
    }
}

/// Storage shape of one changed field.
#[derive(Debug, Serialize, Deserialize)]
struct StoredChange {
    key: String,
    old: String,
    new: String,
}

/// Encode changed fields as an order-preserving JSON array.
pub(crate) fn encode_changed_fields(fields: &ChangedFields) -> Result<serde_json::Value, DbError> {
    let stored: Vec<StoredChange> = fields
        .iter()
        .map(|(key, change)| StoredChange {
            key: key.clone(),
            old: change.old.clone(),
            new: change.new.clone(),
        })
        .collect();
    Ok(serde_json::to_value(stored)?)
}

/// Decode the JSON array written by [`encode_changed_fields`].
pub(crate) fn decode_changed_fields(value: serde_json::Value) -> Result<ChangedFields, DbError> {
    let stored: Vec<StoredChange> = serde_json::from_value(value)?;
    Ok(stored
        .into_iter()
        .map(|change| (change.key, FieldChange::new(change.old, change.new)))
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn changed_fields_keep_their_order_in_storage() {
        let mut fields = ChangedFields::new();
        fields.insert(String::from("weight"), FieldChange::new("100kg", "50kg"));
        fields.insert(String::from("age"), FieldChange::introduced("20years"));

        let encoded = encode_changed_fields(&fields).unwrap();
        assert_eq!(
            encoded,
            serde_json::json!([
                { "key": "weight", "old": "100kg", "new": "50kg" },
                { "key": "age", "old": "", "new": "20years" },
            ])
        );

        let decoded = decode_changed_fields(encoded).unwrap();
        let keys: Vec<&str> = decoded.keys().map(String::as_str).collect();
        assert_eq!(keys, ["weight", "age"]);
        assert_eq!(decoded["weight"], FieldChange::new("100kg", "50kg"));
    }

    #[test]
    fn unknown_enum_text_is_an_invalid_row() {
        let row = AuditRow {
            id: 9,
            robot_id: Uuid::now_v7(),
            subject_type: String::from("entity"),
            action: String::from("create"),
            changed_fields: serde_json::json!([]),
            created_at: Utc::now(),
        };
        let result = AuditRecord::try_from(row);
        assert!(matches!(result, Err(DbError::InvalidRow(_))));
    }

    #[test]
    fn malformed_changed_fields_are_rejected() {
        let result = decode_changed_fields(serde_json::json!({ "weight": ["100kg", "50kg"] }));
        assert!(matches!(result, Err(DbError::Serialization(_))));
    }
}
