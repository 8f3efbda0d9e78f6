//! Robot and attribute lifecycle on `PostgreSQL`.
//!
//! [`AttributeStore::upsert`] runs one write request as a single
//! transaction:
//!
//! ```text
//! BEGIN
//!   SELECT ... FROM robots WHERE name = $1 FOR UPDATE
//!   |-- found:   SELECT clock_timestamp()          -- shared timestamp
//!   |            load attributes, plan update
//!   +-- missing: INSERT robot (created_at = clock_timestamp())
//!                ON CONFLICT DO NOTHING, plan creation
//!   INSERT / UPDATE robot_attributes              -- per plan
//!   INSERT INTO audits                            -- at most one row
//!   SELECT attributes                             -- snapshot
//! COMMIT
//! ```
//!
//! The shared timestamp is read after the robot row is locked (or
//! inserted), so writers of one robot get timestamps in lock order.
//!
//! Losing a race on `robots.name` or `(robot_id, key)` surfaces as
//! [`DbError::Conflict`] (or a unique violation); the transaction is
//! dropped, which rolls it back, and the caller may replay the upsert.

use chrono::{DateTime, Utc};
use robotlog_core::{UpsertPlan, plan_upsert, snapshot_from};
use robotlog_types::{
    AttributeChanges, AuditRecord, Robot, RobotAttribute, RobotId, RobotSummary, Snapshot,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::audit_log::AuditLog;
use crate::error::DbError;

/// Result of one committed upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// The robot written to.
    pub robot: Robot,
    /// Whether this call created the robot.
    pub created: bool,
    /// The audit record appended by this call, if anything changed.
    pub audit: Option<AuditRecord>,
    /// Every current attribute of the robot, in introduction order.
    pub snapshot: Snapshot,
}

/// Robot and attribute operations on `PostgreSQL`.
pub struct AttributeStore<'a> {
    pool: &'a PgPool,
}

impl<'a> AttributeStore<'a> {
    /// Create a new attribute store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create or update a robot's attributes in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Conflict`] (or a unique-violation
    /// [`DbError::Postgres`]) when a concurrent writer created the same
    /// robot or attribute first, and [`DbError::Postgres`] for any other
    /// database failure. Nothing is committed on error.
    pub async fn upsert(
        &self,
        name: &str,
        changes: &AttributeChanges,
    ) -> Result<UpsertOutcome, DbError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, RobotRow>(
            r"SELECT id, name, created_at FROM robots WHERE name = $1 FOR UPDATE",
        )
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;

        let (robot, created, plan, now) = match existing {
            Some(row) => {
                let robot = Robot::from(row);
                let now: DateTime<Utc> = sqlx::query_scalar("SELECT clock_timestamp()")
                    .fetch_one(&mut *tx)
                    .await?;
                let attributes = fetch_attributes(&mut tx, robot.id).await?;
                let plan = plan_upsert(Some(attributes.as_slice()), changes);
                (robot, false, plan, now)
            }
            None => {
                let robot = insert_robot(&mut tx, name).await?;
                let now = robot.created_at;
                (robot, true, plan_upsert(None, changes), now)
            }
        };

        apply_plan(&mut tx, robot.id, &plan, now).await?;

        let audit = match &plan.audit {
            Some(pending) => Some(AuditLog::append(&mut tx, robot.id, pending, now).await?),
            None => None,
        };

        let snapshot = snapshot_from(&fetch_attributes(&mut tx, robot.id).await?);

        tx.commit().await?;

        tracing::debug!(
            robot = name,
            created,
            changed = plan.changed_count(),
            audited = audit.is_some(),
            "Upserted robot attributes"
        );

        Ok(UpsertOutcome {
            robot,
            created,
            audit,
            snapshot,
        })
    }

    /// Look a robot up by name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn find_robot(&self, name: &str) -> Result<Option<Robot>, DbError> {
        let row = sqlx::query_as::<_, RobotRow>(
            r"SELECT id, name, created_at FROM robots WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Robot::from))
    }

    /// All attributes of a robot, in introduction order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn attributes(&self, robot_id: RobotId) -> Result<Vec<RobotAttribute>, DbError> {
        let mut conn = self.pool.acquire().await?;
        fetch_attributes(&mut conn, robot_id).await
    }

    /// Every robot with the time of its latest change.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn list_robots(&self) -> Result<Vec<RobotSummary>, DbError> {
        let rows = sqlx::query_as::<_, RobotSummaryRow>(
            r"SELECT r.name,
                     GREATEST(r.created_at, COALESCE(MAX(a.updated_at), r.created_at)) AS last_update
              FROM robots r
              LEFT JOIN robot_attributes a ON a.robot_id = r.id
              GROUP BY r.id, r.name, r.created_at
              ORDER BY r.created_at, r.name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| RobotSummary {
                name: row.name,
                last_update: row.last_update,
            })
            .collect())
    }
}

/// Insert a new robot stamped with the current wall-clock time, failing
/// with [`DbError::Conflict`] if the name was taken by a concurrent
/// transaction.
async fn insert_robot(conn: &mut PgConnection, name: &str) -> Result<Robot, DbError> {
    let inserted = sqlx::query_as::<_, RobotRow>(
        r"INSERT INTO robots (id, name, created_at)
          VALUES ($1, $2, clock_timestamp())
          ON CONFLICT (name) DO NOTHING
          RETURNING id, name, created_at",
    )
    .bind(RobotId::new().into_inner())
    .bind(name)
    .fetch_optional(conn)
    .await?;

    let row = inserted.ok_or_else(|| DbError::Conflict(format!("robots.name = {name:?}")))?;
    tracing::debug!(robot = name, "Inserted robot row");
    Ok(Robot::from(row))
}

/// Execute the inserts and updates of a plan.
async fn apply_plan(
    conn: &mut PgConnection,
    robot_id: RobotId,
    plan: &UpsertPlan,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    for insert in &plan.inserts {
        let id: Option<i64> = sqlx::query_scalar(
            r"INSERT INTO robot_attributes (robot_id, key, value, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $4)
              ON CONFLICT (robot_id, key) DO NOTHING
              RETURNING id",
        )
        .bind(robot_id.into_inner())
        .bind(&insert.key)
        .bind(&insert.value)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        if id.is_none() {
            return Err(DbError::Conflict(format!(
                "robot_attributes ({robot_id}, {:?})",
                insert.key
            )));
        }
    }

    for update in &plan.updates {
        sqlx::query(r"UPDATE robot_attributes SET value = $1, updated_at = $2 WHERE id = $3")
            .bind(&update.value)
            .bind(now)
            .bind(update.id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

async fn fetch_attributes(
    conn: &mut PgConnection,
    robot_id: RobotId,
) -> Result<Vec<RobotAttribute>, DbError> {
    let rows = sqlx::query_as::<_, AttributeRow>(
        r"SELECT id, robot_id, key, value, created_at, updated_at
          FROM robot_attributes
          WHERE robot_id = $1
          ORDER BY id",
    )
    .bind(robot_id.into_inner())
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(RobotAttribute::from).collect())
}

/// A row from the `robots` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RobotRow {
    /// Robot id.
    pub id: Uuid,
    /// Unique name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<RobotRow> for Robot {
    fn from(row: RobotRow) -> Self {
        Self {
            id: RobotId::from(row.id),
            name: row.name,
            created_at: row.created_at,
        }
    }
}

/// A row from the `robot_attributes` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttributeRow {
    /// Auto-incremented id.
    pub id: i64,
    /// Owning robot.
    pub robot_id: Uuid,
    /// Attribute key.
    pub key: String,
    /// Current value.
    pub value: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last value change.
    pub updated_at: DateTime<Utc>,
}

impl From<AttributeRow> for RobotAttribute {
    fn from(row: AttributeRow) -> Self {
        Self {
            id: row.id,
            robot_id: RobotId::from(row.robot_id),
            key: row.key,
            value: row.value,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RobotSummaryRow {
    name: String,
    last_update: DateTime<Utc>,
}
