//! In-process store with the same semantics as the `PostgreSQL` backend.
//!
//! Used for development (`storage.backend: memory`) and for tests. All
//! state sits behind one [`RwLock`]; an upsert plans and applies its
//! changes while holding the write lock and never awaits in between, so
//! every upsert is atomic and a unique-constraint race cannot occur.
//! Timestamps come from the configured [`Clock`].

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use robotlog_core::{Clock, UpsertPlan, plan_upsert, snapshot_from};
use robotlog_types::{
    AttributeChanges, AttributeId, AuditId, AuditRecord, Robot, RobotAttribute, RobotId,
    RobotSummary,
};
use tokio::sync::RwLock;

use crate::attribute_store::UpsertOutcome;
use crate::error::DbError;

#[derive(Debug, Default)]
struct MemoryState {
    /// Robots by name, in creation order.
    robots: IndexMap<String, Robot>,
    attributes: BTreeMap<RobotId, Vec<RobotAttribute>>,
    audits: BTreeMap<RobotId, Vec<AuditRecord>>,
    last_attribute_id: AttributeId,
    last_audit_id: AuditId,
    /// Upserts that will fail with a conflict before touching anything.
    #[cfg(test)]
    pending_conflicts: u32,
}

impl MemoryState {
    const fn next_attribute_id(&mut self) -> AttributeId {
        self.last_attribute_id = self.last_attribute_id.saturating_add(1);
        self.last_attribute_id
    }

    const fn next_audit_id(&mut self) -> AuditId {
        self.last_audit_id = self.last_audit_id.saturating_add(1);
        self.last_audit_id
    }

    fn apply(&mut self, robot_id: RobotId, plan: &UpsertPlan, now: chrono::DateTime<chrono::Utc>) {
        let mut new_rows = Vec::with_capacity(plan.inserts.len());
        for insert in &plan.inserts {
            new_rows.push(RobotAttribute {
                id: self.next_attribute_id(),
                robot_id,
                key: insert.key.clone(),
                value: insert.value.clone(),
                created_at: now,
                updated_at: now,
            });
        }

        let rows = self.attributes.entry(robot_id).or_default();
        for update in &plan.updates {
            if let Some(row) = rows.iter_mut().find(|row| row.id == update.id) {
                row.value.clone_from(&update.value);
                row.updated_at = now;
            }
        }
        rows.extend(new_rows);
    }
}

/// In-memory robot store.
///
/// Cloning is cheap and clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    clock: Clock,
}

impl MemoryStore {
    /// Create an empty store reading the system clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store reading `clock`.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            state: Arc::default(),
            clock,
        }
    }

    /// The clock timestamps are taken from.
    pub const fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Create or update a robot's attributes atomically.
    ///
    /// # Errors
    ///
    /// Never fails outside of tests; the signature matches the
    /// `PostgreSQL` backend.
    pub async fn upsert(
        &self,
        name: &str,
        changes: &AttributeChanges,
    ) -> Result<UpsertOutcome, DbError> {
        let mut state = self.state.write().await;

        #[cfg(test)]
        if state.pending_conflicts > 0 {
            state.pending_conflicts = state.pending_conflicts.saturating_sub(1);
            return Err(DbError::Conflict(format!("robots.name = {name:?}")));
        }

        let now = self.clock.now();

        let known = state.robots.get(name).cloned();
        let (robot, created, plan) = match known {
            Some(robot) => {
                let existing = state
                    .attributes
                    .get(&robot.id)
                    .map_or(&[][..], Vec::as_slice);
                let plan = plan_upsert(Some(existing), changes);
                (robot, false, plan)
            }
            None => {
                let robot = Robot {
                    id: RobotId::new(),
                    name: name.to_owned(),
                    created_at: now,
                };
                state.robots.insert(name.to_owned(), robot.clone());
                (robot, true, plan_upsert(None, changes))
            }
        };

        state.apply(robot.id, &plan, now);

        let audit = plan.audit.as_ref().map(|pending| {
            let record = AuditRecord {
                id: state.next_audit_id(),
                robot_id: robot.id,
                subject: pending.subject,
                action: pending.action,
                changed_fields: pending.changed_fields.clone(),
                created_at: now,
            };
            state
                .audits
                .entry(robot.id)
                .or_default()
                .push(record.clone());
            record
        });

        let snapshot = state
            .attributes
            .get(&robot.id)
            .map(|rows| snapshot_from(rows))
            .unwrap_or_default();

        tracing::debug!(
            robot = name,
            created,
            changed = plan.changed_count(),
            audited = audit.is_some(),
            "Upserted robot attributes (memory)"
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
    /// Never fails; the signature matches the `PostgreSQL` backend.
    pub async fn find_robot(&self, name: &str) -> Result<Option<Robot>, DbError> {
        Ok(self.state.read().await.robots.get(name).cloned())
    }

    /// All attributes of a robot, in introduction order.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the `PostgreSQL` backend.
    pub async fn attributes(&self, robot_id: RobotId) -> Result<Vec<RobotAttribute>, DbError> {
        Ok(self
            .state
            .read()
            .await
            .attributes
            .get(&robot_id)
            .cloned()
            .unwrap_or_default())
    }

    /// All audit records of a robot, in append order.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the `PostgreSQL` backend.
    pub async fn audit_records(&self, robot_id: RobotId) -> Result<Vec<AuditRecord>, DbError> {
        Ok(self
            .state
            .read()
            .await
            .audits
            .get(&robot_id)
            .cloned()
            .unwrap_or_default())
    }

    /// Every robot with the time of its latest change, oldest first.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the `PostgreSQL` backend.
    pub async fn list_robots(&self) -> Result<Vec<RobotSummary>, DbError> {
        let state = self.state.read().await;
        let mut robots: Vec<&Robot> = state.robots.values().collect();
        robots.sort_by(|a, b| (a.created_at, &a.name).cmp(&(b.created_at, &b.name)));

        Ok(robots
            .into_iter()
            .map(|robot| {
                let last_update = state
                    .attributes
                    .get(&robot.id)
                    .into_iter()
                    .flatten()
                    .map(|attribute| attribute.updated_at)
                    .fold(robot.created_at, std::cmp::max);
                RobotSummary {
                    name: robot.name.clone(),
                    last_update,
                }
            })
            .collect())
    }

    /// Make the next `count` upserts fail with [`DbError::Conflict`].
    #[cfg(test)]
    pub(crate) async fn inject_conflicts(&self, count: u32) {
        self.state.write().await.pending_conflicts = count;
    }
}
