//! History assembly: replaying a robot's audit records into a timeline.
//!
//! Audit records are grouped by their timestamp truncated to whole seconds,
//! the granularity callers see. Every group becomes one [`HistoryEvent`]
//! keyed by the second rendered as `YYYY-MM-DD HH:MM:SS` (UTC):
//!
//! - the event is a `create` if the group holds the robot's genesis record,
//!   otherwise an `update`;
//! - its `changes` are the union of the group's changed fields in record
//!   order. When two records in one second touch the same field the later
//!   record wins and the collision is logged.
//!
//! Upserts emit at most one record per call, so merging only happens when
//! separate calls land in the same second.

use chrono::{DateTime, SubsecRound, Utc};
use robotlog_types::{AuditRecord, ChangedFields, History, HistoryEvent, HistoryEventType};

/// `strftime` pattern of history keys.
pub const HISTORY_KEY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Drop the sub-second part of a timestamp.
pub fn truncate_to_second(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp.trunc_subsecs(0)
}

/// Render the history key for a timestamp.
pub fn history_key(timestamp: DateTime<Utc>) -> String {
    truncate_to_second(timestamp)
        .format(HISTORY_KEY_FORMAT)
        .to_string()
}

/// Assemble the timeline of one robot from its audit records.
///
/// Records may arrive in any order; they are replayed by timestamp, then
/// by id. The returned mapping lists events chronologically.
pub fn assemble_history(records: &[AuditRecord]) -> History {
    let mut ordered: Vec<&AuditRecord> = records.iter().collect();
    ordered.sort_by_key(|record| (record.created_at, record.id));

    let mut history = History::new();

    for record in ordered {
        let key = history_key(record.created_at);
        let event = history.entry(key).or_insert_with(|| HistoryEvent {
            event_type: HistoryEventType::Update,
            changes: ChangedFields::new(),
        });

        if record.is_robot_creation() {
            event.event_type = HistoryEventType::Create;
        }

        for (field, change) in &record.changed_fields {
            if let Some(previous) = event.changes.insert(field.clone(), change.clone()) {
                tracing::warn!(
                    robot_id = %record.robot_id,
                    audit_id = record.id,
                    field = field.as_str(),
                    replaced_old = previous.old.as_str(),
                    replaced_new = previous.new.as_str(),
                    "Audit records in the same second changed one field; keeping the later change"
                );
            }
        }
    }

    history
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{Duration, TimeZone};
    use robotlog_types::{AuditAction, AuditSubject, FieldChange, RobotId};

    use super::*;

    fn at(secs: i64, millis: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().unwrap()
            + Duration::seconds(secs)
            + Duration::milliseconds(millis)
    }

    fn record(
        id: i64,
        robot_id: RobotId,
        subject: AuditSubject,
        action: AuditAction,
        fields: &[(&str, &str, &str)],
        created_at: DateTime<Utc>,
    ) -> AuditRecord {
        let changed_fields: ChangedFields = fields
            .iter()
            .map(|(key, old, new)| ((*key).to_owned(), FieldChange::new(*old, *new)))
            .collect();
        AuditRecord {
            id,
            robot_id,
            subject,
            action,
            changed_fields,
            created_at,
        }
    }

    #[test]
    fn key_is_second_precision_utc() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).single().unwrap()
            + Duration::milliseconds(999);
        assert_eq!(history_key(ts), "2024-03-01 09:05:07");
    }

    #[test]
    fn creation_is_a_single_create_event() {
        let robot = RobotId::new();
        let records = [record(
            1,
            robot,
            AuditSubject::Robot,
            AuditAction::Create,
            &[("color", "", "red"), ("weight", "", "100kg"), ("height", "", "10m")],
            at(0, 250),
        )];

        let history = assemble_history(&records);
        assert_eq!(history.len(), 1);

        let event = &history["2024-03-01 12:00:00"];
        assert_eq!(event.event_type, HistoryEventType::Create);
        assert_eq!(event.changes.len(), 3);
        assert!(event.changes.values().all(|c| c.old.is_empty()));
    }

    #[test]
    fn separate_seconds_produce_separate_events_in_order() {
        let robot = RobotId::new();
        let records = [
            record(
                3,
                robot,
                AuditSubject::Attribute,
                AuditAction::Update,
                &[("language", "", "German")],
                at(90_000, 0),
            ),
            record(
                1,
                robot,
                AuditSubject::Robot,
                AuditAction::Create,
                &[("weight", "", "100kg")],
                at(0, 0),
            ),
            record(
                2,
                robot,
                AuditSubject::Attribute,
                AuditAction::Update,
                &[("age", "", "20years"), ("weight", "100kg", "50kg")],
                at(3_600, 0),
            ),
        ];

        let history = assemble_history(&records);
        let keys: Vec<&str> = history.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["2024-03-01 12:00:00", "2024-03-01 13:00:00", "2024-03-02 13:00:00"]
        );

        let update = &history["2024-03-01 13:00:00"];
        assert_eq!(update.event_type, HistoryEventType::Update);
        assert_eq!(update.changes["age"], FieldChange::new("", "20years"));
        assert_eq!(update.changes["weight"], FieldChange::new("100kg", "50kg"));

        let language = &history["2024-03-02 13:00:00"];
        assert_eq!(language.changes["language"], FieldChange::new("", "German"));
    }

    #[test]
    fn same_second_records_merge() {
        let robot = RobotId::new();
        let records = [
            record(
                1,
                robot,
                AuditSubject::Attribute,
                AuditAction::Update,
                &[("color", "red", "blue")],
                at(5, 100),
            ),
            record(
                2,
                robot,
                AuditSubject::Attribute,
                AuditAction::Update,
                &[("height", "10m", "12m")],
                at(5, 900),
            ),
        ];

        let history = assemble_history(&records);
        assert_eq!(history.len(), 1);
        let event = &history["2024-03-01 12:00:05"];
        assert_eq!(event.event_type, HistoryEventType::Update);
        let fields: Vec<&str> = event.changes.keys().map(String::as_str).collect();
        assert_eq!(fields, ["color", "height"]);
    }

    #[test]
    fn creation_wins_type_and_later_change_wins_collision() {
        let robot = RobotId::new();
        let records = [
            record(
                1,
                robot,
                AuditSubject::Robot,
                AuditAction::Create,
                &[("weight", "", "100kg")],
                at(0, 10),
            ),
            record(
                2,
                robot,
                AuditSubject::Attribute,
                AuditAction::Update,
                &[("weight", "100kg", "50kg")],
                at(0, 20),
            ),
        ];

        let history = assemble_history(&records);
        assert_eq!(history.len(), 1);
        let event = &history["2024-03-01 12:00:00"];
        assert_eq!(event.event_type, HistoryEventType::Create);
        assert_eq!(event.changes["weight"], FieldChange::new("100kg", "50kg"));
    }

    #[test]
    fn equal_timestamps_replay_by_id() {
        let robot = RobotId::new();
        let ts = at(1, 0);
        let records = [
            record(
                8,
                robot,
                AuditSubject::Attribute,
                AuditAction::Update,
                &[("color", "blue", "green")],
                ts,
            ),
            record(
                7,
                robot,
                AuditSubject::Attribute,
                AuditAction::Update,
                &[("color", "red", "blue")],
                ts,
            ),
        ];

        let history = assemble_history(&records);
        let event = &history["2024-03-01 12:00:01"];
        assert_eq!(event.changes["color"], FieldChange::new("blue", "green"));
    }

    #[test]
    fn no_records_no_events() {
        assert!(assemble_history(&[]).is_empty());
    }
}
