//! Change auditor: turns a status delta into human-readable audit entries.

use std::sync::Arc;

use alarmsight_common::{AuditEntry, FieldSchema, StatusDelta};
use chrono::Utc;

/// Describes what a delta changes, one entry per recognized field.
///
/// Pure: persisting the entries is the caller's job. Device telemetry and
/// operator commands are described with the same vocabulary.
#[derive(Debug, Clone)]
pub struct ChangeAuditor {
    schema: Arc<FieldSchema>,
}

impl ChangeAuditor {
    pub fn new(schema: Arc<FieldSchema>) -> Self {
        Self { schema }
    }

    /// Produce the audit entries for `delta`.
    ///
    /// Entries follow the schema's declared order, not the payload's, and
    /// share one timestamp.
    pub fn describe(&self, delta: &StatusDelta) -> Vec<AuditEntry> {
        let now = Utc::now();
        self.schema
            .iter()
            .filter_map(|field| {
                let value = delta.get(&field.key)?;
                field.describe(value)
            })
            .map(|message| AuditEntry::at(message, now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alarmsight_common::FieldSpec;

    fn auditor() -> ChangeAuditor {
        ChangeAuditor::new(Arc::new(FieldSchema::alarm_panel()))
    }

    fn messages(entries: &[AuditEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.message.as_str()).collect()
    }

    #[test]
    fn test_single_alarm() {
        let entries = auditor().describe(&StatusDelta::new().with("alarm1", true));
        assert_eq!(messages(&entries), vec!["Alarm 1 activated"]);
    }

    #[test]
    fn test_schema_order_wins_over_payload_order() {
        let forward: StatusDelta =
            serde_json::from_str(r#"{"movement": false, "laser": true}"#).unwrap();
        let reverse: StatusDelta =
            serde_json::from_str(r#"{"laser": true, "movement": false}"#).unwrap();

        let expected = vec!["Laser sensor tripped", "Movement sensor cleared"];
        assert_eq!(messages(&auditor().describe(&forward)), expected);
        assert_eq!(messages(&auditor().describe(&reverse)), expected);
    }

    #[test]
    fn test_one_entry_per_recognized_field() {
        let delta = StatusDelta::new()
            .with("alarm2", false)
            .with("alarm1", true)
            .with("movement", true)
            .with("laser", false)
            .with("uptime", 3600);

        let entries = auditor().describe(&delta);
        assert_eq!(
            messages(&entries),
            vec![
                "Alarm 1 activated",
                "Alarm 2 deactivated",
                "Laser sensor cleared",
                "Movement sensor tripped",
            ]
        );
    }

    #[test]
    fn test_unrecognized_only_yields_nothing() {
        let delta = StatusDelta::new().with("rssi", -71);
        assert!(auditor().describe(&delta).is_empty());
        assert!(auditor().describe(&StatusDelta::new()).is_empty());
    }

    #[test]
    fn test_custom_schema() {
        let schema = FieldSchema::new(vec![
            FieldSpec::switch("siren", "Siren", "sounding", "silenced"),
            FieldSpec::choice("mode", "Arming mode", ["away", "home"]),
        ])
        .unwrap();
        let auditor = ChangeAuditor::new(Arc::new(schema));

        let delta = StatusDelta::new().with("mode", "away").with("siren", true);
        assert_eq!(
            messages(&auditor.describe(&delta)),
            vec!["Siren sounding", "Arming mode set to away"]
        );
    }
}
