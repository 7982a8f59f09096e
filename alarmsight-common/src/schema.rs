//! Declared field schema for the alarm controller.
//!
//! The schema lists the status fields the bridge understands, in the order
//! audit entries are produced. Anything outside the schema is carried through
//! to persistence but never audited.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// How a field's value is interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldKind {
    /// Boolean flag, described with one verb per state.
    Switch {
        #[serde(default = "default_on")]
        on: String,
        #[serde(default = "default_off")]
        off: String,
    },
    /// String value restricted to a fixed set.
    Choice { values: Vec<String> },
}

fn default_on() -> String {
    "activated".to_string()
}

fn default_off() -> String {
    "deactivated".to_string()
}

/// One recognized status field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Key used on the wire (e.g. "alarm1").
    pub key: String,

    /// Human name used in audit text (e.g. "Alarm 1").
    pub label: String,

    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldSpec {
    /// A boolean field.
    pub fn switch(
        key: impl Into<String>,
        label: impl Into<String>,
        on: impl Into<String>,
        off: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind: FieldKind::Switch {
                on: on.into(),
                off: off.into(),
            },
        }
    }

    /// An enumerated field.
    pub fn choice<I, S>(key: impl Into<String>, label: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            label: label.into(),
            kind: FieldKind::Choice {
                values: values.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// Whether `value` is acceptable for this field.
    pub fn accepts(&self, value: &Value) -> bool {
        match (&self.kind, value) {
            (FieldKind::Switch { .. }, Value::Bool(_)) => true,
            (FieldKind::Choice { values }, Value::String(s)) => values.iter().any(|v| v == s),
            _ => false,
        }
    }

    /// What this field expects, for error messages.
    pub fn expected(&self) -> String {
        match &self.kind {
            FieldKind::Switch { .. } => "a boolean".to_string(),
            FieldKind::Choice { values } => format!("one of {}", values.join(", ")),
        }
    }

    /// Natural-language description of the field taking `value`.
    ///
    /// Returns `None` when the value is not acceptable for this field.
    pub fn describe(&self, value: &Value) -> Option<String> {
        match (&self.kind, value) {
            (FieldKind::Switch { on, off }, Value::Bool(state)) => {
                let verb = if *state { on } else { off };
                Some(format!("{} {}", self.label, verb))
            }
            (FieldKind::Choice { .. }, Value::String(s)) if self.accepts(value) => {
                Some(format!("{} set to {}", self.label, s))
            }
            _ => None,
        }
    }
}

/// Ordered, validated set of recognized fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldSchema {
    fields: Vec<FieldSpec>,
}

impl FieldSchema {
    /// Build a schema, checking keys are non-empty and unique.
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self> {
        for (i, field) in fields.iter().enumerate() {
            if field.key.trim().is_empty() {
                return Err(Error::Schema(format!("field #{} has an empty key", i + 1)));
            }
            if field.label.trim().is_empty() {
                return Err(Error::Schema(format!("field '{}' has an empty label", field.key)));
            }
            if fields[..i].iter().any(|f| f.key == field.key) {
                return Err(Error::Schema(format!("duplicate field '{}'", field.key)));
            }
            if let FieldKind::Choice { values } = &field.kind {
                if values.is_empty() {
                    return Err(Error::Schema(format!(
                        "choice field '{}' lists no values",
                        field.key
                    )));
                }
            }
        }
        Ok(Self { fields })
    }

    /// The stock alarm panel: two alarms plus laser and movement sensors.
    pub fn alarm_panel() -> Self {
        Self {
            fields: vec![
                FieldSpec::switch("alarm1", "Alarm 1", "activated", "deactivated"),
                FieldSpec::switch("alarm2", "Alarm 2", "activated", "deactivated"),
                FieldSpec::switch("laser", "Laser sensor", "tripped", "cleared"),
                FieldSpec::switch("movement", "Movement sensor", "tripped", "cleared"),
            ],
        }
    }

    /// Look up a field by wire key.
    pub fn get(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Fields in declared order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::alarm_panel()
    }
}

impl<'de> Deserialize<'de> for FieldSchema {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let fields = Vec::<FieldSpec>::deserialize(deserializer)?;
        FieldSchema::new(fields).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_alarm_panel_order() {
        let schema = FieldSchema::alarm_panel();
        let keys: Vec<&str> = schema.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["alarm1", "alarm2", "laser", "movement"]);
    }

    #[test]
    fn test_switch_description() {
        let schema = FieldSchema::alarm_panel();
        let alarm = schema.get("alarm1").unwrap();

        assert_eq!(
            alarm.describe(&json!(true)).as_deref(),
            Some("Alarm 1 activated")
        );
        assert_eq!(
            alarm.describe(&json!(false)).as_deref(),
            Some("Alarm 1 deactivated")
        );
        assert_eq!(alarm.describe(&json!("on")), None);
    }

    #[test]
    fn test_choice_field() {
        let mode = FieldSpec::choice("mode", "Arming mode", ["away", "home", "off"]);

        assert!(mode.accepts(&json!("home")));
        assert!(!mode.accepts(&json!("vacation")));
        assert!(!mode.accepts(&json!(true)));
        assert_eq!(
            mode.describe(&json!("away")).as_deref(),
            Some("Arming mode set to away")
        );
        assert_eq!(mode.expected(), "one of away, home, off");
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let result = FieldSchema::new(vec![
            FieldSpec::switch("alarm1", "Alarm 1", "on", "off"),
            FieldSpec::switch("alarm1", "Alarm one", "on", "off"),
        ]);
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_empty_choice_rejected() {
        let result = FieldSchema::new(vec![FieldSpec::choice(
            "mode",
            "Mode",
            Vec::<String>::new(),
        )]);
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_deserialize_with_default_verbs() {
        let schema: FieldSchema = json5::from_str(
            r#"[
                { key: "siren", label: "Siren", kind: "switch" },
                { key: "mode", label: "Mode", kind: "choice", values: ["away", "home"] },
            ]"#,
        )
        .unwrap();

        assert_eq!(schema.len(), 2);
        assert_eq!(
            schema.get("siren").unwrap().describe(&json!(true)).as_deref(),
            Some("Siren activated")
        );
    }

    #[test]
    fn test_deserialize_rejects_invalid_schema() {
        let result: std::result::Result<FieldSchema, _> =
            json5::from_str(r#"[{ key: "", label: "Nameless", kind: "switch" }]"#);
        assert!(result.is_err());
    }
}
