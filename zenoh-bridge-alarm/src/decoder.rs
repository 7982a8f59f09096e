//! Telemetry decoder: raw bus payload to typed status delta.

use std::sync::Arc;

use alarmsight_common::{Error as CommonError, FieldSchema, RESERVED_KEYS, StatusDelta, decode_auto};
use serde_json::Value;

use crate::error::DecodeError;

/// Parses device payloads and validates the fields the schema recognizes.
#[derive(Debug, Clone)]
pub struct TelemetryDecoder {
    schema: Arc<FieldSchema>,
}

impl TelemetryDecoder {
    pub fn new(schema: Arc<FieldSchema>) -> Self {
        Self { schema }
    }

    /// Decode a JSON or CBOR payload into the delta it carries.
    ///
    /// Only the fields present in the payload end up in the delta.
    /// Unrecognized fields are passed through unchecked.
    pub fn decode(&self, payload: &[u8]) -> Result<StatusDelta, DecodeError> {
        let value: Value = decode_auto(payload).map_err(|e| match e {
            CommonError::EmptyPayload => DecodeError::Malformed("empty payload".to_string()),
            other => DecodeError::Malformed(other.to_string()),
        })?;

        self.decode_value(value)
    }

    /// Validate an already parsed value.
    pub fn decode_value(&self, value: Value) -> Result<StatusDelta, DecodeError> {
        let Value::Object(map) = value else {
            return Err(DecodeError::NotAnObject);
        };

        if let Some(key) = RESERVED_KEYS.iter().find(|k| map.contains_key(**k)) {
            return Err(DecodeError::ReservedField((*key).to_string()));
        }

        for (key, value) in &map {
            if let Some(field) = self.schema.get(key) {
                if !field.accepts(value) {
                    return Err(DecodeError::InvalidField {
                        field: key.clone(),
                        expected: field.expected(),
                        found: value.to_string(),
                    });
                }
            }
        }

        Ok(StatusDelta::from(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alarmsight_common::{FieldSpec, Format, encode};
    use serde_json::json;

    fn decoder() -> TelemetryDecoder {
        TelemetryDecoder::new(Arc::new(FieldSchema::alarm_panel()))
    }

    #[test]
    fn test_decode_partial_status() {
        let delta = decoder().decode(br#"{"alarm1": true}"#).unwrap();
        assert_eq!(delta.len(), 1);
        assert_eq!(delta.get("alarm1"), Some(&json!(true)));
    }

    #[test]
    fn test_unknown_fields_pass_through() {
        let delta = decoder()
            .decode(br#"{"laser": false, "battery": 87, "zone": {"id": 3}}"#)
            .unwrap();
        assert_eq!(delta.len(), 3);
        assert_eq!(delta.get("battery"), Some(&json!(87)));
    }

    #[test]
    fn test_malformed_payload() {
        assert!(matches!(
            decoder().decode(b"{alarm1: true"),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            decoder().decode(b""),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_non_object_payload() {
        assert_eq!(decoder().decode(b"[true, false]"), Err(DecodeError::NotAnObject));
        assert_eq!(
            decoder().decode_value(json!("alarm1")),
            Err(DecodeError::NotAnObject)
        );
    }

    #[test]
    fn test_wrong_type_for_recognized_field() {
        let err = decoder().decode(br#"{"alarm2": "yes"}"#).unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidField {
                field: "alarm2".to_string(),
                expected: "a boolean".to_string(),
                found: "\"yes\"".to_string(),
            }
        );
    }

    #[test]
    fn test_reserved_field_rejected() {
        assert_eq!(
            decoder().decode(br#"{"alarm1": true, "timestamp": 0}"#),
            Err(DecodeError::ReservedField("timestamp".to_string()))
        );
    }

    #[test]
    fn test_cbor_payload() {
        let payload = encode(&json!({"movement": true}), Format::Cbor).unwrap();
        let delta = decoder().decode(&payload).unwrap();
        assert_eq!(delta.get("movement"), Some(&json!(true)));
    }

    #[test]
    fn test_choice_field_validation() {
        let schema = FieldSchema::new(vec![FieldSpec::choice(
            "mode",
            "Arming mode",
            ["away", "home"],
        )])
        .unwrap();
        let decoder = TelemetryDecoder::new(Arc::new(schema));

        assert!(decoder.decode(br#"{"mode": "away"}"#).is_ok());
        assert!(matches!(
            decoder.decode(br#"{"mode": "party"}"#),
            Err(DecodeError::InvalidField { .. })
        ));
    }
}
