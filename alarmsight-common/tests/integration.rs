//! Integration tests for alarmsight-common library.

use alarmsight_common::{
    DeviceTopics, FieldSchema, FieldSpec, Format, LoggingConfig, StatusDelta, StatusSnapshot,
    ZenohConfig, ZenohMode, decode, decode_auto, encode, parse_config,
};
use serde::Deserialize;
use serde_json::json;

#[test]
fn test_status_workflow() {
    // A device report with one recognized flag and one extra field
    let delta = StatusDelta::new()
        .with("alarm1", true)
        .with("firmware", "2.1.0");

    // JSON round trip keeps every field
    let json_bytes = encode(&delta, Format::Json).expect("JSON encode failed");
    let decoded: StatusDelta = decode(&json_bytes, Format::Json).expect("JSON decode failed");
    assert_eq!(decoded, delta);

    // Constrained devices may send CBOR instead
    let cbor_bytes = encode(&delta, Format::Cbor).expect("CBOR encode failed");
    let auto: StatusDelta = decode_auto(&cbor_bytes).expect("Auto decode failed");
    assert_eq!(auto.get("firmware"), Some(&json!("2.1.0")));

    // Only recognized fields produce descriptions
    let schema = FieldSchema::alarm_panel();
    let described: Vec<String> = decoded
        .iter()
        .filter_map(|(key, value)| schema.get(key)?.describe(value))
        .collect();
    assert_eq!(described, vec!["Alarm 1 activated"]);
}

#[test]
fn test_snapshot_wire_shape() {
    let snapshot =
        StatusSnapshot::new(StatusDelta::new().with("laser", false)).sequenced(7);

    let value = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(value["laser"], json!(false));
    assert_eq!(value["sequence"], json!(7));
    assert!(value["timestamp"].is_string());

    let back: StatusSnapshot = serde_json::from_value(value).unwrap();
    assert_eq!(back, snapshot);
}

#[test]
fn test_custom_schema_from_config() {
    #[derive(Debug, Deserialize)]
    struct Device {
        #[serde(default)]
        zenoh: ZenohConfig,
        #[serde(default)]
        topics: DeviceTopics,
        fields: FieldSchema,
        #[serde(default)]
        logging: LoggingConfig,
    }

    let json5 = r#"
    {
        zenoh: { mode: "client", connect: ["tcp/192.168.1.10:7447"] },
        topics: { status: "garage/status", command: "garage/command" },
        fields: [
            { key: "door", label: "Garage door", kind: "switch", on: "opened", off: "closed" },
            { key: "mode", label: "Mode", kind: "choice", values: ["home", "away"] },
        ],
    }
    "#;

    let device: Device = parse_config(json5).expect("Parse failed");
    assert_eq!(device.zenoh.mode, ZenohMode::Client);
    assert!(device.topics.validate().is_ok());
    assert_eq!(device.logging.level, "info");

    let door = device.fields.get("door").unwrap();
    assert_eq!(door.describe(&json!(true)).as_deref(), Some("Garage door opened"));

    let mode = device.fields.get("mode").unwrap();
    assert_eq!(mode.describe(&json!("away")).as_deref(), Some("Mode set to away"));
    assert_eq!(mode.describe(&json!("party")), None);
}

#[test]
fn test_schema_rejects_duplicates() {
    let result = FieldSchema::new(vec![
        FieldSpec::switch("alarm1", "Alarm 1", "on", "off"),
        FieldSpec::switch("alarm1", "Alarm one", "on", "off"),
    ]);
    assert!(result.is_err());
}

#[test]
fn test_topics_with_prefix_validate() {
    let topics = DeviceTopics::with_prefix("site/warehouse");
    assert!(topics.validate().is_ok());
    assert_ne!(topics.status, topics.command);
}
