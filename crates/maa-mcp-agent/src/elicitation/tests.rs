//! Unit tests for elicitation schemas and helpers

use super::helpers::selection_message;
use super::schemas::*;
use schemars::schema_for;

#[test]
fn test_target_selection_serialization() {
    let selection = TargetSelection {
        name: "Pixel 7 (emulator-5554)".to_string(),
    };

    let json = serde_json::to_string(&selection).unwrap();
    let deserialized: TargetSelection = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.name, "Pixel 7 (emulator-5554)");
}

#[test]
fn test_target_selection_schema_requires_name() {
    let schema = serde_json::to_value(schema_for!(TargetSelection)).unwrap();
    assert_eq!(schema["type"], "object");
    assert!(schema["properties"]["name"].is_object());
    assert_eq!(schema["required"], serde_json::json!(["name"]));
}

#[test]
fn test_selection_message_lists_candidates() {
    let message = selection_message(
        "adb_device",
        &["deviceA".to_string(), "deviceB".to_string()],
    );
    assert!(message.contains("adb_device"));
    assert!(message.contains("1. deviceA"));
    assert!(message.contains("2. deviceB"));
}
