use crate::err::SerializationResult;
use crate::evt_record::EventRecord;

use serde_json::{Map, Value, json};
use std::fmt::Write;

/// Upper-case hex, the way the event viewer shows binary event data.
pub(crate) fn hex_string(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        // Writing to a `String` cannot fail.
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

/// Builds the JSON representation of a record.
///
/// The layout mirrors the XML output: an `Event` object holding `System` metadata and
/// `EventData` (the strings and the opaque data blob).
pub fn record_to_json_value(record: &EventRecord) -> SerializationResult<Value> {
    let user_sid = record.user_sid()?.map(|sid| sid.to_string());

    let mut system = Map::new();
    system.insert("Provider".to_owned(), json!({ "Name": record.source_name()? }));
    system.insert(
        "EventID".to_owned(),
        json!({
            "Qualifiers": record.event_identifier.qualifiers(),
            "Value": record.event_identifier.code(),
        }),
    );
    system.insert(
        "Severity".to_owned(),
        json!(format!("{:?}", record.event_identifier.severity())),
    );
    system.insert("Level".to_owned(), json!(record.event_type.to_string()));
    system.insert("Task".to_owned(), json!(record.event_category));
    system.insert(
        "TimeCreated".to_owned(),
        json!({ "SystemTime": record.creation_timestamp()?.to_string() }),
    );
    system.insert(
        "TimeWritten".to_owned(),
        json!({ "SystemTime": record.written_timestamp()?.to_string() }),
    );
    system.insert("EventRecordID".to_owned(), json!(record.record_number));
    system.insert("Computer".to_owned(), json!(record.computer_name()?));
    system.insert("Security".to_owned(), json!({ "UserID": user_sid }));

    let strings = match record.strings() {
        Some(strings) => strings.iter().collect::<Result<Vec<String>, _>>()?,
        None => Vec::new(),
    };

    let mut event_data = Map::new();
    event_data.insert("Data".to_owned(), json!(strings));
    if !record.data().is_empty() {
        event_data.insert("Binary".to_owned(), json!(hex_string(record.data())));
    }

    Ok(json!({
        "Event": {
            "System": Value::Object(system),
            "EventData": Value::Object(event_data),
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evt_parser::ParserSettings;
    use crate::evt_record::tests::EVENT_RECORD;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_to_json() {
        let record = EventRecord::from_bytes(&EVENT_RECORD).unwrap();
        let value = record_to_json_value(&record).unwrap();

        assert_eq!(
            value,
            json!({
                "Event": {
                    "System": {
                        "Provider": { "Name": "LoadPerf" },
                        "EventID": { "Qualifiers": 16384, "Value": 1000 },
                        "Severity": "Informational",
                        "Level": "Information",
                        "Task": 0,
                        "TimeCreated": { "SystemTime": "2010-11-11T01:10:17Z" },
                        "TimeWritten": { "SystemTime": "2010-11-11T01:10:17Z" },
                        "EventRecordID": 1,
                        "Computer": "WKS-WINXP32BIT",
                        "Security": { "UserID": null },
                    },
                    "EventData": {
                        "Data": ["RSVP", "QoS RSVP"],
                        "Binary": "0C140000",
                    }
                }
            })
        );
    }

    #[test]
    fn test_json_keeps_field_order() {
        let record = EventRecord::from_bytes(&EVENT_RECORD).unwrap();
        let json = record
            .to_json(&ParserSettings::new().indent(false))
            .unwrap();

        assert!(json.starts_with(r#"{"Event":{"System":{"Provider":{"Name":"LoadPerf"}"#));
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_hex_string() {
        assert_eq!(hex_string(&[]), "");
        assert_eq!(hex_string(&[0x0c, 0x14, 0xab]), "0C14AB");
    }
}
