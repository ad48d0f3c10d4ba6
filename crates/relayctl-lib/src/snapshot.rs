//! Snapshot document — the JSON form of a board's configuration and state.
//!
//! ```json
//! {
//!   "numberofRelays": 4,
//!   "relays": [ { "name": "Relay 1", "state": 0, "duration": -1, "ud": "" } ],
//!   "rled": { "on": -1, "off": -1, "state": 0 },
//!   "gled": { "on": -1, "off": -1, "state": 0 }
//! }
//! ```
//!
//! Only `numberofRelays` is mandatory. Every other field is optional on
//! input; absent fields leave the board's current value untouched.

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};
use crate::relay::OutputState;

/// Key of the mandatory relay-count field.
pub const RELAY_COUNT_KEY: &str = "numberofRelays";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "numberofRelays")]
    pub number_of_relays: i64,
    #[serde(default)]
    pub relays: Vec<RelayEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rled: Option<IndicatorEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gled: Option<IndicatorEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<OutputState>,
    /// Momentary duration in seconds, `-1` for latched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    /// User tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ud: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorEntry {
    /// Lit phase in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<i32>,
    /// Dark phase in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<OutputState>,
}

impl Snapshot {
    /// Parse a document, checking the mandatory field before anything else.
    pub fn parse(doc: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(doc)?;
        let Some(object) = value.as_object() else {
            return Err(RelayError::Document("expected a JSON object".into()));
        };
        if !object.contains_key(RELAY_COUNT_KEY) {
            return Err(RelayError::MissingField(RELAY_COUNT_KEY));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Number of leading relay entries to apply on a board with `board_relays` channels.
    ///
    /// The smaller of the board size and the declared count; negative counts apply nothing.
    pub fn apply_count(&self, board_relays: usize) -> usize {
        usize::try_from(self.number_of_relays)
            .unwrap_or(0)
            .min(board_relays)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_document() {
        let doc = r#"{
            "numberofRelays": 2,
            "relays": [
                { "name": "Pump", "state": 1, "duration": 5, "ud": "garden" },
                { "name": "Fan", "state": 0, "duration": -1 }
            ],
            "rled": { "on": 500, "off": 250, "state": 1 },
            "gled": { "on": -1, "off": -1, "state": 0 }
        }"#;
        let snap = Snapshot::parse(doc).unwrap();
        assert_eq!(snap.number_of_relays, 2);
        assert_eq!(snap.relays.len(), 2);
        assert_eq!(snap.relays[0].name.as_deref(), Some("Pump"));
        assert_eq!(snap.relays[0].state, Some(OutputState::On));
        assert_eq!(snap.relays[0].duration, Some(5));
        assert_eq!(snap.relays[0].ud.as_deref(), Some("garden"));
        assert_eq!(snap.relays[1].ud, None);
        let rled = snap.rled.unwrap();
        assert_eq!(rled.on, Some(500));
        assert_eq!(rled.off, Some(250));
        assert_eq!(rled.state, Some(OutputState::On));
        assert!(snap.gled.is_some());
    }

    #[test]
    fn missing_relay_count_is_error() {
        let err = Snapshot::parse(r#"{ "relays": [] }"#).unwrap_err();
        assert!(matches!(err, RelayError::MissingField("numberofRelays")));
    }

    #[test]
    fn malformed_json_is_error() {
        let err = Snapshot::parse("{ \"numberofRelays\": ").unwrap_err();
        assert!(matches!(err, RelayError::Document(_)));
    }

    #[test]
    fn non_object_is_error() {
        let err = Snapshot::parse("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, RelayError::Document(_)));
    }

    #[test]
    fn wrong_field_type_is_error() {
        let err = Snapshot::parse(r#"{ "numberofRelays": "four" }"#).unwrap_err();
        assert!(matches!(err, RelayError::Document(_)));
    }

    #[test]
    fn optional_sections_absent() {
        let snap = Snapshot::parse(r#"{ "numberofRelays": 0 }"#).unwrap();
        assert!(snap.relays.is_empty());
        assert!(snap.rled.is_none());
        assert!(snap.gled.is_none());
    }

    #[test]
    fn apply_count_takes_smaller_side() {
        let snap = Snapshot {
            number_of_relays: 8,
            relays: vec![],
            rled: None,
            gled: None,
        };
        assert_eq!(snap.apply_count(4), 4);
        assert_eq!(snap.apply_count(12), 8);

        let negative = Snapshot {
            number_of_relays: -3,
            ..snap
        };
        assert_eq!(negative.apply_count(4), 0);
    }

    #[test]
    fn serialize_omits_absent_sections() {
        let snap = Snapshot {
            number_of_relays: 1,
            relays: vec![RelayEntry {
                name: Some("Relay 1".into()),
                state: Some(OutputState::Off),
                duration: Some(-1),
                ud: Some(String::new()),
            }],
            rled: Some(IndicatorEntry {
                on: Some(-1),
                off: Some(-1),
                state: Some(OutputState::Off),
            }),
            gled: None,
        };
        let json: serde_json::Value = serde_json::from_str(&snap.to_json().unwrap()).unwrap();
        assert_eq!(json["numberofRelays"], 1);
        assert_eq!(json["relays"][0]["state"], 0);
        assert_eq!(json["relays"][0]["duration"], -1);
        assert_eq!(json["rled"]["on"], -1);
        assert!(json.get("gled").is_none());
    }
}
