//! The interaction record delivered to storage and live listeners.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;

/// An optional synchronous callback fired for interactions recorded by the
/// root-TLD branch of the dispatcher.
pub type OnResult = Arc<dyn Fn(&Interaction) + Send + Sync>;

/// A single captured out-of-band interaction, serialized to JSON before it
/// is handed to the storage sink.
///
/// `unique_id` is the lowercased correlation identifier (or, for root-TLD
/// interactions, the full query name); `full_id` is the label path
/// enclosing it, with original casing, used for display.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub protocol: String,
    #[serde(rename = "unique-id")]
    pub unique_id: String,
    #[serde(rename = "full-id")]
    pub full_id: String,
    #[serde(rename = "q-type")]
    pub q_type: String,
    #[serde(rename = "raw-request")]
    pub raw_request: String,
    #[serde(rename = "raw-response")]
    pub raw_response: String,
    #[serde(rename = "remote-address")]
    pub remote_address: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Interaction {
        Interaction {
            protocol: "dns".to_string(),
            unique_id: "c4ca4238a0b923820dcc".to_string(),
            full_id: "c4ca4238a0b923820dcc".to_string(),
            q_type: "A".to_string(),
            raw_request: ";; QUESTION SECTION:\n;c4ca4238a0b923820dcc.oob.example.\tIN\tA\n".to_string(),
            raw_response: "c4ca4238a0b923820dcc.oob.example. 60 IN A 192.0.2.10".to_string(),
            remote_address: "198.51.100.7".to_string(),
            timestamp: OffsetDateTime::from_unix_timestamp_nanos(1_700_000_000_123_456_789).unwrap(),
        }
    }

    #[test]
    fn json_round_trip_preserves_fields() {
        let interaction = sample();
        let data = serde_json::to_vec(&interaction).unwrap();
        let decoded: Interaction = serde_json::from_slice(&data).unwrap();
        assert_eq!(decoded, interaction);
    }

    #[test]
    fn wire_field_names() {
        let value = serde_json::to_value(sample()).unwrap();
        let object = value.as_object().unwrap();
        for field in [
            "protocol",
            "unique-id",
            "full-id",
            "q-type",
            "raw-request",
            "raw-response",
            "remote-address",
            "timestamp",
        ] {
            assert!(object.contains_key(field), "missing {field}");
        }
    }

    #[test]
    fn timestamp_keeps_nanosecond_precision() {
        let value = serde_json::to_value(sample()).unwrap();
        let ts = value["timestamp"].as_str().unwrap();
        assert!(ts.contains(".123456789"), "unexpected timestamp: {ts}");
    }
}
