//! Wire and storage record types.
//!
//! These structs define three stable formats: the ingest stream
//! (`SignalMessage` / `IngestAck`), the WAL record (`SpoolRecord`), and the
//! event line emitted by sinks (`Event`). Field names are the on-the-wire
//! names; raw byte fields travel as base64 inside JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Transport direction of a captured message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Unknown,
    Uplink,
    Downlink,
}

/// What the payload bytes of a `SignalMessage` contain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadType {
    #[default]
    RawBytes,
    DecodedTree,
}

/// A raw ingest record as delivered by a transport front-end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalMessage {
    /// Capture timestamp, nanoseconds since the epoch.
    pub ts_capture: i64,
    /// Ingest timestamp, nanoseconds since the epoch; stamped by the
    /// server when zero.
    pub ts_ingest: i64,
    pub source_id: String,
    pub direction: Direction,
    pub source_sequence: i64,
    /// Transport-specific metadata as a JSON string (e.g. the pcap frame
    /// number for capture-file sources).
    pub transport_meta: String,
    pub payload_type: PayloadType,
    #[serde(with = "base64_bytes")]
    pub raw_bytes: Vec<u8>,
}

/// WAL envelope around one `SignalMessage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpoolRecord {
    pub partition: i32,
    pub offset: i64,
    /// Append timestamp, nanoseconds since the epoch.
    pub ts_append: i64,
    pub message: SignalMessage,
}

/// Position of a record in the spool, used as event evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoolOffset {
    pub partition: i32,
    pub offset: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_number: Option<i64>,
}

/// Evidence attached to an event: the spool positions it was derived from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evidence {
    pub offsets: Vec<SpoolOffset>,
}

/// An emitted finding. Never mutated after production.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    /// Emission timestamp, nanoseconds since the epoch.
    pub ts: i64,
    pub subscriber_key: String,
    pub attributes: BTreeMap<String, String>,
    pub confidence: f64,
    pub ruleset_id: String,
    pub ruleset_version: String,
    pub evidence: Evidence,
}

/// Per-message acknowledgement on the ingest stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestAck {
    pub message_id: String,
    pub sequence: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spool_offset: Option<SpoolOffset>,
    pub success: bool,
    #[serde(default)]
    pub error_message: String,
}

/// Base64 (de)serialisation for raw byte payloads inside JSON documents.
mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Current wall clock as nanoseconds since the epoch.
pub fn now_nanos() -> i64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| chrono::Utc::now().timestamp_micros().saturating_mul(1000))
}
