//! Ruleset schema and YAML loading.
//!
//! A ruleset file has a single top-level `ruleset` document:
//!
//! ```yaml
//! ruleset:
//!   id: mobility
//!   version: "1.0"
//!   single_message_rules:
//!     - event_name: UE.InitialAttach
//!       msg_type: initialUEMessage
//!       attributes:
//!         category: attach
//!       event_data:
//!         - target: cell
//!           source: message.ecgi
//!   sequence_rules:
//!     - event_name: UE.Handover
//!       first_msg_type: HandoverRequired
//!       second_msg_type: HandoverNotify
//!       time_window_ms: 5000
//!       event_data:
//!         - target: source_cell
//!           source: first_message.ecgi
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::error::{EngineError, Result};

/// One `target: source` extraction into an event attribute.
///
/// `source` is `<origin>.<field>` with origin one of `message`,
/// `first_message`, `context`.
#[derive(Debug, Clone, Deserialize)]
pub struct EventDataExtraction {
    pub target: String,
    pub source: String,
}

/// Fires on every message whose type equals `msg_type`.
#[derive(Debug, Clone, Deserialize)]
pub struct SingleMessageRule {
    pub event_name: String,
    pub msg_type: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub event_data: Vec<EventDataExtraction>,
}

/// Fires when `second_msg_type` follows `first_msg_type` for the same
/// subscriber within `time_window_ms`.
#[derive(Debug, Clone, Deserialize)]
pub struct SequenceRule {
    pub event_name: String,
    pub first_msg_type: String,
    pub second_msg_type: String,
    #[serde(default = "default_time_window_ms")]
    pub time_window_ms: u64,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub event_data: Vec<EventDataExtraction>,
}

fn default_time_window_ms() -> u64 {
    15_000
}

/// A named, versioned collection of rules.
#[derive(Debug, Clone, Deserialize)]
pub struct Ruleset {
    pub id: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub single_message_rules: Vec<SingleMessageRule>,
    #[serde(default)]
    pub sequence_rules: Vec<SequenceRule>,
}

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Deserialize)]
struct RulesetFile {
    ruleset: Ruleset,
}

/// Load a ruleset from a YAML file.
pub fn load_ruleset_from_yaml(path: &Path) -> Result<Ruleset> {
    let file = File::open(path)?;
    let parsed: RulesetFile = serde_yaml::from_reader(file)?;
    let ruleset = parsed.ruleset;
    if ruleset.id.is_empty() {
        return Err(EngineError::InvalidRuleset("empty ruleset id".to_string()));
    }
    info!(
        "loaded ruleset {} v{} ({} single, {} sequence)",
        ruleset.id,
        ruleset.version,
        ruleset.single_message_rules.len(),
        ruleset.sequence_rules.len()
    );
    Ok(ruleset)
}

/// Parse a ruleset from a YAML string.
pub fn parse_ruleset_yaml(yaml: &str) -> Result<Ruleset> {
    let parsed: RulesetFile = serde_yaml::from_str(yaml)?;
    Ok(parsed.ruleset)
}
