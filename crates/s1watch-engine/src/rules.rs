//! Rule evaluation over the correlated message stream.
//!
//! The engine owns the sequence-state table (keyed by subscriber key) and
//! holds a shared handle to the correlator for subscriber resolution and
//! `context.*` event-data extraction. The pipeline driver thread is the
//! only caller, so the state table needs no lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;

use s1watch_wire::canonical::CanonicalMessage;
use s1watch_wire::hex::to_hex;

use crate::correlator::Correlator;
use crate::model::{Event, Evidence, SpoolOffset, now_nanos};
use crate::ruleset::{EventDataExtraction, Ruleset, SequenceRule, SingleMessageRule};

/// Hard ceiling on the age of an open sequence, regardless of any rule's
/// window.
const MAX_SEQUENCE_AGE: Duration = Duration::from_secs(60);

/// One open two-message sequence awaiting its second message.
#[derive(Debug, Clone)]
pub struct SequenceState {
    pub subscriber_key: String,
    pub first_msg_type: String,
    pub first_message: CanonicalMessage,
    pub first_seen: Instant,
    pub ruleset_id: String,
    pub ruleset_version: String,
}

/// Evaluates loaded rulesets against canonical messages.
pub struct RuleEngine {
    correlator: Arc<Correlator>,
    rulesets: Vec<Ruleset>,
    sequence_states: HashMap<String, Vec<SequenceState>>,
}

impl RuleEngine {
    pub fn new(correlator: Arc<Correlator>) -> Self {
        RuleEngine {
            correlator,
            rulesets: Vec::new(),
            sequence_states: HashMap::new(),
        }
    }

    pub fn load_ruleset(&mut self, ruleset: Ruleset) {
        self.rulesets.push(ruleset);
    }

    pub fn ruleset_count(&self) -> usize {
        self.rulesets.len()
    }

    /// Number of open sequence states, for monitoring and tests.
    pub fn open_sequence_count(&self) -> usize {
        self.sequence_states.values().map(Vec::len).sum()
    }

    /// Evaluate one message against every loaded ruleset.
    ///
    /// Within the result, single-message events precede sequence events and
    /// rule-declaration order is preserved. With no identifiable UE the
    /// subscriber key is empty: single-message rules still fire (carrying
    /// the empty key), sequence rules are skipped.
    pub fn process(&mut self, message: &CanonicalMessage) -> Vec<Event> {
        let subscriber_key = self.correlator.get_or_create_context(message);
        let mut events = Vec::new();

        for ruleset_index in 0..self.rulesets.len() {
            let ruleset = self.rulesets[ruleset_index].clone();
            for rule in &ruleset.single_message_rules {
                if message.msg_type == rule.msg_type {
                    events.push(self.single_message_event(rule, &ruleset, message, &subscriber_key));
                }
            }
            if !subscriber_key.is_empty() {
                self.check_sequence_rules(&ruleset, message, &subscriber_key, &mut events);
            }
        }

        events
    }

    fn single_message_event(
        &self,
        rule: &SingleMessageRule,
        ruleset: &Ruleset,
        message: &CanonicalMessage,
        subscriber_key: &str,
    ) -> Event {
        let mut event =
            self.base_event(&rule.event_name, &rule.attributes, ruleset, message, subscriber_key);
        event.evidence.offsets.push(offset_of(message));
        for extraction in &rule.event_data {
            self.apply_extraction(&mut event, extraction, message, None, subscriber_key);
        }
        event
    }

    fn check_sequence_rules(
        &mut self,
        ruleset: &Ruleset,
        message: &CanonicalMessage,
        subscriber_key: &str,
        events: &mut Vec<Event>,
    ) {
        self.cleanup_expired_sequences();

        for rule in &ruleset.sequence_rules {
            if message.msg_type == rule.first_msg_type {
                debug!(
                    "rules: opening sequence {} for {subscriber_key}",
                    rule.event_name
                );
                self.sequence_states
                    .entry(subscriber_key.to_string())
                    .or_default()
                    .push(SequenceState {
                        subscriber_key: subscriber_key.to_string(),
                        first_msg_type: rule.first_msg_type.clone(),
                        first_message: message.clone(),
                        first_seen: Instant::now(),
                        ruleset_id: ruleset.id.clone(),
                        ruleset_version: ruleset.version.clone(),
                    });
            } else if message.msg_type == rule.second_msg_type {
                let window = Duration::from_millis(rule.time_window_ms);
                let mut fired = Vec::new();

                if let Some(states) = self.sequence_states.get_mut(subscriber_key) {
                    let mut index = 0;
                    while index < states.len() {
                        let state = &states[index];
                        if state.first_msg_type == rule.first_msg_type
                            && state.first_seen.elapsed() <= window
                        {
                            fired.push(states.remove(index));
                        } else {
                            // Stale states stay for the background sweep.
                            index += 1;
                        }
                    }
                }

                for state in fired {
                    events.push(self.sequence_event(rule, ruleset, message, &state, subscriber_key));
                }
            }
        }
    }

    fn sequence_event(
        &self,
        rule: &SequenceRule,
        ruleset: &Ruleset,
        message: &CanonicalMessage,
        state: &SequenceState,
        subscriber_key: &str,
    ) -> Event {
        let mut event =
            self.base_event(&rule.event_name, &rule.attributes, ruleset, message, subscriber_key);
        event.evidence.offsets.push(offset_of(&state.first_message));
        event.evidence.offsets.push(offset_of(message));
        for extraction in &rule.event_data {
            self.apply_extraction(
                &mut event,
                extraction,
                message,
                Some(&state.first_message),
                subscriber_key,
            );
        }
        event
    }

    fn base_event(
        &self,
        name: &str,
        static_attributes: &std::collections::BTreeMap<String, String>,
        ruleset: &Ruleset,
        message: &CanonicalMessage,
        subscriber_key: &str,
    ) -> Event {
        let mut event = Event {
            name: name.to_string(),
            ts: now_nanos(),
            subscriber_key: subscriber_key.to_string(),
            attributes: static_attributes.clone(),
            confidence: 1.0,
            ruleset_id: ruleset.id.clone(),
            ruleset_version: ruleset.version.clone(),
            evidence: Evidence::default(),
        };

        event
            .attributes
            .insert("msg_type".to_string(), message.msg_type.clone());
        if !message.ecgi.is_empty() {
            event
                .attributes
                .insert("ecgi".to_string(), to_hex(&message.ecgi));
        }
        event
    }

    /// Resolve a `<source>.<field>` expression and store the value under
    /// the extraction's target attribute. Empty resolutions are dropped.
    fn apply_extraction(
        &self,
        event: &mut Event,
        extraction: &EventDataExtraction,
        message: &CanonicalMessage,
        first_message: Option<&CanonicalMessage>,
        subscriber_key: &str,
    ) {
        let Some((source, field)) = extraction.source.split_once('.') else {
            debug!("rules: malformed event_data source '{}'", extraction.source);
            return;
        };

        let value = match source {
            "message" => message_field(message, field),
            "first_message" => first_message.and_then(|m| message_field(m, field)),
            "context" => self
                .correlator
                .get_context(subscriber_key)
                .and_then(|context| match field {
                    "ecgi" => non_empty_hex(&context.ecgi),
                    "target_ecgi" => non_empty_hex(&context.target_ecgi),
                    "source_ecgi" => non_empty_hex(&context.source_ecgi),
                    "imsi" => context.imsi.clone(),
                    "tmsi" => context.tmsi.clone(),
                    "mme_ue_s1ap_id" => context.mme_ue_s1ap_id.map(|v| v.to_string()),
                    "enb_ue_s1ap_id" => context.enb_ue_s1ap_id.map(|v| v.to_string()),
                    "msg_type" => (!context.last_procedure.is_empty())
                        .then(|| context.last_procedure.clone()),
                    _ => None,
                }),
            _ => None,
        };

        if let Some(value) = value {
            event.attributes.insert(extraction.target.clone(), value);
        }
    }

    /// Drop sequence states older than the 60 s ceiling.
    pub fn cleanup_expired_sequences(&mut self) {
        self.sequence_states.retain(|_, states| {
            states.retain(|state| state.first_seen.elapsed() <= MAX_SEQUENCE_AGE);
            !states.is_empty()
        });
    }
}

fn offset_of(message: &CanonicalMessage) -> SpoolOffset {
    SpoolOffset {
        partition: message.spool_partition,
        offset: message.spool_offset,
        frame_number: message.frame_number,
    }
}

fn non_empty_hex(bytes: &[u8]) -> Option<String> {
    (!bytes.is_empty()).then(|| to_hex(bytes))
}

fn message_field(message: &CanonicalMessage, field: &str) -> Option<String> {
    match field {
        "ecgi" => non_empty_hex(&message.ecgi),
        "target_ecgi" => non_empty_hex(&message.target_ecgi),
        "mme_ue_s1ap_id" => message.mme_ue_s1ap_id.map(|v| v.to_string()),
        "enb_ue_s1ap_id" => message.enb_ue_s1ap_id.map(|v| v.to_string()),
        "imsi" => message.imsi.clone(),
        "tmsi" => message.tmsi.clone(),
        "msg_type" => (!message.msg_type.is_empty()).then(|| message.msg_type.clone()),
        _ => None,
    }
}
