//! Correlation facade: canonical messages in, subscriber keys out.
//!
//! Owns the subscriber table and the UE-context table behind a single
//! reader-writer lock. Dispatching a message takes the write side for the
//! whole operation, so the locate-or-create, identifier merges, and
//! association conflicts for one message are atomic; lookups and dumps take
//! the read side.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::sync::RwLock;
use std::time::Duration;

use log::debug;
use serde_json::Value;

use s1watch_wire::canonical::CanonicalMessage;
use s1watch_wire::hex::to_hex;
use s1watch_wire::s1ap;

use crate::subscriber::{
    FrameView, IdentifierHints, SubscriberRecord, SubscriberTable, normalize_imeisv,
    normalize_imsi, normalize_tmsi,
};
use crate::ue_context::{UeContext, key_rank};

/// Correlator tuning.
#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    /// Inactivity window after which a UE context is swept.
    pub context_expiry: Duration,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        CorrelatorConfig {
            context_expiry: Duration::from_secs(300),
        }
    }
}

#[derive(Default)]
struct CorrelatorState {
    subscribers: SubscriberTable,
    contexts: HashMap<String, UeContext>,
    next_unknown_id: u64,
}

/// The UE correlator.
pub struct Correlator {
    config: CorrelatorConfig,
    state: RwLock<CorrelatorState>,
}

/// Recover the IE map from a canonical message's decoded tree.
fn ies_from_decoded_tree(decoded_tree: &str) -> BTreeMap<String, String> {
    let mut ies = BTreeMap::new();
    if decoded_tree.is_empty() {
        return ies;
    }
    let Ok(tree) = serde_json::from_str::<Value>(decoded_tree) else {
        return ies;
    };
    if let Some(map) = tree.get("information_elements").and_then(Value::as_object) {
        for (name, value) in map {
            if let Some(hex) = value.as_str() {
                ies.insert(name.clone(), hex.to_string());
            }
        }
    }
    ies
}

impl Correlator {
    pub fn new(config: CorrelatorConfig) -> Self {
        Correlator {
            config,
            state: RwLock::new(CorrelatorState {
                subscribers: SubscriberTable::new(),
                ..CorrelatorState::default()
            }),
        }
    }

    /// Dispatch one canonical message: correlate it to a subscriber record,
    /// update or create the UE context, and return the subscriber key.
    ///
    /// Returns an empty string when the message carries no identifier at
    /// all, or when a UEContextReleaseComplete matches no known subscriber.
    pub fn get_or_create_context(&self, msg: &CanonicalMessage) -> String {
        let mut state = self.state.write().expect("correlator lock poisoned");
        let now_secs = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        let release = msg.msg_type == "UEContextReleaseComplete";

        // Run the frame through the subscriber table first; real decoded
        // messages carry their IE map in the decoded tree.
        let ies = ies_from_decoded_tree(&msg.decoded_tree);
        let from_frame = if msg.decode_failed {
            None
        } else {
            state.subscribers.dispatch_frame(&FrameView {
                procedure_code: msg.procedure_code,
                release_complete: release,
                information_elements: &ies,
                raw_bytes: &msg.raw_bytes,
                timestamp: now_secs,
            })
        };

        // Identifiers offered by this message: IE map first, message
        // fields as fallback.
        let (ie_mme, ie_enb) = s1ap_ids_from_ies_or_fields(&ies, msg);
        let mut imsi = msg.imsi.as_deref().map(normalize_imsi).filter(|v| !v.is_empty());
        let mut tmsi = msg.tmsi.as_deref().map(normalize_tmsi).filter(|v| !v.is_empty());
        let mut imeisv = msg.imei.as_deref().map(normalize_imeisv).filter(|v| !v.is_empty());
        let mut mme_ue_s1ap_id = ie_mme;
        let mut enb_ue_s1ap_id = ie_enb;

        // An existing context matching any identifier contributes the
        // identifiers this message lacks.
        let existing_key = find_context_key(
            &state.contexts,
            imsi.as_deref(),
            tmsi.as_deref(),
            imeisv.as_deref(),
            mme_ue_s1ap_id,
            enb_ue_s1ap_id,
        );
        if let Some(key) = &existing_key {
            let context = &state.contexts[key];
            if imsi.is_none() {
                imsi = context.imsi.clone();
            }
            if tmsi.is_none() {
                tmsi = context.tmsi.clone();
            }
            if imeisv.is_none() {
                imeisv = context.imei.clone();
            }
            if mme_ue_s1ap_id.is_none() {
                mme_ue_s1ap_id = context.mme_ue_s1ap_id;
            }
            if enb_ue_s1ap_id.is_none() {
                enb_ue_s1ap_id = context.enb_ue_s1ap_id;
            }
        }

        let has_any_identifier = imsi.is_some()
            || tmsi.is_some()
            || imeisv.is_some()
            || mme_ue_s1ap_id.is_some()
            || enb_ue_s1ap_id.is_some();
        if !has_any_identifier {
            return String::new();
        }

        // Resolve the subscriber record. A release never creates one.
        let subscriber_id = from_frame.or_else(|| {
            if release {
                imsi.as_deref()
                    .and_then(|v| state.subscribers.id_by_imsi(v))
                    .or_else(|| tmsi.as_deref().and_then(|v| state.subscribers.id_by_tmsi(v)))
                    .or_else(|| mme_ue_s1ap_id.and_then(|v| state.subscribers.id_by_mme_ue_s1ap_id(v)))
                    .or_else(|| enb_ue_s1ap_id.and_then(|v| state.subscribers.id_by_enb_ue_s1ap_id(v)))
                    .or_else(|| imeisv.as_deref().and_then(|v| state.subscribers.id_by_imeisv(v)))
            } else {
                Some(state.subscribers.get_or_create(&IdentifierHints {
                    imsi: imsi.clone(),
                    tmsi: tmsi.clone(),
                    imeisv: imeisv.clone(),
                    mme_ue_s1ap_id,
                    enb_ue_s1ap_id,
                    teid: None,
                }))
            }
        });

        let Some(subscriber_id) = subscriber_id else {
            return String::new();
        };

        // Update or create the UE context and settle its key.
        let mut context = match &existing_key {
            Some(key) => state.contexts.remove(key).unwrap_or_default(),
            None => {
                if release {
                    // No context to release into; nothing to track.
                    return String::new();
                }
                UeContext::default()
            }
        };

        let record = state.subscribers.get(subscriber_id).cloned();
        context.update(msg, record.as_ref());

        if release {
            if let Some(id) = context.mme_ue_s1ap_id.take() {
                state.subscribers.remove_mme_ue_s1ap_id(id);
            }
            if let Some(id) = context.enb_ue_s1ap_id.take() {
                state.subscribers.remove_enb_ue_s1ap_id(id);
            }
        }

        let mut candidate = context.generate_subscriber_key();
        if candidate == "unknown" {
            candidate = match &existing_key {
                Some(key) => key.clone(),
                None => {
                    state.next_unknown_id += 1;
                    format!("unknown_{}", state.next_unknown_id)
                }
            };
        }

        // Migration is upgrade-only along IMSI > TMSI > MME > eNB.
        let final_key = match &existing_key {
            Some(old) if key_rank(&candidate) <= key_rank(old) => old.clone(),
            Some(old) => {
                debug!("correlator: context migrated {old} -> {candidate}");
                candidate
            }
            None => candidate,
        };

        context.subscriber_key = final_key.clone();
        state.contexts.insert(final_key.clone(), context);
        final_key
    }

    /// Look up a UE context by subscriber key.
    pub fn get_context(&self, subscriber_key: &str) -> Option<UeContext> {
        let state = self.state.read().expect("correlator lock poisoned");
        state.contexts.get(subscriber_key).cloned()
    }

    /// Sweep contexts idle past the configured inactivity window.
    pub fn cleanup_expired(&self) {
        let mut state = self.state.write().expect("correlator lock poisoned");
        let expiry = self.config.context_expiry;
        let before = state.contexts.len();
        state.contexts.retain(|_, context| !context.is_expired(expiry));
        let swept = before - state.contexts.len();
        if swept > 0 {
            debug!("correlator: swept {swept} expired context(s)");
        }
    }

    pub fn context_count(&self) -> usize {
        self.state.read().expect("correlator lock poisoned").contexts.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.read().expect("correlator lock poisoned").subscribers.len()
    }

    /// Snapshot of a subscriber record located by IMSI.
    pub fn subscriber_by_imsi(&self, imsi: &str) -> Option<SubscriberRecord> {
        let state = self.state.read().expect("correlator lock poisoned");
        let id = state.subscribers.id_by_imsi(imsi)?;
        state.subscribers.get(id).cloned()
    }

    /// Snapshot of a subscriber record located by either S1AP id index.
    pub fn subscriber_by_s1ap_ids(
        &self,
        mme_ue_s1ap_id: Option<u32>,
        enb_ue_s1ap_id: Option<u32>,
    ) -> Option<SubscriberRecord> {
        let state = self.state.read().expect("correlator lock poisoned");
        let id = mme_ue_s1ap_id
            .and_then(|v| state.subscribers.id_by_mme_ue_s1ap_id(v))
            .or_else(|| enb_ue_s1ap_id.and_then(|v| state.subscribers.id_by_enb_ue_s1ap_id(v)))?;
        state.subscribers.get(id).cloned()
    }

    /// Human-readable dump of all UE contexts and subscriber records.
    pub fn dump_ue_records(&self, out: &mut impl Write) -> std::io::Result<()> {
        let state = self.state.read().expect("correlator lock poisoned");

        writeln!(out, "\n=== UE Records ===")?;
        writeln!(out, "Contexts: {}", state.contexts.len())?;
        for (key, context) in &state.contexts {
            writeln!(out, "\nSubscriber Key: {key}")?;
            if let Some(imsi) = &context.imsi {
                writeln!(out, "  IMSI: {imsi}")?;
            }
            if let Some(guti) = &context.guti {
                writeln!(out, "  GUTI: {guti}")?;
            }
            if let Some(tmsi) = &context.tmsi {
                writeln!(out, "  TMSI: {tmsi}")?;
            }
            if let Some(imei) = &context.imei {
                writeln!(out, "  IMEI: {imei}")?;
            }
            if let Some(id) = context.mme_ue_s1ap_id {
                writeln!(out, "  MME-UE-S1AP-ID: {id}")?;
            }
            if let Some(id) = context.enb_ue_s1ap_id {
                writeln!(out, "  eNB-UE-S1AP-ID: {id}")?;
            }
            if let Some(mme_id) = &context.mme_id {
                writeln!(out, "  MME ID: {mme_id}")?;
            }
            if let Some(enb_id) = &context.enb_id {
                writeln!(out, "  eNB ID: {enb_id}")?;
            }
            if !context.ecgi.is_empty() {
                writeln!(out, "  ECGI: {}", to_hex(&context.ecgi))?;
            }
            if !context.source_ecgi.is_empty() {
                writeln!(out, "  Source ECGI: {}", to_hex(&context.source_ecgi))?;
            }
            if !context.target_ecgi.is_empty() {
                writeln!(out, "  Target ECGI: {}", to_hex(&context.target_ecgi))?;
            }
            if !context.last_procedure.is_empty() {
                writeln!(out, "  Last Procedure: {}", context.last_procedure)?;
            }
            writeln!(out, "  Last Seen: {}s ago", context.last_seen.elapsed().as_secs())?;
            if context.handover_in_progress {
                writeln!(out, "  Handover In Progress: true")?;
            }
        }

        writeln!(out, "\n=== Subscriber Records ===")?;
        writeln!(out, "Subscribers: {}", state.subscribers.len())?;
        for (id, record) in state.subscribers.iter() {
            writeln!(out, "\nSubscriber ID: {id}")?;
            if let Some(imsi) = &record.imsi {
                writeln!(out, "  IMSI: {imsi}")?;
            }
            if let Some(tmsi) = &record.tmsi {
                writeln!(out, "  TMSI: {tmsi}")?;
            }
            if let Some(imeisv) = &record.imeisv {
                writeln!(out, "  IMEISV: {imeisv}")?;
            }
            if let Some(mme) = record.mme_ue_s1ap_id {
                writeln!(out, "  MME-UE-S1AP-ID: {mme}")?;
            }
            if let Some(enb) = record.enb_ue_s1ap_id {
                writeln!(out, "  eNB-UE-S1AP-ID: {enb}")?;
            }
            if !record.teids.is_empty() {
                let teids: Vec<String> =
                    record.teids.iter().map(|t| format!("{t:#x}")).collect();
                writeln!(out, "  TEIDs: {}", teids.join(", "))?;
            }
            if let Some(ts) = record.first_seen_timestamp {
                writeln!(out, "  First Seen: {}", format_epoch_secs(ts))?;
            }
            if let Some(ts) = record.last_seen_timestamp {
                writeln!(out, "  Last Seen: {}", format_epoch_secs(ts))?;
            }
        }
        writeln!(out, "\n=== End UE Records ===")?;
        Ok(())
    }
}

fn format_epoch_secs(secs: f64) -> String {
    chrono::DateTime::from_timestamp(secs as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| format!("{secs}"))
}

/// S1AP ids from the IE map, falling back to the message fields.
fn s1ap_ids_from_ies_or_fields(
    ies: &BTreeMap<String, String>,
    msg: &CanonicalMessage,
) -> (Option<u32>, Option<u32>) {
    let (ie_mme, ie_enb) = s1ap::s1ap_ids_from_ies(ies);
    (ie_mme.or(msg.mme_ue_s1ap_id), ie_enb.or(msg.enb_ue_s1ap_id))
}

/// First context matching any of the supplied identifiers.
fn find_context_key(
    contexts: &HashMap<String, UeContext>,
    imsi: Option<&str>,
    tmsi: Option<&str>,
    imeisv: Option<&str>,
    mme_ue_s1ap_id: Option<u32>,
    enb_ue_s1ap_id: Option<u32>,
) -> Option<String> {
    for (key, context) in contexts {
        let matches = (imsi.is_some() && context.imsi.as_deref() == imsi)
            || (tmsi.is_some() && context.tmsi.as_deref() == tmsi)
            || (mme_ue_s1ap_id.is_some() && context.mme_ue_s1ap_id == mme_ue_s1ap_id)
            || (enb_ue_s1ap_id.is_some() && context.enb_ue_s1ap_id == enb_ue_s1ap_id)
            || (imeisv.is_some() && context.imei.as_deref() == imeisv);
        if matches {
            return Some(key.clone());
        }
    }
    None
}
