//! Live per-UE state and the subscriber-key chain.
//!
//! A `UeContext` is the pipeline's view of one UE: identifiers, current and
//! target cells, the last procedure seen, and in-flight handover state. The
//! subscriber key derived from a context routes rule-engine state and event
//! correlation.

use std::time::{Duration, Instant};

use s1watch_wire::canonical::CanonicalMessage;
use s1watch_wire::hex::to_hex;

use crate::subscriber::SubscriberRecord;

/// Rank of a subscriber key for upgrade-only migration.
///
/// A context only ever moves to a key of strictly higher rank, along
/// IMSI > TMSI > MME > eNB; everything below eNB never triggers migration.
pub fn key_rank(key: &str) -> u8 {
    if key.starts_with("imsi:") {
        4
    } else if key.starts_with("guti:") || key.starts_with("tmsi:") {
        3
    } else if key.starts_with("mme:") {
        2
    } else if key.starts_with("enb:") {
        1
    } else {
        0
    }
}

/// Live view of one UE.
#[derive(Debug, Clone)]
pub struct UeContext {
    pub mme_ue_s1ap_id: Option<u32>,
    pub enb_ue_s1ap_id: Option<u32>,
    pub imsi: Option<String>,
    pub guti: Option<String>,
    pub tmsi: Option<String>,
    pub imei: Option<String>,

    pub enb_id: Option<String>,
    pub mme_id: Option<String>,
    pub mme_group_id: Option<String>,
    pub mme_code: Option<String>,

    /// Current serving cell.
    pub ecgi: Vec<u8>,
    /// Cell a handover is heading to.
    pub target_ecgi: Vec<u8>,
    /// Cell a handover left from.
    pub source_ecgi: Vec<u8>,

    pub last_procedure: String,
    pub last_seen: Instant,
    pub handover_in_progress: bool,
    pub handover_start_time: Option<Instant>,
    pub subscriber_key: String,
}

impl Default for UeContext {
    fn default() -> Self {
        UeContext {
            mme_ue_s1ap_id: None,
            enb_ue_s1ap_id: None,
            imsi: None,
            guti: None,
            tmsi: None,
            imei: None,
            enb_id: None,
            mme_id: None,
            mme_group_id: None,
            mme_code: None,
            ecgi: Vec::new(),
            target_ecgi: Vec::new(),
            source_ecgi: Vec::new(),
            last_procedure: String::new(),
            last_seen: Instant::now(),
            handover_in_progress: false,
            handover_start_time: None,
            subscriber_key: String::new(),
        }
    }
}

impl UeContext {
    /// Fold a message (and the matched subscriber record, when one exists)
    /// into this context and refresh the handover state.
    pub fn update(&mut self, msg: &CanonicalMessage, record: Option<&SubscriberRecord>) {
        if let Some(record) = record {
            if record.imsi.is_some() {
                self.imsi = record.imsi.clone();
            }
            if record.tmsi.is_some() {
                self.tmsi = record.tmsi.clone();
            }
            if record.imeisv.is_some() {
                self.imei = record.imeisv.clone();
            }
            if record.mme_ue_s1ap_id.is_some() {
                self.mme_ue_s1ap_id = record.mme_ue_s1ap_id;
            }
            if record.enb_ue_s1ap_id.is_some() {
                self.enb_ue_s1ap_id = record.enb_ue_s1ap_id;
            }
        }

        if msg.mme_ue_s1ap_id.is_some() {
            self.mme_ue_s1ap_id = msg.mme_ue_s1ap_id;
        }
        if msg.enb_ue_s1ap_id.is_some() {
            self.enb_ue_s1ap_id = msg.enb_ue_s1ap_id;
        }
        if msg.imsi.is_some() {
            self.imsi = msg.imsi.clone();
        }
        if msg.guti.is_some() {
            self.guti = msg.guti.clone();
        }
        if msg.tmsi.is_some() {
            self.tmsi = msg.tmsi.clone();
        }
        if msg.imei.is_some() {
            self.imei = msg.imei.clone();
        }
        if msg.enb_id.is_some() {
            self.enb_id = msg.enb_id.clone();
        }
        if msg.mme_id.is_some() {
            self.mme_id = msg.mme_id.clone();
        }
        if msg.mme_group_id.is_some() {
            self.mme_group_id = msg.mme_group_id.clone();
        }
        if msg.mme_code.is_some() {
            self.mme_code = msg.mme_code.clone();
        }
        if !msg.ecgi.is_empty() {
            self.ecgi = msg.ecgi.clone();
        }
        if !msg.target_ecgi.is_empty() {
            self.target_ecgi = msg.target_ecgi.clone();
        }
        if !msg.msg_type.is_empty() {
            self.last_procedure = msg.msg_type.clone();
        }
        self.last_seen = Instant::now();

        match msg.msg_type.as_str() {
            // Source side starts the handover; the context tracks the
            // target cell as current from here on.
            "HandoverRequired" => {
                self.handover_in_progress = true;
                self.handover_start_time = Some(Instant::now());
                self.source_ecgi = self.ecgi.clone();
                if !self.target_ecgi.is_empty() {
                    self.ecgi = self.target_ecgi.clone();
                }
            }
            "HandoverCommand" => {
                self.handover_in_progress = true;
                if self.handover_start_time.is_none() {
                    self.handover_start_time = Some(Instant::now());
                }
                self.source_ecgi = self.ecgi.clone();
                if !self.target_ecgi.is_empty() {
                    self.ecgi = self.target_ecgi.clone();
                }
            }
            // Arrival at the target cell finalises the swap.
            "HandoverNotify" => {
                if self.handover_in_progress {
                    self.handover_in_progress = false;
                    if !self.target_ecgi.is_empty() {
                        self.ecgi = self.target_ecgi.clone();
                    }
                }
            }
            _ => {}
        }
    }

    /// Derive the subscriber key from this context's identifiers.
    ///
    /// Priority: `imsi:` > `guti:` > `tmsi:{v}@{hex(ecgi)}` >
    /// `mme:{mme_id}:{id}` > `enb:{enb_id}:{id}` > `imei:` > `mme:{id}` >
    /// `enb:{id}` > `"unknown"` (the caller appends a counter).
    pub fn generate_subscriber_key(&self) -> String {
        if let Some(imsi) = &self.imsi {
            return format!("imsi:{imsi}");
        }
        if let Some(guti) = &self.guti {
            return format!("guti:{guti}");
        }
        if let Some(tmsi) = &self.tmsi {
            if !self.ecgi.is_empty() {
                return format!("tmsi:{tmsi}@{}", to_hex(&self.ecgi));
            }
        }
        if let (Some(mme_id), Some(id)) = (&self.mme_id, self.mme_ue_s1ap_id) {
            return format!("mme:{mme_id}:{id}");
        }
        if let (Some(enb_id), Some(id)) = (&self.enb_id, self.enb_ue_s1ap_id) {
            return format!("enb:{enb_id}:{id}");
        }
        if let Some(imei) = &self.imei {
            return format!("imei:{imei}");
        }
        if let Some(id) = self.mme_ue_s1ap_id {
            return format!("mme:{id}");
        }
        if let Some(id) = self.enb_ue_s1ap_id {
            return format!("enb:{id}");
        }
        "unknown".to_string()
    }

    /// True when the context shares a stable identity (IMSI, GUTI, IMEI)
    /// with another context.
    pub fn matches_stable_identity(&self, other: &UeContext) -> bool {
        (self.imsi.is_some() && self.imsi == other.imsi)
            || (self.guti.is_some() && self.guti == other.guti)
            || (self.imei.is_some() && self.imei == other.imei)
    }

    /// True once the context has been idle past the inactivity window.
    pub fn is_expired(&self, max_inactivity: Duration) -> bool {
        self.last_seen.elapsed() > max_inactivity
    }
}
