//! Subscriber records and identifier indexes.
//!
//! `SubscriberTable` keeps exactly one record per real UE across a stream
//! where each message carries only a subset of the UE's identifiers. Records
//! live in an arena keyed by a u64 id; six identifier indexes (IMSI, TMSI,
//! IMEISV, MME-UE-S1AP-ID, eNB-UE-S1AP-ID, GTP-TEID) map back to those ids.
//!
//! Association is conflict-stealing: indexing a value that currently points
//! at a different record clears that record's field first, so every index
//! stays 1-to-1 with record ids.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::debug;

use s1watch_wire::s1ap;

/// Canonical identity of one UE as accumulated by the correlator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriberRecord {
    pub imsi: Option<String>,
    pub tmsi: Option<String>,
    pub imeisv: Option<String>,
    pub mme_ue_s1ap_id: Option<u32>,
    pub enb_ue_s1ap_id: Option<u32>,
    pub teids: BTreeSet<u32>,
    /// Seconds since the epoch.
    pub first_seen_timestamp: Option<f64>,
    pub last_seen_timestamp: Option<f64>,
}

/// Identifiers offered to a locate-or-create call.
#[derive(Debug, Clone, Default)]
pub struct IdentifierHints {
    pub imsi: Option<String>,
    pub tmsi: Option<String>,
    pub imeisv: Option<String>,
    pub mme_ue_s1ap_id: Option<u32>,
    pub enb_ue_s1ap_id: Option<u32>,
    pub teid: Option<u32>,
}

impl IdentifierHints {
    fn has_stable_identifier(&self) -> bool {
        self.imsi.is_some() || self.tmsi.is_some() || self.imeisv.is_some()
    }

    fn is_empty(&self) -> bool {
        !self.has_stable_identifier()
            && self.mme_ue_s1ap_id.is_none()
            && self.enb_ue_s1ap_id.is_none()
            && self.teid.is_none()
    }
}

/// One decoded message as seen by the subscriber table.
pub struct FrameView<'a> {
    pub procedure_code: Option<u8>,
    /// True for UEContextReleaseComplete (procedure 23, successful outcome).
    pub release_complete: bool,
    pub information_elements: &'a BTreeMap<String, String>,
    pub raw_bytes: &'a [u8],
    /// Capture/processing time, seconds since the epoch.
    pub timestamp: f64,
}

/// Digits only.
pub fn normalize_imsi(imsi: &str) -> String {
    imsi.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Hex digits, lowercased, any `0x` prefix stripped.
pub fn normalize_tmsi(tmsi: &str) -> String {
    let lowered: String = tmsi
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    lowered
        .strip_prefix("0x")
        .map(str::to_string)
        .unwrap_or(lowered)
}

/// Same normalisation as IMSI.
pub fn normalize_imeisv(imeisv: &str) -> String {
    normalize_imsi(imeisv)
}

/// The record arena plus all identifier indexes.
#[derive(Debug, Default)]
pub struct SubscriberTable {
    records: BTreeMap<u64, SubscriberRecord>,
    next_subscriber_id: u64,
    imsi_index: HashMap<String, u64>,
    tmsi_index: HashMap<String, u64>,
    imeisv_index: HashMap<String, u64>,
    mme_id_index: HashMap<u32, u64>,
    enb_id_index: HashMap<u32, u64>,
    teid_index: HashMap<u32, u64>,
}

impl SubscriberTable {
    pub fn new() -> Self {
        SubscriberTable {
            next_subscriber_id: 1,
            ..SubscriberTable::default()
        }
    }

    pub fn get(&self, id: u64) -> Option<&SubscriberRecord> {
        self.records.get(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &SubscriberRecord)> {
        self.records.iter().map(|(id, record)| (*id, record))
    }

    // Index lookups. An id of 0 never occurs; entries always point at a
    // live record.
    pub fn id_by_imsi(&self, imsi: &str) -> Option<u64> {
        self.imsi_index.get(imsi).copied()
    }

    pub fn id_by_tmsi(&self, tmsi: &str) -> Option<u64> {
        self.tmsi_index.get(tmsi).copied()
    }

    pub fn id_by_imeisv(&self, imeisv: &str) -> Option<u64> {
        self.imeisv_index.get(imeisv).copied()
    }

    pub fn id_by_mme_ue_s1ap_id(&self, id: u32) -> Option<u64> {
        self.mme_id_index.get(&id).copied()
    }

    pub fn id_by_enb_ue_s1ap_id(&self, id: u32) -> Option<u64> {
        self.enb_id_index.get(&id).copied()
    }

    pub fn id_by_teid(&self, teid: u32) -> Option<u64> {
        self.teid_index.get(&teid).copied()
    }

    /// Locate an existing record by the offered identifiers or create one.
    ///
    /// Lookup priority: IMSI, TMSI, IMEISV, both S1AP ids resolving to the
    /// same record, MME id alone, eNB id alone, TEID. When nothing hits and
    /// only S1AP ids were offered, a fallback scan runs (see
    /// [`Self::s1ap_id_fallback`]); with a stable identifier present a miss
    /// always creates a fresh record.
    pub fn get_or_create(&mut self, hints: &IdentifierHints) -> u64 {
        let mut found = None;

        if let Some(imsi) = &hints.imsi {
            found = self.id_by_imsi(imsi);
        }
        if found.is_none() {
            if let Some(tmsi) = &hints.tmsi {
                found = self.id_by_tmsi(tmsi);
            }
        }
        if found.is_none() {
            if let Some(imeisv) = &hints.imeisv {
                found = self.id_by_imeisv(imeisv);
            }
        }
        if found.is_none() {
            if let (Some(mme), Some(enb)) = (hints.mme_ue_s1ap_id, hints.enb_ue_s1ap_id) {
                let mme_hit = self.id_by_mme_ue_s1ap_id(mme);
                let enb_hit = self.id_by_enb_ue_s1ap_id(enb);
                if mme_hit.is_some() && mme_hit == enb_hit {
                    found = mme_hit;
                }
            }
        }
        if found.is_none() {
            if let Some(mme) = hints.mme_ue_s1ap_id {
                found = self.id_by_mme_ue_s1ap_id(mme);
            }
        }
        if found.is_none() {
            if let Some(enb) = hints.enb_ue_s1ap_id {
                found = self.id_by_enb_ue_s1ap_id(enb);
            }
        }
        if found.is_none() {
            if let Some(teid) = hints.teid {
                found = self.id_by_teid(teid);
            }
        }

        if found.is_none()
            && !hints.has_stable_identifier()
            && (hints.mme_ue_s1ap_id.is_some() || hints.enb_ue_s1ap_id.is_some())
        {
            found = self.s1ap_id_fallback(hints.mme_ue_s1ap_id, hints.enb_ue_s1ap_id);
        }

        let subscriber_id = found.unwrap_or_else(|| {
            let id = self.next_subscriber_id;
            self.next_subscriber_id += 1;
            self.records.insert(id, SubscriberRecord::default());
            debug!("subscriber: created record {id} for {hints:?}");
            id
        });

        if let Some(imsi) = &hints.imsi {
            self.associate_imsi(subscriber_id, imsi);
        }
        if let Some(tmsi) = &hints.tmsi {
            self.associate_tmsi(subscriber_id, tmsi);
        }
        if let Some(enb) = hints.enb_ue_s1ap_id {
            self.associate_enb_ue_s1ap_id(subscriber_id, enb);
        }
        if let Some(mme) = hints.mme_ue_s1ap_id {
            self.associate_mme_ue_s1ap_id(subscriber_id, mme);
        }
        if let Some(teid) = hints.teid {
            self.associate_teid(subscriber_id, teid);
        }
        if let Some(imeisv) = &hints.imeisv {
            self.associate_imeisv(subscriber_id, imeisv);
        }

        subscriber_id
    }

    /// Fallback lookup when only S1AP ids are available and neither index
    /// hits (typically after a context release dropped the index entries).
    ///
    /// First pass: a record whose retained S1AP id fields match the request,
    /// accepted only when unique. Second pass: the most recently created
    /// record holding an IMSI or TMSI. The second heuristic can attach the
    /// ids to an unrelated record when several identified UEs are live with
    /// fresh unindexed ids; this matches the long-standing behaviour and is
    /// documented in DESIGN.md rather than silently changed.
    fn s1ap_id_fallback(&self, mme: Option<u32>, enb: Option<u32>) -> Option<u64> {
        let mut unique_match = None;
        for (id, record) in &self.records {
            let mme_matches = mme.is_none_or(|v| record.mme_ue_s1ap_id == Some(v));
            let enb_matches = enb.is_none_or(|v| record.enb_ue_s1ap_id == Some(v));
            let has_any = record.mme_ue_s1ap_id.is_some() || record.enb_ue_s1ap_id.is_some();
            if mme_matches && enb_matches && has_any {
                if unique_match.is_some() {
                    unique_match = None;
                    break;
                }
                unique_match = Some(*id);
            }
        }
        if let Some(id) = unique_match {
            debug!("subscriber: fallback matched record {id} by retained S1AP ids");
            return Some(id);
        }

        let candidate = self
            .records
            .iter()
            .filter(|(_, record)| record.imsi.is_some() || record.tmsi.is_some())
            .map(|(id, _)| *id)
            .max();
        if let Some(id) = candidate {
            debug!("subscriber: fallback attached S1AP ids to most recent identified record {id}");
        }
        candidate
    }

    // -----------------------------------------------------------------
    // Association: set the record field and index entry, stealing the
    // value from any other record that currently holds it.
    // -----------------------------------------------------------------

    pub fn associate_imsi(&mut self, subscriber_id: u64, imsi: &str) {
        if let Some(&other) = self.imsi_index.get(imsi) {
            if other != subscriber_id {
                if let Some(record) = self.records.get_mut(&other) {
                    record.imsi = None;
                }
                debug!("subscriber: IMSI {imsi} stolen from record {other} for {subscriber_id}");
            }
        }
        let Some(record) = self.records.get_mut(&subscriber_id) else {
            return;
        };
        if let Some(old) = record.imsi.take() {
            if old != imsi {
                self.imsi_index.remove(&old);
            }
        }
        record.imsi = Some(imsi.to_string());
        self.imsi_index.insert(imsi.to_string(), subscriber_id);
    }

    pub fn associate_tmsi(&mut self, subscriber_id: u64, tmsi: &str) {
        if let Some(&other) = self.tmsi_index.get(tmsi) {
            if other != subscriber_id {
                if let Some(record) = self.records.get_mut(&other) {
                    record.tmsi = None;
                }
                debug!("subscriber: TMSI {tmsi} stolen from record {other} for {subscriber_id}");
            }
        }
        let Some(record) = self.records.get_mut(&subscriber_id) else {
            return;
        };
        if let Some(old) = record.tmsi.take() {
            if old != tmsi {
                self.tmsi_index.remove(&old);
            }
        }
        record.tmsi = Some(tmsi.to_string());
        self.tmsi_index.insert(tmsi.to_string(), subscriber_id);
    }

    pub fn associate_imeisv(&mut self, subscriber_id: u64, imeisv: &str) {
        if let Some(&other) = self.imeisv_index.get(imeisv) {
            if other != subscriber_id {
                if let Some(record) = self.records.get_mut(&other) {
                    record.imeisv = None;
                }
            }
        }
        let Some(record) = self.records.get_mut(&subscriber_id) else {
            return;
        };
        if let Some(old) = record.imeisv.take() {
            if old != imeisv {
                self.imeisv_index.remove(&old);
            }
        }
        record.imeisv = Some(imeisv.to_string());
        self.imeisv_index.insert(imeisv.to_string(), subscriber_id);
    }

    pub fn associate_mme_ue_s1ap_id(&mut self, subscriber_id: u64, id: u32) {
        if let Some(&other) = self.mme_id_index.get(&id) {
            if other != subscriber_id {
                if let Some(record) = self.records.get_mut(&other) {
                    record.mme_ue_s1ap_id = None;
                }
                debug!("subscriber: MME-UE-S1AP-ID {id} stolen from record {other}");
            }
        }
        let Some(record) = self.records.get_mut(&subscriber_id) else {
            return;
        };
        if let Some(old) = record.mme_ue_s1ap_id.take() {
            if old != id {
                self.mme_id_index.remove(&old);
            }
        }
        record.mme_ue_s1ap_id = Some(id);
        self.mme_id_index.insert(id, subscriber_id);
    }

    pub fn associate_enb_ue_s1ap_id(&mut self, subscriber_id: u64, id: u32) {
        if let Some(&other) = self.enb_id_index.get(&id) {
            if other != subscriber_id {
                if let Some(record) = self.records.get_mut(&other) {
                    record.enb_ue_s1ap_id = None;
                }
                debug!("subscriber: eNB-UE-S1AP-ID {id} stolen from record {other}");
            }
        }
        let Some(record) = self.records.get_mut(&subscriber_id) else {
            return;
        };
        if let Some(old) = record.enb_ue_s1ap_id.take() {
            if old != id {
                self.enb_id_index.remove(&old);
            }
        }
        record.enb_ue_s1ap_id = Some(id);
        self.enb_id_index.insert(id, subscriber_id);
    }

    pub fn associate_teid(&mut self, subscriber_id: u64, teid: u32) {
        if let Some(&other) = self.teid_index.get(&teid) {
            if other != subscriber_id {
                if let Some(record) = self.records.get_mut(&other) {
                    record.teids.remove(&teid);
                }
                debug!("subscriber: TEID {teid:#x} stolen from record {other}");
            }
        }
        let Some(record) = self.records.get_mut(&subscriber_id) else {
            return;
        };
        record.teids.insert(teid);
        self.teid_index.insert(teid, subscriber_id);
    }

    // -----------------------------------------------------------------
    // Removal: drop both the index entry and the record field.
    // -----------------------------------------------------------------

    pub fn remove_mme_ue_s1ap_id(&mut self, id: u32) {
        if let Some(subscriber_id) = self.mme_id_index.remove(&id) {
            if let Some(record) = self.records.get_mut(&subscriber_id) {
                record.mme_ue_s1ap_id = None;
            }
            debug!("subscriber: released MME-UE-S1AP-ID {id} from record {subscriber_id}");
        }
    }

    pub fn remove_enb_ue_s1ap_id(&mut self, id: u32) {
        if let Some(subscriber_id) = self.enb_id_index.remove(&id) {
            if let Some(record) = self.records.get_mut(&subscriber_id) {
                record.enb_ue_s1ap_id = None;
            }
            debug!("subscriber: released eNB-UE-S1AP-ID {id} from record {subscriber_id}");
        }
    }

    pub fn remove_teid(&mut self, teid: u32) {
        if let Some(subscriber_id) = self.teid_index.remove(&teid) {
            if let Some(record) = self.records.get_mut(&subscriber_id) {
                record.teids.remove(&teid);
            }
        }
    }

    /// Correlate one decoded frame.
    ///
    /// Extracts identifiers and TEIDs from the frame's IE map (TEIDs come
    /// only from the structured E-RAB decoders; the generic byte scan is
    /// disabled), locates-or-creates the record, associates S1AP ids and
    /// TEIDs, updates the seen timestamps, and applies the release
    /// semantics for UEContextReleaseComplete. Returns the record id, or
    /// `None` when the frame carried no usable identifier.
    pub fn dispatch_frame(&mut self, frame: &FrameView<'_>) -> Option<u64> {
        let ies = frame.information_elements;
        let imsis = s1ap::imsis_from_ies(ies);
        let tmsi_extraction = s1ap::tmsis_from_ies(ies, frame.procedure_code);
        let imeisvs = s1ap::imeisvs_from_ies(ies);
        let (mme_id, enb_id) = s1ap::s1ap_ids_from_ies(ies);

        let mut teids = s1ap::extract_teids_from_bytes(frame.raw_bytes);
        teids.extend(&tmsi_extraction.teids);

        let hints = IdentifierHints {
            imsi: imsis.first().map(|v| normalize_imsi(v)),
            tmsi: tmsi_extraction.tmsis.first().map(|v| normalize_tmsi(v)),
            imeisv: imeisvs.first().map(|v| normalize_imeisv(v)),
            mme_ue_s1ap_id: mme_id,
            enb_ue_s1ap_id: enb_id,
            // TEIDs associate below so a stale TEID index entry cannot
            // decide the lookup.
            teid: None,
        };
        if hints.is_empty() {
            return None;
        }

        let subscriber_id = self.get_or_create(&hints);
        if let Some(mme) = mme_id {
            self.associate_mme_ue_s1ap_id(subscriber_id, mme);
        }
        if let Some(enb) = enb_id {
            self.associate_enb_ue_s1ap_id(subscriber_id, enb);
        }
        for teid in teids {
            self.associate_teid(subscriber_id, teid);
        }

        if frame.timestamp > 0.0 {
            if let Some(record) = self.records.get_mut(&subscriber_id) {
                if record.first_seen_timestamp.is_none() {
                    record.first_seen_timestamp = Some(frame.timestamp);
                }
                record.last_seen_timestamp = Some(frame.timestamp);
            }
        }

        if frame.release_complete {
            if let Some(mme) = mme_id {
                self.remove_mme_ue_s1ap_id(mme);
            }
            if let Some(enb) = enb_id {
                self.remove_enb_ue_s1ap_id(enb);
            }
        }

        Some(subscriber_id)
    }

    /// Check the bidirectional index invariant; test support.
    #[cfg(test)]
    pub(crate) fn assert_index_invariants(&self) {
        for (id, record) in &self.records {
            if let Some(imsi) = &record.imsi {
                assert_eq!(self.imsi_index.get(imsi), Some(id));
            }
            if let Some(tmsi) = &record.tmsi {
                assert_eq!(self.tmsi_index.get(tmsi), Some(id));
            }
            if let Some(imeisv) = &record.imeisv {
                assert_eq!(self.imeisv_index.get(imeisv), Some(id));
            }
            if let Some(mme) = record.mme_ue_s1ap_id {
                assert_eq!(self.mme_id_index.get(&mme), Some(id));
            }
            if let Some(enb) = record.enb_ue_s1ap_id {
                assert_eq!(self.enb_id_index.get(&enb), Some(id));
            }
            for teid in &record.teids {
                assert_eq!(self.teid_index.get(teid), Some(id));
            }
        }
        for (imsi, id) in &self.imsi_index {
            assert_eq!(self.records[id].imsi.as_ref(), Some(imsi));
        }
        for (tmsi, id) in &self.tmsi_index {
            assert_eq!(self.records[id].tmsi.as_ref(), Some(tmsi));
        }
        for (imeisv, id) in &self.imeisv_index {
            assert_eq!(self.records[id].imeisv.as_ref(), Some(imeisv));
        }
        for (mme, id) in &self.mme_id_index {
            assert_eq!(self.records[id].mme_ue_s1ap_id, Some(*mme));
        }
        for (enb, id) in &self.enb_id_index {
            assert_eq!(self.records[id].enb_ue_s1ap_id, Some(*enb));
        }
        for (teid, id) in &self.teid_index {
            assert!(self.records[id].teids.contains(teid));
        }
    }
}
