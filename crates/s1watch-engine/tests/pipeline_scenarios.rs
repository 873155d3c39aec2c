//! End-to-end pipeline scenarios: raw PDU bytes through the spool, decode,
//! correlation, and rules, with events collected from a sink.

mod helpers;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use helpers::{build_pdu, nas_attach_request_ie, pipeline_with_ruleset, signal_message};
use s1watch_engine::error::Result;
use s1watch_engine::model::Event;
use s1watch_engine::sinks::Sink;

const IMSI: &str = "123456789012345";

/// Sink that stores emitted events for assertions.
#[derive(Clone, Default)]
struct CollectingSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl CollectingSink {
    fn take(&self) -> Vec<Event> {
        std::mem::take(&mut self.events.lock().unwrap())
    }

    fn snapshot(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl Sink for CollectingSink {
    fn emit(&mut self, event: &Event) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

const ATTACH_RULESET: &str = r#"
ruleset:
  id: mobility
  version: "1.0"
  single_message_rules:
    - event_name: UE.InitialAttach
      msg_type: initialUEMessage
"#;

fn handover_ruleset(window_ms: u64) -> String {
    format!(
        r#"
ruleset:
  id: mobility
  version: "1.0"
  sequence_rules:
    - event_name: UE.Handover
      first_msg_type: HandoverRequired
      second_msg_type: HandoverNotify
      time_window_ms: {window_ms}
      event_data:
        - target: source_cell
          source: first_message.ecgi
        - target: target_cell
          source: message.ecgi
"#
    )
}

#[test]
fn test_initial_ue_message_with_imsi_emits_attach_event() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, spool) = pipeline_with_ruleset(dir.path(), ATTACH_RULESET);
    let sink = CollectingSink::default();
    pipeline.add_sink(Box::new(sink.clone()));

    let pdu = build_pdu(
        0,
        12,
        &[
            (8, vec![0x00, 0x00, 0xc8]), // eNB-UE-S1AP-ID 200
            (26, nas_attach_request_ie(IMSI)),
        ],
    );
    spool.append(&signal_message(0, pdu)).unwrap();

    let emitted = pipeline.process_batch().unwrap();
    assert_eq!(emitted, 1);

    let events = sink.take();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.name, "UE.InitialAttach");
    assert_eq!(event.subscriber_key, format!("imsi:{IMSI}"));
    assert_eq!(event.attributes.get("msg_type").unwrap(), "initialUEMessage");
    assert_eq!(event.confidence, 1.0);
    assert_eq!(event.ruleset_id, "mobility");
    assert_eq!(event.evidence.offsets.len(), 1);
    assert_eq!(event.evidence.offsets[0].partition, 0);
    assert_eq!(event.evidence.offsets[0].offset, 0);
}

#[test]
fn test_handover_pair_within_window() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, spool) = pipeline_with_ruleset(dir.path(), &handover_ruleset(5000));
    let sink = CollectingSink::default();
    pipeline.add_sink(Box::new(sink.clone()));

    let source_cell = vec![0x0a, 0x0b, 0x0c, 0x0d, 0x00];
    let target_cell = vec![0x0e, 0x0f, 0x10, 0x11, 0x12];
    let ue_ids: [(u16, Vec<u8>); 2] = [(0, vec![0x65]), (8, vec![0x65])];

    let required = build_pdu(
        0,
        0,
        &[
            ue_ids[0].clone(),
            ue_ids[1].clone(),
            (100, source_cell.clone()),
        ],
    );
    spool.append(&signal_message(0, required)).unwrap();
    assert_eq!(pipeline.process_batch().unwrap(), 0);

    // Second message lands inside the 5 s window.
    std::thread::sleep(Duration::from_millis(1000));

    let notify = build_pdu(
        0,
        2,
        &[
            ue_ids[0].clone(),
            ue_ids[1].clone(),
            (100, target_cell.clone()),
        ],
    );
    spool.append(&signal_message(1, notify)).unwrap();
    assert_eq!(pipeline.process_batch().unwrap(), 1);

    let events = sink.take();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.name, "UE.Handover");
    assert_eq!(event.attributes.get("source_cell").unwrap(), "0a0b0c0d00");
    assert_eq!(event.attributes.get("target_cell").unwrap(), "0e0f101112");
    assert_eq!(event.evidence.offsets.len(), 2);
    assert_eq!(event.evidence.offsets[0].offset, 0);
    assert_eq!(event.evidence.offsets[1].offset, 1);
}

#[test]
fn test_handover_pair_outside_window() {
    let dir = tempfile::tempdir().unwrap();
    // Window scaled down so the expiry gap stays test-sized.
    let (mut pipeline, spool) = pipeline_with_ruleset(dir.path(), &handover_ruleset(500));
    let sink = CollectingSink::default();
    pipeline.add_sink(Box::new(sink.clone()));

    let required = build_pdu(0, 0, &[(0, vec![0x65]), (8, vec![0x65])]);
    spool.append(&signal_message(0, required)).unwrap();
    pipeline.process_batch().unwrap();

    std::thread::sleep(Duration::from_millis(800));

    let notify = build_pdu(0, 2, &[(0, vec![0x65]), (8, vec![0x65])]);
    spool.append(&signal_message(1, notify)).unwrap();
    assert_eq!(pipeline.process_batch().unwrap(), 0);
    assert!(sink.snapshot().is_empty());
}

#[test]
fn test_identifier_merge_across_messages() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, spool) = pipeline_with_ruleset(dir.path(), ATTACH_RULESET);

    // Message A: eNB-UE-S1AP-ID only.
    let a = build_pdu(0, 13, &[(8, vec![0x01, 0xc8])]); // 456
    spool.append(&signal_message(0, a)).unwrap();
    pipeline.process_batch().unwrap();

    let correlator = pipeline.correlator();
    assert_eq!(correlator.subscriber_count(), 1);
    assert!(correlator.get_context("enb:456").is_some());

    // Message B: the same eNB id plus the IMSI.
    let b = build_pdu(
        0,
        13,
        &[(8, vec![0x01, 0xc8]), (26, nas_attach_request_ie(IMSI))],
    );
    spool.append(&signal_message(1, b)).unwrap();
    pipeline.process_batch().unwrap();

    // Exactly one record, now holding the IMSI; the context migrated.
    assert_eq!(correlator.subscriber_count(), 1);
    let record = correlator.subscriber_by_imsi(IMSI).unwrap();
    assert_eq!(record.enb_ue_s1ap_id, Some(456));
    assert!(correlator.get_context("enb:456").is_none());
    assert!(correlator.get_context(&format!("imsi:{IMSI}")).is_some());
}

#[test]
fn test_release_complete_clears_s1ap_ids_only() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, spool) = pipeline_with_ruleset(dir.path(), ATTACH_RULESET);

    // InitialContextSetupRequest with both ids and the IMSI.
    let setup = build_pdu(
        0,
        9,
        &[
            (0, vec![0x6f]), // MME 111
            (8, vec![0xde]), // eNB 222
            (26, nas_attach_request_ie(IMSI)),
        ],
    );
    spool.append(&signal_message(0, setup)).unwrap();
    pipeline.process_batch().unwrap();

    let correlator = pipeline.correlator();
    let record = correlator.subscriber_by_imsi(IMSI).unwrap();
    assert_eq!(record.mme_ue_s1ap_id, Some(111));
    assert_eq!(record.enb_ue_s1ap_id, Some(222));

    // UEContextReleaseComplete with the same pair.
    let release = build_pdu(1, 23, &[(0, vec![0x6f]), (8, vec![0xde])]);
    spool.append(&signal_message(1, release)).unwrap();
    pipeline.process_batch().unwrap();

    let record = correlator.subscriber_by_imsi(IMSI).unwrap();
    assert_eq!(record.imsi.as_deref(), Some(IMSI));
    assert_eq!(record.mme_ue_s1ap_id, None);
    assert_eq!(record.enb_ue_s1ap_id, None);
    assert!(correlator.subscriber_by_s1ap_ids(Some(111), None).is_none());
    assert!(correlator.subscriber_by_s1ap_ids(None, Some(222)).is_none());

    // A new connection for the same IMSI re-associates fresh ids.
    let reattach = build_pdu(
        0,
        9,
        &[
            (0, vec![0x01, 0x4d]), // MME 333
            (8, vec![0x01, 0xbc]), // eNB 444
            (26, nas_attach_request_ie(IMSI)),
        ],
    );
    spool.append(&signal_message(2, reattach)).unwrap();
    pipeline.process_batch().unwrap();

    assert_eq!(correlator.subscriber_count(), 1);
    let record = correlator.subscriber_by_imsi(IMSI).unwrap();
    assert_eq!(record.mme_ue_s1ap_id, Some(333));
    assert_eq!(record.enb_ue_s1ap_id, Some(444));
}

#[test]
fn test_context_expiry() {
    use s1watch_engine::correlator::{Correlator, CorrelatorConfig};
    use s1watch_wire::canonical::CanonicalMessage;

    let correlator = Correlator::new(CorrelatorConfig {
        context_expiry: Duration::from_secs(1),
    });
    let msg = CanonicalMessage {
        msg_type: "initialUEMessage".to_string(),
        imsi: Some(IMSI.to_string()),
        ..CanonicalMessage::default()
    };
    let key = correlator.get_or_create_context(&msg);
    assert!(correlator.get_context(&key).is_some());

    std::thread::sleep(Duration::from_millis(1500));
    correlator.cleanup_expired();
    assert!(correlator.get_context(&key).is_none());
}

#[test]
fn test_decode_failure_does_not_stall_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, spool) = pipeline_with_ruleset(dir.path(), ATTACH_RULESET);
    let sink = CollectingSink::default();
    pipeline.add_sink(Box::new(sink.clone()));

    // Garbage record first, valid attach second.
    spool.append(&signal_message(0, vec![0x60, 0x00])).unwrap();
    let attach = build_pdu(0, 12, &[(26, nas_attach_request_ie(IMSI))]);
    spool.append(&signal_message(1, attach)).unwrap();

    let emitted = pipeline.process_batch().unwrap();
    assert_eq!(emitted, 1);
    assert_eq!(sink.take()[0].evidence.offsets[0].offset, 1);

    // The committed offset advanced past both records: nothing re-delivers.
    assert_eq!(pipeline.process_batch().unwrap(), 0);
}

#[test]
fn test_offsets_survive_pipeline_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (mut pipeline, spool) = pipeline_with_ruleset(dir.path(), ATTACH_RULESET);
        let attach = build_pdu(0, 12, &[(26, nas_attach_request_ie(IMSI))]);
        spool.append(&signal_message(0, attach)).unwrap();
        assert_eq!(pipeline.process_batch().unwrap(), 1);
    }

    // A fresh pipeline over the same spool does not reprocess.
    let (mut pipeline, spool) = pipeline_with_ruleset(dir.path(), ATTACH_RULESET);
    let sink = CollectingSink::default();
    pipeline.add_sink(Box::new(sink.clone()));
    assert_eq!(pipeline.process_batch().unwrap(), 0);

    // But new records flow.
    let attach = build_pdu(0, 12, &[(26, nas_attach_request_ie(IMSI))]);
    spool.append(&signal_message(1, attach)).unwrap();
    assert_eq!(pipeline.process_batch().unwrap(), 1);
    assert_eq!(sink.take()[0].evidence.offsets[0].offset, 1);
}
