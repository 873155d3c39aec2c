//! Shared fixtures for the pipeline scenario tests: S1AP PDU assembly and
//! spool plumbing.

use std::path::Path;
use std::sync::Arc;

use s1watch_engine::model::SignalMessage;
use s1watch_engine::pipeline::{Pipeline, PipelineConfig};
use s1watch_engine::ruleset::parse_ruleset_yaml;
use s1watch_engine::spool::{Spool, SpoolConfig};

/// Assemble an S1AP PDU the way the decoder expects it: choice header,
/// procedure, criticality, open-type wrapper, sequence preamble, 2-byte IE
/// count, then IE fields.
pub fn build_pdu(pdu_index: u8, procedure: u8, ies: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (id, value) in ies {
        body.extend_from_slice(&id.to_be_bytes());
        body.push(0x40);
        assert!(value.len() < 128, "fixtures use short-form lengths");
        body.push(value.len() as u8);
        body.extend_from_slice(value);
    }

    let mut pdu = Vec::new();
    pdu.push(pdu_index << 5);
    pdu.push(procedure);
    pdu.push(0x00);
    pdu.push(0x40);
    pdu.push(0x00);
    pdu.extend_from_slice(&(ies.len() as u16).to_be_bytes());
    pdu.extend_from_slice(&body);
    pdu
}

/// TBCD-encode an IMSI into a type-1 mobile identity value.
pub fn tbcd_imsi(imsi: &str) -> Vec<u8> {
    let digits: Vec<u8> = imsi.bytes().map(|b| b - b'0').collect();
    let odd = digits.len() % 2 == 1;
    let mut bytes = Vec::new();
    bytes.push((digits[0] << 4) | if odd { 0x08 } else { 0x00 } | 0x01);
    for pair in digits[1..].chunks(2) {
        let low = pair[0];
        let high = if pair.len() == 2 { pair[1] } else { 0x0F };
        bytes.push((high << 4) | low);
    }
    bytes
}

/// NAS-PDU IE value carrying a plain Attach Request with the given IMSI.
pub fn nas_attach_request_ie(imsi: &str) -> Vec<u8> {
    let identity = tbcd_imsi(imsi);
    let mut nas = vec![0x07, 0x41, 0x71];
    nas.push(identity.len() as u8);
    nas.extend_from_slice(&identity);

    let mut value = vec![nas.len() as u8];
    value.extend_from_slice(&nas);
    value
}

/// A `SignalMessage` wrapping raw PDU bytes.
pub fn signal_message(sequence: i64, raw_bytes: Vec<u8>) -> SignalMessage {
    SignalMessage {
        ts_capture: 1_000_000 + sequence,
        source_id: "test_probe".to_string(),
        source_sequence: sequence,
        raw_bytes,
        ..SignalMessage::default()
    }
}

/// Pipeline over a fresh spool in `dir`, with the given ruleset loaded.
pub fn pipeline_with_ruleset(dir: &Path, ruleset_yaml: &str) -> (Pipeline, Arc<Spool>) {
    let config = PipelineConfig {
        spool: SpoolConfig {
            base_dir: dir.to_path_buf(),
            ..SpoolConfig::default()
        },
        ..PipelineConfig::default()
    };
    let mut pipeline = Pipeline::new(config).expect("pipeline opens");
    pipeline.load_ruleset(parse_ruleset_yaml(ruleset_yaml).expect("ruleset parses"));
    let spool = pipeline.spool();
    (pipeline, spool)
}
