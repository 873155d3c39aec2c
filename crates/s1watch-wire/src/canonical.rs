//! Canonical normalisation: one decoded message per input PDU.
//!
//! `decode_to_canonical` runs the SCTP extractor (falling back to treating
//! the input as a bare S1AP PDU), the S1AP parser, and the identifier
//! helpers, and folds everything into a [`CanonicalMessage`]. Spool
//! position and frame number are filled in by the pipeline, which owns that
//! context.

use serde::Serialize;
use serde_json::json;

use crate::hex::from_hex;
use crate::s1ap::{self, PduType};
use crate::sctp;

/// The normalised decode result consumed by the correlator and rule engine.
///
/// A failed decode keeps `raw_bytes` and sets `decode_failed`; every other
/// field stays at its default.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CanonicalMessage {
    pub spool_partition: i32,
    pub spool_offset: i64,
    /// Capture frame number, when the source was a packet capture.
    pub frame_number: Option<i64>,

    pub procedure_code: Option<u8>,
    /// Canonical message-type name; the key rules match against.
    pub msg_type: String,

    pub mme_ue_s1ap_id: Option<u32>,
    pub enb_ue_s1ap_id: Option<u32>,
    pub imsi: Option<String>,
    pub tmsi: Option<String>,
    pub imei: Option<String>,
    pub guti: Option<String>,

    pub mme_id: Option<String>,
    pub enb_id: Option<String>,
    pub mme_group_id: Option<String>,
    pub mme_code: Option<String>,

    pub ecgi: Vec<u8>,
    pub ecgi_plmn_identity: Vec<u8>,
    pub ecgi_cell_id: Vec<u8>,
    pub target_ecgi: Vec<u8>,
    pub target_ecgi_plmn_identity: Vec<u8>,
    pub target_ecgi_cell_id: Vec<u8>,

    /// JSON rendering of the decoded PDU.
    pub decoded_tree: String,
    pub raw_bytes: Vec<u8>,
    pub decode_failed: bool,
}

/// Map `(procedure_code, pdu_type)` to the canonical message-type name.
///
/// This table is the contract between the decoder and every ruleset; the
/// names follow the TS 36.413 message definitions. Procedures without a
/// distinct name for the given PDU variant fall back to the procedure name.
pub fn msg_type_name(procedure_code: u8, pdu_type: PduType) -> String {
    use PduType::*;
    let name = match (procedure_code, pdu_type) {
        (0, InitiatingMessage) => "HandoverRequired",
        (0, SuccessfulOutcome) => "HandoverCommand",
        (0, UnsuccessfulOutcome) => "HandoverPreparationFailure",
        (1, InitiatingMessage) => "HandoverRequest",
        (1, SuccessfulOutcome) => "HandoverRequestAcknowledge",
        (1, UnsuccessfulOutcome) => "HandoverFailure",
        (2, InitiatingMessage) => "HandoverNotify",
        (3, InitiatingMessage) => "PathSwitchRequest",
        (3, SuccessfulOutcome) => "PathSwitchRequestAcknowledge",
        (3, UnsuccessfulOutcome) => "PathSwitchRequestFailure",
        (4, InitiatingMessage) => "HandoverCancel",
        (4, SuccessfulOutcome) => "HandoverCancelAcknowledge",
        (5, InitiatingMessage) => "E-RABSetupRequest",
        (5, SuccessfulOutcome) => "E-RABSetupResponse",
        (6, InitiatingMessage) => "E-RABModifyRequest",
        (6, SuccessfulOutcome) => "E-RABModifyResponse",
        (7, InitiatingMessage) => "E-RABReleaseCommand",
        (7, SuccessfulOutcome) => "E-RABReleaseResponse",
        (8, InitiatingMessage) => "E-RABReleaseIndication",
        (9, InitiatingMessage) => "InitialContextSetupRequest",
        (9, SuccessfulOutcome) => "InitialContextSetupResponse",
        (9, UnsuccessfulOutcome) => "InitialContextSetupFailure",
        (10, InitiatingMessage) => "Paging",
        (11, InitiatingMessage) => "DownlinkNASTransport",
        (12, InitiatingMessage) => "initialUEMessage",
        (13, InitiatingMessage) => "UplinkNASTransport",
        (14, InitiatingMessage) => "Reset",
        (14, SuccessfulOutcome) => "ResetAcknowledge",
        (15, InitiatingMessage) => "ErrorIndication",
        (16, InitiatingMessage) => "NASNonDeliveryIndication",
        (17, InitiatingMessage) => "S1SetupRequest",
        (17, SuccessfulOutcome) => "S1SetupResponse",
        (17, UnsuccessfulOutcome) => "S1SetupFailure",
        (18, InitiatingMessage) => "UEContextReleaseRequest",
        (19, InitiatingMessage) => "DownlinkS1cdma2000tunneling",
        (20, InitiatingMessage) => "UplinkS1cdma2000tunneling",
        (21, InitiatingMessage) => "UEContextModificationRequest",
        (21, SuccessfulOutcome) => "UEContextModificationResponse",
        (21, UnsuccessfulOutcome) => "UEContextModificationFailure",
        (22, InitiatingMessage) => "UECapabilityInfoIndication",
        (23, InitiatingMessage) => "UEContextReleaseCommand",
        (23, SuccessfulOutcome) => "UEContextReleaseComplete",
        (24, InitiatingMessage) => "ENBStatusTransfer",
        (25, InitiatingMessage) => "MMEStatusTransfer",
        (26, InitiatingMessage) => "DeactivateTrace",
        (27, InitiatingMessage) => "TraceStart",
        (28, InitiatingMessage) => "TraceFailureIndication",
        (29, InitiatingMessage) => "ENBConfigurationUpdate",
        (29, SuccessfulOutcome) => "ENBConfigurationUpdateAcknowledge",
        (29, UnsuccessfulOutcome) => "ENBConfigurationUpdateFailure",
        (30, InitiatingMessage) => "MMEConfigurationUpdate",
        (30, SuccessfulOutcome) => "MMEConfigurationUpdateAcknowledge",
        (30, UnsuccessfulOutcome) => "MMEConfigurationUpdateFailure",
        (31, InitiatingMessage) => "LocationReportingControl",
        (32, InitiatingMessage) => "LocationReportingFailureIndication",
        (33, InitiatingMessage) => "LocationReport",
        (34, InitiatingMessage) => "OverloadStart",
        (35, InitiatingMessage) => "OverloadStop",
        (36, InitiatingMessage) => "WriteReplaceWarningRequest",
        (36, SuccessfulOutcome) => "WriteReplaceWarningResponse",
        (37, InitiatingMessage) => "ENBDirectInformationTransfer",
        (38, InitiatingMessage) => "MMEDirectInformationTransfer",
        (39, InitiatingMessage) => "PrivateMessage",
        (40, InitiatingMessage) => "ENBConfigurationTransfer",
        (41, InitiatingMessage) => "MMEConfigurationTransfer",
        (42, InitiatingMessage) => "CellTrafficTrace",
        (43, InitiatingMessage) => "KillRequest",
        (43, SuccessfulOutcome) => "KillResponse",
        (44, InitiatingMessage) => "DownlinkUEAssociatedLPPaTransport",
        (45, InitiatingMessage) => "UplinkUEAssociatedLPPaTransport",
        (46, InitiatingMessage) => "DownlinkNonUEAssociatedLPPaTransport",
        (47, InitiatingMessage) => "UplinkNonUEAssociatedLPPaTransport",
        _ => {
            let fallback = s1ap::procedure_name(procedure_code);
            return fallback.to_string();
        }
    };
    name.to_string()
}

/// Split ECGI raw bytes into PLMN identity (3 bytes) and cell-id (the rest,
/// normally 4 bytes for the 28-bit cell identity).
pub fn parse_ecgi(ecgi: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let plmn = if ecgi.len() >= 3 {
        ecgi[..3].to_vec()
    } else {
        Vec::new()
    };
    let cell_id = if ecgi.len() >= 7 {
        ecgi[3..7].to_vec()
    } else if ecgi.len() > 3 {
        ecgi[3..].to_vec()
    } else {
        Vec::new()
    };
    (plmn, cell_id)
}

/// Decode one captured payload into a canonical message.
///
/// The input may be a whole captured frame (Ethernet/IP/SCTP) or a bare
/// S1AP PDU; SCTP framing is detected implicitly by the extractor yielding
/// a payload.
pub fn decode_to_canonical(raw_bytes: &[u8]) -> CanonicalMessage {
    let mut msg = CanonicalMessage {
        raw_bytes: raw_bytes.to_vec(),
        ..CanonicalMessage::default()
    };
    if raw_bytes.is_empty() {
        msg.decode_failed = true;
        return msg;
    }

    let s1ap_bytes = sctp::extract_first(raw_bytes).unwrap_or_else(|| raw_bytes.to_vec());
    let parse = s1ap::parse_pdu(&s1ap_bytes);
    if !parse.decoded {
        msg.decode_failed = true;
        return msg;
    }

    msg.procedure_code = Some(parse.procedure_code);
    msg.msg_type = msg_type_name(parse.procedure_code, parse.pdu_type);

    let (mme_id, enb_id) = parse.s1ap_ids();
    msg.mme_ue_s1ap_id = mme_id;
    msg.enb_ue_s1ap_id = enb_id;

    msg.imsi = parse.imsis().into_iter().next();
    msg.tmsi = parse.tmsis().tmsis.into_iter().next();
    msg.imei = parse.imeisvs().into_iter().next();

    if let Some(hex) = parse.information_elements.get("EUTRAN-CGI") {
        let ecgi = from_hex(hex);
        if !ecgi.is_empty() {
            let (plmn, cell_id) = parse_ecgi(&ecgi);
            msg.ecgi = ecgi;
            msg.ecgi_plmn_identity = plmn;
            msg.ecgi_cell_id = cell_id;
        }
    }

    // Target cell for handover messages: any IE naming both a target and a
    // CGI carries the target ECGI.
    for (name, hex) in &parse.information_elements {
        let lower = name.to_lowercase();
        if lower.contains("target") && lower.contains("cgi") {
            let target = from_hex(hex);
            if !target.is_empty() {
                let (plmn, cell_id) = parse_ecgi(&target);
                msg.target_ecgi = target;
                msg.target_ecgi_plmn_identity = plmn;
                msg.target_ecgi_cell_id = cell_id;
            }
            break;
        }
    }

    msg.decoded_tree = json!({
        "procedure_code": parse.procedure_code,
        "procedure_name": parse.procedure_name,
        "pdu_type": parse.pdu_type.as_index(),
        "information_elements": parse.information_elements,
    })
    .to_string();

    msg
}
