//! S1AP PDU parsing (3GPP TS 36.413, Aligned PER).
//!
//! This is a purpose-built decoder, not a generated ASN.1 codec: it decodes
//! the outer PDU framing and the protocolIEs list, stores every information
//! element as a lowercase hex string under its canonical name, and provides
//! targeted helpers for the identifier-bearing IEs the correlator needs
//! (S1AP ids, S-TMSI, NAS-PDU, the two E-RAB setup lists).
//!
//! Decoding never panics and never errors: any bounds failure leaves
//! [`S1apParse::decoded`] false with the raw bytes retained.

use std::collections::BTreeMap;

use log::{debug, trace, warn};

use crate::hex::{from_hex, to_hex};
use crate::nas;

/// The three S1AP PDU variants (outermost CHOICE).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    InitiatingMessage,
    SuccessfulOutcome,
    UnsuccessfulOutcome,
}

impl PduType {
    fn from_choice_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(PduType::InitiatingMessage),
            1 => Some(PduType::SuccessfulOutcome),
            2 => Some(PduType::UnsuccessfulOutcome),
            _ => None,
        }
    }

    /// Numeric CHOICE index, as carried in the decoded tree.
    pub fn as_index(self) -> u8 {
        match self {
            PduType::InitiatingMessage => 0,
            PduType::SuccessfulOutcome => 1,
            PduType::UnsuccessfulOutcome => 2,
        }
    }
}

/// Result of parsing one S1AP PDU.
#[derive(Debug, Clone)]
pub struct S1apParse {
    /// Whether the PDU framing decoded successfully.
    pub decoded: bool,
    pub pdu_type: PduType,
    pub procedure_code: u8,
    /// Procedure name from the fixed TS 36.413 table, `"Unknown"` otherwise.
    pub procedure_name: &'static str,
    /// IE values as lowercase hex, keyed by canonical IE name.
    pub information_elements: BTreeMap<String, String>,
    /// The input bytes, retained verbatim.
    pub raw_bytes: Vec<u8>,
}

impl S1apParse {
    fn failed(raw: &[u8]) -> Self {
        S1apParse {
            decoded: false,
            pdu_type: PduType::InitiatingMessage,
            procedure_code: 0,
            procedure_name: "Unknown",
            information_elements: BTreeMap::new(),
            raw_bytes: raw.to_vec(),
        }
    }

    /// Convenience accessors over the IE map.
    pub fn s1ap_ids(&self) -> (Option<u32>, Option<u32>) {
        s1ap_ids_from_ies(&self.information_elements)
    }

    pub fn imsis(&self) -> Vec<String> {
        imsis_from_ies(&self.information_elements)
    }

    pub fn tmsis(&self) -> TmsiExtraction {
        tmsis_from_ies(&self.information_elements, Some(self.procedure_code))
    }

    pub fn imeisvs(&self) -> Vec<String> {
        imeisvs_from_ies(&self.information_elements)
    }
}

/// Procedure code to procedure name (TS 36.413 ProcedureCode).
pub fn procedure_name(code: u8) -> &'static str {
    match code {
        0 => "HandoverPreparation",
        1 => "HandoverResourceAllocation",
        2 => "HandoverNotification",
        3 => "PathSwitchRequest",
        4 => "HandoverCancel",
        5 => "E-RABSetup",
        6 => "E-RABModify",
        7 => "E-RABRelease",
        8 => "E-RABReleaseIndication",
        9 => "InitialContextSetup",
        10 => "Paging",
        11 => "downlinkNASTransport",
        12 => "initialUEMessage",
        13 => "uplinkNASTransport",
        14 => "Reset",
        15 => "ErrorIndication",
        16 => "NASNonDeliveryIndication",
        17 => "S1Setup",
        18 => "UEContextReleaseRequest",
        19 => "DownlinkS1cdma2000tunneling",
        20 => "UplinkS1cdma2000tunneling",
        21 => "UEContextModification",
        22 => "UECapabilityInfoIndication",
        23 => "UEContextRelease",
        24 => "eNBStatusTransfer",
        25 => "MMEStatusTransfer",
        26 => "DeactivateTrace",
        27 => "TraceStart",
        28 => "TraceFailureIndication",
        29 => "ENBConfigurationUpdate",
        30 => "MMEConfigurationUpdate",
        31 => "LocationReportingControl",
        32 => "LocationReportingFailureIndication",
        33 => "LocationReport",
        34 => "OverloadStart",
        35 => "OverloadStop",
        36 => "WriteReplaceWarning",
        37 => "eNBDirectInformationTransfer",
        38 => "MMEDirectInformationTransfer",
        39 => "PrivateMessage",
        40 => "eNBConfigurationTransfer",
        41 => "MMEConfigurationTransfer",
        42 => "CellTrafficTrace",
        43 => "Kill",
        44 => "downlinkUEAssociatedLPPaTransport",
        45 => "uplinkUEAssociatedLPPaTransport",
        46 => "downlinkNonUEAssociatedLPPaTransport",
        47 => "uplinkNonUEAssociatedLPPaTransport",
        _ => "Unknown",
    }
}

/// ProtocolIE-ID to canonical IE name (TS 36.413).
///
/// Both the parser output and the canonical normaliser key on these names;
/// ids outside the table render as `IE_<id>`.
pub fn ie_name(id: u16) -> String {
    let name = match id {
        0 => "MME-UE-S1AP-ID",
        1 => "HandoverType",
        2 => "Cause",
        3 => "SourceID",
        4 => "TargetID",
        8 => "eNB-UE-S1AP-ID",
        12 => "E-RABSubjecttoDataForwardingList",
        13 => "E-RABtoReleaseListHOCmd",
        14 => "E-RABDataForwardingItem",
        15 => "E-RABReleaseItemBearerRelComp",
        16 => "E-RABToBeSetupListBearerSUReq",
        17 => "E-RABToBeSetupItemBearerSUReq",
        18 => "E-RABAdmittedList",
        19 => "E-RABFailedToSetupListHOReqAck",
        20 => "E-RABAdmittedItem",
        21 => "E-RABFailedtoSetupItemHOReqAck",
        22 => "E-RABToBeSwitchedDLList",
        23 => "E-RABToBeSwitchedDLItem",
        24 => "E-RABToBeSetupListCtxtSUReq",
        25 => "TraceActivation",
        26 => "NAS-PDU",
        27 => "E-RABToBeSetupItemHOReq",
        28 => "E-RABSetupListBearerSURes",
        29 => "E-RABFailedToSetupListBearerSURes",
        30 => "E-RABToBeModifiedListBearerModReq",
        31 => "E-RABModifyListBearerModRes",
        32 => "E-RABFailedToModifyList",
        33 => "E-RABToBeReleasedList",
        34 => "E-RABFailedToReleaseList",
        35 => "E-RABItem",
        36 => "E-RABToBeModifiedItemBearerModReq",
        37 => "E-RABModifyItemBearerModRes",
        38 => "E-RABReleaseItem",
        39 => "E-RABSetupItemBearerSURes",
        40 => "SecurityContext",
        41 => "HandoverRestrictionList",
        43 => "UEPagingID",
        44 => "pagingDRX",
        46 => "TAIList",
        47 => "TAIItem",
        48 => "E-RABFailedToSetupListCtxtSURes",
        49 => "E-RABReleaseItemHOCmd",
        50 => "E-RABSetupItemCtxtSURes",
        51 => "E-RABSetupListCtxtSURes",
        52 => "E-RABToBeSetupItemCtxtSUReq",
        53 => "E-RABToBeSetupListHOReq",
        55 => "GERANtoLTEHOInformationRes",
        57 => "UTRANtoLTEHOInformationRes",
        58 => "CriticalityDiagnostics",
        59 => "Global-ENB-ID",
        60 => "eNBname",
        61 => "MMEname",
        63 => "ServedPLMNs",
        64 => "SupportedTAs",
        65 => "TimeToWait",
        66 => "uEaggregateMaximumBitrate",
        67 => "TAI",
        69 => "E-RABReleaseListBearerRelComp",
        70 => "cdma2000PDU",
        71 => "cdma2000RATType",
        72 => "cdma2000SectorID",
        73 => "SecurityKey",
        74 => "UERadioCapability",
        75 => "GUMMEI-ID",
        78 => "E-RABInformationListItem",
        79 => "Direct-Forwarding-Path-Availability",
        80 => "UEIdentityIndexValue",
        83 => "cdma2000HOStatus",
        84 => "cdma2000HORequiredIndication",
        86 => "E-UTRAN-Trace-ID",
        87 => "RelativeMMECapacity",
        88 => "SourceMME-UE-S1AP-ID",
        89 => "Bearers-SubjectToStatusTransfer-Item",
        90 => "eNB-StatusTransfer-TransparentContainer",
        91 => "UE-associatedLogicalS1-ConnectionItem",
        92 => "ResetType",
        93 => "UE-associatedLogicalS1-ConnectionListResAck",
        94 => "E-RABToBeSwitchedULItem",
        95 => "E-RABToBeSwitchedULList",
        96 => "S-TMSI",
        97 => "cdma2000OneXRAND",
        98 => "RequestType",
        99 => "UE-S1AP-IDs",
        100 => "EUTRAN-CGI",
        101 => "OverloadResponse",
        102 => "cdma2000OneXSRVCCInfo",
        103 => "E-RABFailedToBeReleasedList",
        104 => "Source-ToTarget-TransparentContainer",
        105 => "ServedGUMMEIs",
        106 => "SubscriberProfileIDforRFP",
        107 => "UESecurityCapabilities",
        108 => "CSFallbackIndicator",
        109 => "CNDomain",
        110 => "E-RABReleasedList",
        111 => "MessageIdentifier",
        112 => "SerialNumber",
        113 => "WarningAreaList",
        114 => "RepetitionPeriod",
        115 => "NumberofBroadcastRequest",
        116 => "WarningType",
        117 => "WarningSecurityInfo",
        118 => "DataCodingScheme",
        119 => "WarningMessageContents",
        120 => "BroadcastCompletedAreaList",
        121 => "Inter-SystemInformationTransferTypeEDT",
        122 => "Inter-SystemInformationTransferTypeMDT",
        123 => "Target-ToSource-TransparentContainer",
        124 => "SRVCCOperationPossible",
        125 => "SRVCCHOIndication",
        126 => "NAS-DownlinkCount",
        127 => "CSG-Id",
        128 => "CSG-IdList",
        129 => "SONConfigurationTransferECT",
        130 => "SONConfigurationTransferMCT",
        131 => "TraceCollectionEntityIPAddress",
        132 => "MSClassmark2",
        133 => "MSClassmark3",
        134 => "RRC-Establishment-Cause",
        135 => "NASSecurityParametersfromE-UTRAN",
        136 => "NASSecurityParameterstoE-UTRAN",
        137 => "DefaultPagingDRX",
        138 => "Source-ToTarget-TransparentContainer-Secondary",
        139 => "Target-ToSource-TransparentContainer-Secondary",
        140 => "EUTRANRoundTripDelayEstimationInfo",
        141 => "BroadcastCancelledAreaList",
        142 => "ConcurrentWarningMessageIndicator",
        143 => "Data-Forwarding-Not-Possible",
        144 => "ExtendedRepetitionPeriod",
        145 => "CellAccessMode",
        146 => "CSGMembershipStatus",
        147 => "LPPa-PDU",
        148 => "Routing-ID",
        149 => "Time-Synchronization-Info",
        150 => "PS-ServiceNotAvailable",
        151 => "PagingPriority",
        152 => "x2TNLConfigurationInfo",
        153 => "eNBX2ExtendedTransportLayerAddresses",
        154 => "GUMMEIList",
        155 => "GW-TransportLayerAddress",
        156 => "Correlation-ID",
        157 => "SourceMME-GUMMEI",
        158 => "MME-UE-S1AP-ID-2",
        159 => "RegisteredLAI",
        160 => "RelayNode-Indicator",
        161 => "TrafficLoadReductionIndication",
        162 => "MDTConfiguration",
        163 => "MMERelaySupportIndicator",
        164 => "GWContextReleaseIndication",
        165 => "ManagementBasedMDTAllowed",
        _ => return format!("IE_{id}"),
    };
    name.to_string()
}

/// Read an open-type length determinant at `offset`.
///
/// Short form: top bit clear, low 7 bits are the length. Extended form: the
/// low 7 bits plus one give the number of following big-endian length bytes
/// (capped at 4). Returns `(length, bytes_consumed)`.
fn read_value_length(data: &[u8], offset: usize) -> Option<(usize, usize)> {
    let first = *data.get(offset)?;
    if first & 0x80 == 0 {
        return Some((usize::from(first & 0x7F), 1));
    }
    let extra = usize::from(first & 0x7F) + 1;
    if extra > 4 || offset + 1 + extra > data.len() {
        return None;
    }
    let mut length = 0usize;
    for i in 0..extra {
        length = (length << 8) | usize::from(data[offset + 1 + i]);
    }
    Some((length, 1 + extra))
}

/// Parse one S1AP PDU.
///
/// A PDU that truncates after the procedure code or criticality byte is
/// still a successful decode with an empty IE map; failures inside the IE
/// list keep whatever decoded before them.
pub fn parse_pdu(bytes: &[u8]) -> S1apParse {
    let mut result = S1apParse::failed(bytes);
    if bytes.is_empty() {
        return result;
    }

    // Outermost CHOICE index lives in the top bits of the first byte.
    let Some(pdu_type) = PduType::from_choice_index((bytes[0] >> 5) & 0x03) else {
        return result;
    };
    result.pdu_type = pdu_type;
    let mut offset = 1usize;

    // procedureCode: INTEGER(0..255), one byte, no determinant.
    let Some(&code) = bytes.get(offset) else {
        return result;
    };
    result.procedure_code = code;
    result.procedure_name = procedure_name(code);
    offset += 1;

    // criticality: ENUMERATED{reject, ignore, notify}, one byte, unused here.
    if bytes.get(offset).is_none() {
        result.decoded = true;
        return result;
    }
    offset += 1;

    if offset >= bytes.len() {
        result.decoded = true;
        return result;
    }

    // The value open-type wraps the protocolIEs SEQUENCE: open-type length
    // determinant, one sequence preamble byte, then a 2-byte IE count. (See
    // DESIGN.md on why this differs from a naive seq-of determinant.)
    let length_byte = bytes[offset];
    offset += if length_byte & 0x80 == 0 { 1 } else { 2 };
    offset += 1; // sequence preamble
    let num_ies = match bytes.get(offset..offset + 2) {
        Some(count) => usize::from(u16::from_be_bytes([count[0], count[1]])),
        None => {
            result.decoded = true;
            return result;
        }
    };
    offset += 2;
    trace!("s1ap: proc={code} pdu={pdu_type:?} ies={num_ies}");

    for _ in 0..num_ies {
        if offset >= bytes.len() {
            break;
        }
        let Some(id_bytes) = bytes.get(offset..offset + 2) else {
            break;
        };
        let ie_id = u16::from_be_bytes([id_bytes[0], id_bytes[1]]);
        offset += 2;

        // Per-IE criticality byte.
        if bytes.get(offset).is_none() {
            break;
        }
        offset += 1;

        let Some((value_len, consumed)) = read_value_length(bytes, offset) else {
            debug!("s1ap: bad value length for IE {ie_id} at {offset}");
            break;
        };
        offset += consumed;
        let Some(value) = bytes.get(offset..offset + value_len) else {
            debug!("s1ap: IE {ie_id} value overruns PDU ({value_len} bytes at {offset})");
            break;
        };
        result
            .information_elements
            .insert(ie_name(ie_id), to_hex(value));
        offset += value_len;
    }

    result.decoded = true;
    result
}

// ---------------------------------------------------------------------------
// Identifier helpers over the IE map
// ---------------------------------------------------------------------------

/// MME-UE-S1AP-ID and eNB-UE-S1AP-ID from the IE map.
///
/// The combined UE-S1AP-IDs IE wins when present and 8 bytes long (first
/// four bytes MME, next four eNB); shorter values yield neither id from it.
pub fn s1ap_ids_from_ies(ies: &BTreeMap<String, String>) -> (Option<u32>, Option<u32>) {
    let mut mme_id = None;
    let mut enb_id = None;

    if let Some(hex) = ies.get("UE-S1AP-IDs") {
        let bytes = from_hex(hex);
        if bytes.len() >= 8 {
            mme_id = Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]));
            enb_id = Some(u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]));
        }
    }

    if mme_id.is_none() {
        mme_id = ies.get("MME-UE-S1AP-ID").and_then(|hex| parse_hex_u32(hex));
    }
    if enb_id.is_none() {
        enb_id = ies.get("eNB-UE-S1AP-ID").and_then(|hex| parse_hex_u32(hex));
    }
    (mme_id, enb_id)
}

fn parse_hex_u32(hex: &str) -> Option<u32> {
    let trimmed = hex.strip_prefix("0x").unwrap_or(hex);
    if trimmed.is_empty() || trimmed.len() > 8 {
        return None;
    }
    u32::from_str_radix(trimmed, 16).ok()
}

/// NAS PDUs carried in the NAS-PDU IE.
///
/// The stored IE value starts with an octet-string length byte; the decoder
/// proper receives everything after it.
pub fn nas_pdus_from_ies(ies: &BTreeMap<String, String>) -> Vec<Vec<u8>> {
    let mut pdus = Vec::new();
    if let Some(hex) = ies.get("NAS-PDU") {
        let bytes = from_hex(hex);
        if bytes.len() >= 2 {
            pdus.push(bytes[1..].to_vec());
        }
    }
    pdus
}

/// IMSIs carried in NAS payloads of this message.
pub fn imsis_from_ies(ies: &BTreeMap<String, String>) -> Vec<String> {
    let mut imsis = Vec::new();
    for pdu in nas_pdus_from_ies(ies) {
        imsis.extend(nas::extract_imsis(&pdu));
    }
    imsis
}

/// IMEISVs carried in NAS payloads of this message.
pub fn imeisvs_from_ies(ies: &BTreeMap<String, String>) -> Vec<String> {
    let mut imeisvs = Vec::new();
    for pdu in nas_pdus_from_ies(ies) {
        imeisvs.extend(nas::extract_imeisvs(&pdu));
    }
    imeisvs
}

/// TMSIs plus any GTP-TEIDs surfaced by the structured E-RAB decoders.
#[derive(Debug, Default, Clone)]
pub struct TmsiExtraction {
    pub tmsis: Vec<String>,
    pub teids: Vec<u32>,
}

/// TMSI from the S-TMSI IE: the m-TMSI is the final 4 bytes of the value.
pub fn tmsi_from_stmsi(ies: &BTreeMap<String, String>) -> Option<String> {
    let hex = ies.get("S-TMSI")?;
    // mMEC (1 byte) + m-TMSI (4 bytes) minimum.
    if hex.len() < 10 {
        return None;
    }
    let m_tmsi: String = hex[hex.len() - 8..]
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect::<String>()
        .to_lowercase();
    (m_tmsi.len() == 8).then_some(m_tmsi)
}

/// Extract TMSIs (S-TMSI IE, NAS payloads, nested E-RAB NAS PDUs) and the
/// TEIDs found in the E-RAB setup lists.
///
/// `procedure_code` gates the E-RABToBeSetupListCtxtSUReq walk, which only
/// appears in InitialContextSetupRequest (procedure 9).
pub fn tmsis_from_ies(ies: &BTreeMap<String, String>, procedure_code: Option<u8>) -> TmsiExtraction {
    let mut result = TmsiExtraction::default();

    if let Some(tmsi) = tmsi_from_stmsi(ies) {
        result.tmsis.push(tmsi);
    }

    for pdu in nas_pdus_from_ies(ies) {
        result.tmsis.extend(nas::extract_tmsis(&pdu));
    }

    if procedure_code == Some(9) {
        if let Some(hex) = ies.get("E-RABToBeSetupListCtxtSUReq") {
            for item in decode_erab_to_be_setup_list(&from_hex(hex)) {
                result.teids.push(item.gtp_teid);
                if let Some(nas_pdu) = &item.nas_pdu {
                    result.tmsis.extend(nas::extract_tmsis(nas_pdu));
                }
            }
        }
    }

    if let Some(hex) = ies.get("E-RABSetupListCtxtSURes") {
        let list = decode_erab_setup_list(&from_hex(hex));
        if list.decoded {
            result.teids.extend(list.items.iter().map(|i| i.gtp_teid));
        }
    }

    result
}

/// Generic 4-byte TEID pattern scan over raw PDU bytes.
///
/// Disabled: the heuristic produced too many false positives on real
/// captures, so TEIDs are surfaced exclusively by the structured E-RAB list
/// decoders above.
pub fn extract_teids_from_bytes(_bytes: &[u8]) -> Vec<u32> {
    Vec::new()
}

// ---------------------------------------------------------------------------
// E-RAB list decoders
// ---------------------------------------------------------------------------

/// One E-RABSetupItemCtxtSURes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErabSetupItem {
    /// E-RAB-ID (0..15).
    pub e_rab_id: u8,
    /// TransportLayerAddress bytes (bit string rounded up to whole bytes).
    pub transport_layer_address: Vec<u8>,
    /// GTP-TEID, big-endian.
    pub gtp_teid: u32,
    /// Whether trailing iE-Extensions bytes were present (and skipped).
    pub has_extensions: bool,
}

/// Decoded E-RABSetupListCtxtSURes.
#[derive(Debug, Default, Clone)]
pub struct ErabSetupList {
    pub items: Vec<ErabSetupItem>,
    /// True when every announced item decoded.
    pub decoded: bool,
}

/// Read a bit-string length determinant (length counted in bits) and return
/// the number of whole bytes it occupies plus the determinant size.
fn read_bit_string_len(data: &[u8], offset: usize) -> Option<(usize, usize)> {
    let (bits, consumed) = read_value_length(data, offset)?;
    Some((bits.div_ceil(8), consumed))
}

/// Decode an E-RABSetupListCtxtSURes IE value (IE 51).
///
/// The value is a SEQUENCE OF ProtocolIE-SingleContainer, each holding an
/// E-RABSetupItemCtxtSURes. The list is constrained SIZE(1..), so the short
/// count form encodes `count - 1`.
pub fn decode_erab_setup_list(value: &[u8]) -> ErabSetupList {
    let mut result = ErabSetupList::default();
    if value.is_empty() {
        return result;
    }

    let mut offset = 0usize;
    let first = value[0];
    offset += 1;
    let num_items = if first & 0x80 == 0 {
        1 + usize::from(first & 0x7F)
    } else {
        let extra = usize::from(first & 0x7F) + 1;
        if extra > 4 || offset + extra > value.len() {
            return result;
        }
        let mut count = 0usize;
        for i in 0..extra {
            count = (count << 8) | usize::from(value[offset + i]);
        }
        offset += extra;
        count
    };

    for _ in 0..num_items {
        if offset >= value.len() {
            break;
        }
        let Some(id_bytes) = value.get(offset..offset + 2) else {
            break;
        };
        let container_id = u16::from_be_bytes([id_bytes[0], id_bytes[1]]);
        if container_id != 50 {
            debug!("e-rab setup list: unexpected container id {container_id}");
        }
        offset += 2;

        // criticality
        if value.get(offset).is_none() {
            break;
        }
        offset += 1;

        let Some((item_len, consumed)) = read_value_length(value, offset) else {
            break;
        };
        offset += consumed;
        let item_end = offset + item_len;
        if item_end > value.len() {
            break;
        }

        // e-RAB-ID: constrained INTEGER(0..15), one byte.
        let Some(&e_rab_id) = value.get(offset) else {
            break;
        };
        offset += 1;

        // transportLayerAddress: BIT STRING SIZE(1..160).
        let Some((addr_bytes, consumed)) = read_bit_string_len(value, offset) else {
            break;
        };
        offset += consumed;
        if offset + addr_bytes > item_end {
            break;
        }
        let transport_layer_address = value[offset..offset + addr_bytes].to_vec();
        offset += addr_bytes;

        // gTP-TEID: fixed four-byte OCTET STRING, no determinant.
        if offset + 4 > item_end {
            break;
        }
        let gtp_teid = u32::from_be_bytes([
            value[offset],
            value[offset + 1],
            value[offset + 2],
            value[offset + 3],
        ]);
        offset += 4;

        let has_extensions = offset < item_end;
        offset = item_end;

        result.items.push(ErabSetupItem {
            e_rab_id,
            transport_layer_address,
            gtp_teid,
            has_extensions,
        });
    }

    result.decoded = result.items.len() == num_items;
    if !result.decoded {
        warn!(
            "e-rab setup list: decoded {}/{} items",
            result.items.len(),
            num_items
        );
    }
    result
}

/// One E-RABToBeSetupItemCtxtSUReq, reduced to the fields the pipeline uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErabToBeSetupItem {
    pub e_rab_id: u8,
    pub gtp_teid: u32,
    /// Nested NAS-PDU, when the optional field is present.
    pub nas_pdu: Option<Vec<u8>>,
}

/// Decode an E-RABToBeSetupListCtxtSUReq IE value (IE 24).
///
/// Each container holds `{e-RAB-ID, e-RABlevelQoSParameters (opaque LV),
/// transportLayerAddress (BIT STRING), gTP-TEID, optional NAS-PDU (LV)}`.
pub fn decode_erab_to_be_setup_list(value: &[u8]) -> Vec<ErabToBeSetupItem> {
    let mut items = Vec::new();
    if value.is_empty() {
        return items;
    }

    let mut offset = 0usize;
    let first = value[0];
    offset += 1;
    let num_items = if first & 0x80 == 0 {
        1 + usize::from(first & 0x7F)
    } else {
        let extra = usize::from(first & 0x7F) + 1;
        if extra > 4 || offset + extra > value.len() {
            return items;
        }
        let mut count = 0usize;
        for i in 0..extra {
            count = (count << 8) | usize::from(value[offset + i]);
        }
        offset += extra;
        count
    };

    for _ in 0..num_items {
        let Some(id_bytes) = value.get(offset..offset + 2) else {
            break;
        };
        let container_id = u16::from_be_bytes([id_bytes[0], id_bytes[1]]);
        if container_id != 52 {
            debug!("e-rab to-be-setup list: unexpected container id {container_id}");
        }
        offset += 2;

        if value.get(offset).is_none() {
            break;
        }
        offset += 1; // criticality

        let Some((item_len, consumed)) = read_value_length(value, offset) else {
            break;
        };
        offset += consumed;
        let item_end = offset + item_len;
        if item_end > value.len() {
            break;
        }

        let item = decode_to_be_setup_item(&value[offset..item_end]);
        if let Some(item) = item {
            items.push(item);
        }
        offset = item_end;
    }

    items
}

fn decode_to_be_setup_item(item: &[u8]) -> Option<ErabToBeSetupItem> {
    let mut offset = 0usize;

    let e_rab_id = *item.get(offset)?;
    offset += 1;

    // e-RABlevelQoSParameters: opaque, length-prefixed.
    let (qos_len, consumed) = read_value_length(item, offset)?;
    offset += consumed;
    if offset + qos_len > item.len() {
        return None;
    }
    offset += qos_len;

    // transportLayerAddress bit string.
    let (addr_bytes, consumed) = read_bit_string_len(item, offset)?;
    offset += consumed;
    if offset + addr_bytes > item.len() {
        return None;
    }
    offset += addr_bytes;

    // gTP-TEID: four bytes.
    let teid_bytes = item.get(offset..offset + 4)?;
    let gtp_teid = u32::from_be_bytes([teid_bytes[0], teid_bytes[1], teid_bytes[2], teid_bytes[3]]);
    offset += 4;

    // Optional NAS-PDU, length-prefixed.
    let mut nas_pdu = None;
    if offset < item.len() {
        if let Some((nas_len, consumed)) = read_value_length(item, offset) {
            let start = offset + consumed;
            if start + nas_len <= item.len() && nas_len > 0 {
                nas_pdu = Some(item[start..start + nas_len].to_vec());
            }
        }
    }

    Some(ErabToBeSetupItem {
        e_rab_id,
        gtp_teid,
        nas_pdu,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::fixtures::build_pdu;
    use super::*;

    #[test]
    fn test_empty_input() {
        let parse = parse_pdu(&[]);
        assert!(!parse.decoded);
        assert!(parse.raw_bytes.is_empty());
    }

    #[test]
    fn test_header_only_is_decoded_with_zero_ies() {
        // choice + procedure + criticality, nothing else
        let parse = parse_pdu(&[0x00, 0x0c, 0x00]);
        assert!(parse.decoded);
        assert_eq!(parse.procedure_code, 12);
        assert_eq!(parse.procedure_name, "initialUEMessage");
        assert!(parse.information_elements.is_empty());
    }

    #[test]
    fn test_pdu_types() {
        assert_eq!(
            parse_pdu(&[0x00, 0x00, 0x00]).pdu_type,
            PduType::InitiatingMessage
        );
        assert_eq!(
            parse_pdu(&[0x20, 0x00, 0x00]).pdu_type,
            PduType::SuccessfulOutcome
        );
        assert_eq!(
            parse_pdu(&[0x40, 0x00, 0x00]).pdu_type,
            PduType::UnsuccessfulOutcome
        );
        assert!(!parse_pdu(&[0x60, 0x00, 0x00]).decoded);
    }

    #[test]
    fn test_parse_ies() {
        let pdu = build_pdu(
            0,
            12,
            &[(0, vec![0x00, 0x6f]), (8, vec![0x00, 0x00, 0xc8])],
        );
        let parse = parse_pdu(&pdu);
        assert!(parse.decoded);
        assert_eq!(
            parse.information_elements.get("MME-UE-S1AP-ID").unwrap(),
            "006f"
        );
        assert_eq!(
            parse.information_elements.get("eNB-UE-S1AP-ID").unwrap(),
            "0000c8"
        );
        assert_eq!(parse.s1ap_ids(), (Some(111), Some(200)));
    }

    #[test]
    fn test_unknown_ie_id_named_by_number() {
        let pdu = build_pdu(0, 12, &[(400, vec![0xab])]);
        let parse = parse_pdu(&pdu);
        assert_eq!(parse.information_elements.get("IE_400").unwrap(), "ab");
    }

    #[test]
    fn test_truncated_ie_value_keeps_earlier_ies() {
        let mut pdu = build_pdu(0, 12, &[(0, vec![0x01]), (8, vec![0x02, 0x03])]);
        pdu.truncate(pdu.len() - 1);
        let parse = parse_pdu(&pdu);
        assert!(parse.decoded);
        assert!(parse.information_elements.contains_key("MME-UE-S1AP-ID"));
        assert!(!parse.information_elements.contains_key("eNB-UE-S1AP-ID"));
    }

    #[test]
    fn test_ue_s1ap_ids_combined() {
        let value = vec![0x00, 0x00, 0x00, 0x6f, 0x00, 0x00, 0x00, 0xc8];
        let pdu = build_pdu(0, 12, &[(99, value)]);
        let parse = parse_pdu(&pdu);
        assert_eq!(parse.s1ap_ids(), (Some(111), Some(200)));
    }

    #[test]
    fn test_ue_s1ap_ids_short_yields_neither() {
        let pdu = build_pdu(0, 12, &[(99, vec![0x00, 0x00, 0x00, 0x6f, 0x00])]);
        let parse = parse_pdu(&pdu);
        assert_eq!(parse.s1ap_ids(), (None, None));
    }

    #[test]
    fn test_stmsi_m_tmsi_is_last_four_bytes() {
        let pdu = build_pdu(0, 12, &[(96, vec![0x01, 0xde, 0xad, 0xbe, 0xef])]);
        let parse = parse_pdu(&pdu);
        let tmsis = parse.tmsis();
        assert_eq!(tmsis.tmsis, vec!["deadbeef".to_string()]);
    }

    #[test]
    fn test_stmsi_too_short() {
        let pdu = build_pdu(0, 12, &[(96, vec![0xde, 0xad, 0xbe, 0xef])]);
        assert!(parse_pdu(&pdu).tmsis().tmsis.is_empty());
    }

    #[test]
    fn test_procedure_names() {
        assert_eq!(procedure_name(0), "HandoverPreparation");
        assert_eq!(procedure_name(23), "UEContextRelease");
        assert_eq!(procedure_name(47), "uplinkNonUEAssociatedLPPaTransport");
        assert_eq!(procedure_name(48), "Unknown");
        assert_eq!(procedure_name(255), "Unknown");
    }

    #[test]
    fn test_ie_names() {
        assert_eq!(ie_name(0), "MME-UE-S1AP-ID");
        assert_eq!(ie_name(26), "NAS-PDU");
        assert_eq!(ie_name(100), "EUTRAN-CGI");
        assert_eq!(ie_name(165), "ManagementBasedMDTAllowed");
        assert_eq!(ie_name(5), "IE_5");
        assert_eq!(ie_name(999), "IE_999");
    }

    #[test]
    fn test_teid_byte_scan_disabled() {
        assert!(extract_teids_from_bytes(&[0x12, 0x34, 0x56, 0x78, 0x9a]).is_empty());
    }

    fn setup_item(e_rab_id: u8, teid: u32, extensions: bool) -> Vec<u8> {
        let mut item = Vec::new();
        item.push(e_rab_id);
        item.push(32); // transport address: 32 bits
        item.extend_from_slice(&[10, 0, 0, 1]);
        item.extend_from_slice(&teid.to_be_bytes());
        if extensions {
            item.extend_from_slice(&[0x00, 0x00]);
        }
        item
    }

    fn setup_list(items: &[Vec<u8>]) -> Vec<u8> {
        let mut list = Vec::new();
        list.push((items.len() - 1) as u8); // SIZE(1..) short form
        for item in items {
            list.extend_from_slice(&50u16.to_be_bytes());
            list.push(0x00);
            list.push(item.len() as u8);
            list.extend_from_slice(item);
        }
        list
    }

    #[test]
    fn test_erab_setup_list_single_item() {
        let list = setup_list(&[setup_item(5, 0x1234_5678, false)]);
        let decoded = decode_erab_setup_list(&list);
        assert!(decoded.decoded);
        assert_eq!(decoded.items.len(), 1);
        assert_eq!(decoded.items[0].e_rab_id, 5);
        assert_eq!(decoded.items[0].gtp_teid, 0x1234_5678);
        assert_eq!(decoded.items[0].transport_layer_address, vec![10, 0, 0, 1]);
        assert!(!decoded.items[0].has_extensions);
    }

    #[test]
    fn test_erab_setup_list_multiple_items_with_extensions() {
        let list = setup_list(&[
            setup_item(1, 0xAABB_CCDD, true),
            setup_item(2, 0x0102_0304, false),
        ]);
        let decoded = decode_erab_setup_list(&list);
        assert!(decoded.decoded);
        assert_eq!(decoded.items.len(), 2);
        assert!(decoded.items[0].has_extensions);
        assert_eq!(decoded.items[1].gtp_teid, 0x0102_0304);
    }

    #[test]
    fn test_erab_setup_list_truncated_not_decoded() {
        let mut list = setup_list(&[setup_item(1, 0xAABB_CCDD, false)]);
        list.truncate(list.len() - 2);
        let decoded = decode_erab_setup_list(&list);
        assert!(!decoded.decoded);
        assert!(decoded.items.is_empty());
    }

    fn to_be_setup_item(e_rab_id: u8, teid: u32, nas: Option<&[u8]>) -> Vec<u8> {
        let mut item = Vec::new();
        item.push(e_rab_id);
        item.push(3); // QoS parameters, opaque
        item.extend_from_slice(&[0x09, 0x00, 0x00]);
        item.push(32); // transport address bits
        item.extend_from_slice(&[192, 168, 0, 1]);
        item.extend_from_slice(&teid.to_be_bytes());
        if let Some(nas) = nas {
            item.push(nas.len() as u8);
            item.extend_from_slice(nas);
        }
        item
    }

    #[test]
    fn test_erab_to_be_setup_list_with_nested_nas() {
        let nas = [0x07, 0x41, 0x01];
        let item = to_be_setup_item(3, 0xDEAD_BEEF, Some(&nas));
        let mut list = vec![0u8]; // one item
        list.extend_from_slice(&52u16.to_be_bytes());
        list.push(0x00);
        list.push(item.len() as u8);
        list.extend_from_slice(&item);

        let items = decode_erab_to_be_setup_list(&list);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].e_rab_id, 3);
        assert_eq!(items[0].gtp_teid, 0xDEAD_BEEF);
        assert_eq!(items[0].nas_pdu.as_deref(), Some(&nas[..]));
    }

    #[test]
    fn test_erab_to_be_setup_list_without_nas() {
        let item = to_be_setup_item(3, 0x0000_0042, None);
        let mut list = vec![0u8];
        list.extend_from_slice(&52u16.to_be_bytes());
        list.push(0x00);
        list.push(item.len() as u8);
        list.extend_from_slice(&item);

        let items = decode_erab_to_be_setup_list(&list);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].nas_pdu, None);
        assert_eq!(items[0].gtp_teid, 0x42);
    }

    #[test]
    fn test_extended_length_determinant() {
        // One IE with a 130-byte value, forcing the extended form.
        let value = vec![0xab; 130];
        let mut pdu = vec![0x00, 0x0c, 0x00, 0x40, 0x00, 0x00, 0x01];
        pdu.extend_from_slice(&26u16.to_be_bytes());
        pdu.push(0x40);
        pdu.push(0x80); // extended, one length byte follows
        pdu.push(130);
        pdu.extend_from_slice(&value);

        let parse = parse_pdu(&pdu);
        assert!(parse.decoded);
        assert_eq!(
            parse.information_elements.get("NAS-PDU").map(String::len),
            Some(260)
        );
    }
}
