//! NAS EMM decoding (3GPP TS 24.301).
//!
//! Decodes the NAS header, dispatches the handful of EMM message types that
//! carry mobile identities, and extracts IMSI/TMSI/IMEISV values. Protected
//! messages cannot be deciphered; a best-effort scan over the ciphered
//! payload recovers TMSIs from one known plaintext pattern, flagged as
//! low-confidence.

use log::{debug, warn};

use crate::hex::to_hex;

/// EPS mobility management protocol discriminator.
const PD_EMM: u8 = 7;

/// EMM message types this decoder dispatches on.
const MSG_ATTACH_REQUEST: u8 = 0x41;
const MSG_ATTACH_ACCEPT: u8 = 0x42;
const MSG_EXTENDED_SERVICE_REQUEST: u8 = 0x4D;
const MSG_IDENTITY_RESPONSE: u8 = 0x56;
const MSG_SECURITY_MODE_COMPLETE: u8 = 0x5E;

/// Mobile identity IEI carrying IMSI/IMEI/IMEISV in optional TLV tails.
const IEI_MOBILE_IDENTITY: u8 = 0x23;
/// Additional GUTI IEI in optional TLV tails.
const IEI_ADDITIONAL_GUTI: u8 = 0x50;

/// NAS security header types (TS 24.301 §9.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityHeaderType {
    PlainNas,
    IntegrityProtected,
    IntegrityProtectedCiphered,
    IntegrityProtectedNewContext,
    IntegrityProtectedCipheredNewContext,
    Other(u8),
}

impl SecurityHeaderType {
    fn from_nibble(value: u8) -> Self {
        match value {
            0 => SecurityHeaderType::PlainNas,
            1 => SecurityHeaderType::IntegrityProtected,
            2 => SecurityHeaderType::IntegrityProtectedCiphered,
            3 => SecurityHeaderType::IntegrityProtectedNewContext,
            4 => SecurityHeaderType::IntegrityProtectedCipheredNewContext,
            other => SecurityHeaderType::Other(other),
        }
    }

    /// True for the four protected variants that prepend MAC + sequence.
    pub fn is_protected(self) -> bool {
        matches!(
            self,
            SecurityHeaderType::IntegrityProtected
                | SecurityHeaderType::IntegrityProtectedCiphered
                | SecurityHeaderType::IntegrityProtectedNewContext
                | SecurityHeaderType::IntegrityProtectedCipheredNewContext
        )
    }
}

/// Mobile identity type (TS 24.008 §10.5.1.4, low 3 bits of the type byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MobileIdentityType {
    NoIdentity,
    Imsi,
    Imei,
    Imeisv,
    Tmsi,
    Tmgi,
    Guti,
    Other(u8),
}

impl MobileIdentityType {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0 => MobileIdentityType::NoIdentity,
            1 => MobileIdentityType::Imsi,
            2 => MobileIdentityType::Imei,
            3 => MobileIdentityType::Imeisv,
            4 => MobileIdentityType::Tmsi,
            5 => MobileIdentityType::Tmgi,
            6 => MobileIdentityType::Guti,
            other => MobileIdentityType::Other(other),
        }
    }
}

/// A decoded mobile identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobileIdentity {
    pub kind: MobileIdentityType,
    /// Digits for IMSI/IMEI/IMEISV, lowercase hex for TMSI.
    pub value: String,
    /// True when the value came from the ciphered-payload pattern scan.
    pub low_confidence: bool,
}

/// Decoded NAS header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NasHeader {
    pub security: SecurityHeaderType,
    pub protocol_discriminator: u8,
    pub message_type: u8,
    /// Byte offset of the message type within the PDU.
    pub payload_offset: usize,
}

/// Parse the NAS header of a PDU.
///
/// Protected messages (security header types 1..=4) skip the 1-byte header,
/// 4-byte MAC and 1-byte sequence number before the inner message type.
pub fn parse_header(pdu: &[u8]) -> Option<NasHeader> {
    let first = *pdu.first()?;
    let security = SecurityHeaderType::from_nibble((first >> 4) & 0x0F);
    let protocol_discriminator = first & 0x0F;

    let payload_offset = if security.is_protected() { 6 } else { 1 };
    let message_type = *pdu.get(payload_offset)?;

    Some(NasHeader {
        security,
        protocol_discriminator,
        message_type,
        payload_offset,
    })
}

// ---------------------------------------------------------------------------
// Identity field decoding
// ---------------------------------------------------------------------------

/// Decode TBCD digits from a mobile-identity value.
///
/// The first byte's upper nibble holds the first digit; from byte 1 onward
/// the low nibble precedes the high nibble, and 0xF terminates. The result
/// is accepted only when 5..=16 digits, all decimal, and not all zeros
/// (5..=15 for IMSI, 16 for IMEISV).
fn decode_tbcd_digits(bytes: &[u8]) -> Option<String> {
    let first = *bytes.first()?;
    let mut digits = String::new();

    let first_digit = (first >> 4) & 0x0F;
    if first_digit <= 9 {
        digits.push(char::from(b'0' + first_digit));
    }

    'outer: for &byte in &bytes[1..] {
        for nibble in [byte & 0x0F, (byte >> 4) & 0x0F] {
            if nibble > 9 {
                break 'outer;
            }
            digits.push(char::from(b'0' + nibble));
        }
    }

    if digits.len() < 5 || digits.len() > 16 {
        return None;
    }
    if digits.bytes().all(|b| b == b'0') {
        return None;
    }
    Some(digits)
}

/// Render the four identity bytes following the type byte as a TMSI.
fn decode_tmsi_value(bytes: &[u8]) -> Option<String> {
    let tmsi_bytes = bytes.get(1..5)?;
    let tmsi = to_hex(tmsi_bytes);
    is_valid_tmsi(&tmsi).then_some(tmsi)
}

/// Decode a Mobile Identity value (IMSI/IMEI/IMEISV/TMSI).
pub fn decode_mobile_identity(bytes: &[u8]) -> Option<MobileIdentity> {
    let first = *bytes.first()?;
    let kind = MobileIdentityType::from_bits(first & 0x07);

    let value = match kind {
        MobileIdentityType::Imsi | MobileIdentityType::Imei | MobileIdentityType::Imeisv => {
            decode_tbcd_digits(bytes)?
        }
        MobileIdentityType::Tmsi => decode_tmsi_value(bytes)?,
        _ => return None,
    };

    Some(MobileIdentity {
        kind,
        value,
        low_confidence: false,
    })
}

/// Decode an EPS Mobile Identity value (GUTI or mapped identities).
///
/// A GUTI carries the MME identifier followed by a 4-byte m-TMSI at the
/// tail; the m-TMSI is surfaced as a TMSI.
pub fn decode_eps_mobile_identity(bytes: &[u8]) -> Option<MobileIdentity> {
    let first = *bytes.first()?;
    match MobileIdentityType::from_bits(first & 0x07) {
        MobileIdentityType::Guti => {
            if bytes.len() < 5 {
                return None;
            }
            let m_tmsi = to_hex(&bytes[bytes.len() - 4..]);
            is_valid_tmsi(&m_tmsi).then_some(MobileIdentity {
                kind: MobileIdentityType::Tmsi,
                value: m_tmsi,
                low_confidence: false,
            })
        }
        MobileIdentityType::Tmsi => decode_tmsi_value(bytes).map(|value| MobileIdentity {
            kind: MobileIdentityType::Tmsi,
            value,
            low_confidence: false,
        }),
        MobileIdentityType::Imsi => decode_tbcd_digits(bytes).map(|value| MobileIdentity {
            kind: MobileIdentityType::Imsi,
            value,
            low_confidence: false,
        }),
        _ => None,
    }
}

/// IMSI validity: 5..=15 decimal digits, not all zeros.
pub fn is_valid_imsi(imsi: &str) -> bool {
    (5..=15).contains(&imsi.len())
        && imsi.bytes().all(|b| b.is_ascii_digit())
        && !imsi.bytes().all(|b| b == b'0')
}

/// TMSI validity: 4..=8 hex digits, not all zeros.
pub fn is_valid_tmsi(tmsi: &str) -> bool {
    (4..=8).contains(&tmsi.len())
        && tmsi.bytes().all(|b| b.is_ascii_hexdigit())
        && !tmsi.bytes().all(|b| b == b'0')
}

// ---------------------------------------------------------------------------
// Message dispatch
// ---------------------------------------------------------------------------

/// Decode every mobile identity carried by a NAS PDU.
///
/// Plain EMM messages are dispatched per message type; protected messages go
/// through the best-effort ciphered path.
pub fn decode_identities(pdu: &[u8]) -> Vec<MobileIdentity> {
    let mut identities = Vec::new();
    if pdu.len() < 2 {
        return identities;
    }
    let Some(header) = parse_header(pdu) else {
        return identities;
    };

    if header.security.is_protected() {
        decode_ciphered(pdu, &mut identities);
        return identities;
    }

    if header.protocol_discriminator != PD_EMM {
        debug!(
            "nas: skipping protocol discriminator {}",
            header.protocol_discriminator
        );
        return identities;
    }

    decode_plain_emm(pdu, header.message_type, &mut identities);
    identities
}

/// Dispatch a plain EMM message body (starting at the byte after the
/// message type, i.e. offset 2).
fn decode_plain_emm(pdu: &[u8], message_type: u8, out: &mut Vec<MobileIdentity>) {
    let mut offset = 2usize;
    if offset >= pdu.len() {
        return;
    }

    match message_type {
        MSG_ATTACH_REQUEST => {
            // EPS attach type + NAS key set identifier share one byte.
            offset += 1;
            if let Some((identity_bytes, _)) = read_lv(pdu, offset) {
                let first_bits = identity_bytes.first().map(|b| b & 0x07);
                let identity = if first_bits == Some(1) {
                    decode_mobile_identity(identity_bytes)
                } else {
                    decode_eps_mobile_identity(identity_bytes)
                };
                out.extend(identity);
            }
        }

        MSG_ATTACH_ACCEPT => {
            // EPS attach result (1) + T3412 (1).
            offset += 2;
            // TAI list, LV.
            let Some((_, next)) = read_lv(pdu, offset) else {
                return;
            };
            offset = next;
            // ESM message container, LV-E (2-byte length).
            let Some(len_bytes) = pdu.get(offset..offset + 2) else {
                return;
            };
            let esm_len = usize::from(u16::from_be_bytes([len_bytes[0], len_bytes[1]]));
            offset += 2;
            if offset + esm_len > pdu.len() {
                return;
            }
            offset += esm_len;
            decode_tlv_tail(pdu, offset, out);
        }

        MSG_IDENTITY_RESPONSE => {
            // Mobile identity, optionally preceded by IEI 0x02.
            if pdu.get(offset) == Some(&0x02) {
                offset += 1;
            }
            if let Some((identity_bytes, _)) = read_lv(pdu, offset) {
                out.extend(decode_mobile_identity(identity_bytes));
            }
        }

        MSG_EXTENDED_SERVICE_REQUEST => {
            // Service type + NAS key set identifier share one byte.
            offset += 1;
            if let Some((identity_bytes, _)) = read_lv(pdu, offset) {
                out.extend(decode_eps_mobile_identity(identity_bytes));
            }
        }

        MSG_SECURITY_MODE_COMPLETE => {
            decode_tlv_tail(pdu, offset, out);
        }

        other => {
            debug!("nas: unhandled EMM message type 0x{other:02x}");
        }
    }
}

/// Read an LV field: one length byte then that many value bytes. Returns the
/// value slice and the offset just past it.
fn read_lv(pdu: &[u8], offset: usize) -> Option<(&[u8], usize)> {
    let len = usize::from(*pdu.get(offset)?);
    let start = offset + 1;
    let value = pdu.get(start..start + len)?;
    Some((value, start + len))
}

/// Walk a TLV tail, decoding the identity-bearing IEIs and skipping the
/// rest. IEI 0x00 ends the walk (padding).
fn decode_tlv_tail(pdu: &[u8], mut offset: usize, out: &mut Vec<MobileIdentity>) {
    while offset < pdu.len() {
        let iei = pdu[offset];
        offset += 1;
        if iei == 0x00 {
            break;
        }
        let Some((value, next)) = read_lv(pdu, offset) else {
            break;
        };
        match iei {
            IEI_MOBILE_IDENTITY => out.extend(decode_mobile_identity(value)),
            IEI_ADDITIONAL_GUTI => out.extend(decode_eps_mobile_identity(value)),
            other => debug!("nas: skipping IEI 0x{other:02x} ({} bytes)", value.len()),
        }
        offset = next;
    }
}

/// Best-effort extraction from a protected message's ciphered payload.
///
/// Two heuristics: a `{0x50, 0x0b, 0xf6}` marker whose TMSI sits 7 bytes
/// after the marker's last byte, and a payload that begins with a plain NAS
/// EMM header (0x07) and is then parsed as a plain message once.
fn decode_ciphered(pdu: &[u8], out: &mut Vec<MobileIdentity>) {
    const MARKER: [u8; 3] = [0x50, 0x0b, 0xf6];
    const TMSI_GAP: usize = 7;

    let Some(ciphered) = pdu.get(6..) else {
        return;
    };
    if ciphered.is_empty() {
        return;
    }

    for start in 0..ciphered.len() {
        if ciphered.get(start..start + MARKER.len()) != Some(&MARKER[..]) {
            continue;
        }
        // The candidate sits 7 bytes after the marker's last byte.
        let tmsi_start = start + MARKER.len() - 1 + TMSI_GAP;
        if let Some(tmsi_bytes) = ciphered.get(tmsi_start..tmsi_start + 4) {
            let tmsi = to_hex(tmsi_bytes);
            if is_valid_tmsi(&tmsi) {
                warn!("nas: low-confidence TMSI {tmsi} from ciphered payload marker");
                out.push(MobileIdentity {
                    kind: MobileIdentityType::Tmsi,
                    value: tmsi,
                    low_confidence: true,
                });
            }
        }
    }
    if !out.is_empty() {
        return;
    }

    // Some captures carry an effectively-plain inner message. One attempt,
    // no recursion.
    if ciphered.first() == Some(&0x07) && ciphered.len() >= 2 {
        let message_type = ciphered[1];
        decode_plain_emm(ciphered, message_type, out);
    }
}

// ---------------------------------------------------------------------------
// Decode log
// ---------------------------------------------------------------------------

/// EMM message-type names (TS 24.301 §9.8), for the decode log.
pub fn message_type_name(message_type: u8) -> &'static str {
    match message_type {
        0x41 => "Attach Request",
        0x42 => "Attach Accept",
        0x44 => "Attach Reject",
        0x43 => "Attach Complete",
        0x45 => "Detach Request",
        0x46 => "Detach Accept",
        0x48 => "Tracking Area Update Request",
        0x49 => "Tracking Area Update Accept",
        0x4A => "Tracking Area Update Complete",
        0x4B => "Tracking Area Update Reject",
        0x4D => "Extended Service Request",
        0x4E => "Service Reject",
        0x50 => "GUTI Reallocation Command",
        0x51 => "GUTI Reallocation Complete",
        0x52 => "Authentication Request",
        0x53 => "Authentication Response",
        0x54 => "Authentication Reject",
        0x5C => "Authentication Failure",
        0x55 => "Identity Request",
        0x56 => "Identity Response",
        0x5D => "Security Mode Command",
        0x5E => "Security Mode Complete",
        0x5F => "Security Mode Reject",
        0x60 => "EMM Status",
        0x61 => "EMM Information",
        0x62 => "Downlink NAS Transport",
        0x63 => "Uplink NAS Transport",
        _ => "Unknown EMM Message",
    }
}

fn security_header_name(security: SecurityHeaderType) -> &'static str {
    match security {
        SecurityHeaderType::PlainNas => "Plain NAS",
        SecurityHeaderType::IntegrityProtected => "Integrity Protected",
        SecurityHeaderType::IntegrityProtectedCiphered => "Integrity Protected and Ciphered",
        SecurityHeaderType::IntegrityProtectedNewContext => {
            "Integrity Protected with New Security Context"
        }
        SecurityHeaderType::IntegrityProtectedCipheredNewContext => {
            "Integrity Protected and Ciphered with New Security Context"
        }
        SecurityHeaderType::Other(_) => "Unknown",
    }
}

/// Human-readable decode log for one NAS PDU: header fields plus every
/// identity the dispatcher recovered.
pub fn describe(pdu: &[u8]) -> String {
    let mut log = String::new();
    let Some(header) = parse_header(pdu) else {
        log.push_str(&format!(
            "NAS message undecodable ({} bytes: {})\n",
            pdu.len(),
            to_hex(&pdu[..pdu.len().min(16)])
        ));
        return log;
    };

    log.push_str(&format!(
        "Security Header: {} ({:?})\n",
        security_header_name(header.security),
        header.security
    ));
    log.push_str(&format!(
        "Protocol Discriminator: {}\n",
        header.protocol_discriminator
    ));
    log.push_str(&format!(
        "Message Type: {} (0x{:02x})\n",
        message_type_name(header.message_type),
        header.message_type
    ));

    let identities = decode_identities(pdu);
    if identities.is_empty() {
        log.push_str("No identities found\n");
    } else {
        for identity in identities {
            log.push_str(&format!(
                "Identity: {:?} = {}{}\n",
                identity.kind,
                identity.value,
                if identity.low_confidence {
                    " (low confidence)"
                } else {
                    ""
                }
            ));
        }
    }
    log
}

// ---------------------------------------------------------------------------
// Typed extractors
// ---------------------------------------------------------------------------

/// All valid IMSIs in a NAS PDU.
pub fn extract_imsis(pdu: &[u8]) -> Vec<String> {
    decode_identities(pdu)
        .into_iter()
        .filter(|id| id.kind == MobileIdentityType::Imsi && is_valid_imsi(&id.value))
        .map(|id| id.value)
        .collect()
}

/// All valid TMSIs in a NAS PDU (including GUTI m-TMSIs and low-confidence
/// ciphered extractions).
pub fn extract_tmsis(pdu: &[u8]) -> Vec<String> {
    decode_identities(pdu)
        .into_iter()
        .filter(|id| id.kind == MobileIdentityType::Tmsi && is_valid_tmsi(&id.value))
        .map(|id| id.value)
        .collect()
}

/// All IMEISVs in a NAS PDU.
pub fn extract_imeisvs(pdu: &[u8]) -> Vec<String> {
    decode_identities(pdu)
        .into_iter()
        .filter(|id| id.kind == MobileIdentityType::Imeisv)
        .map(|id| id.value)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_header_plain() {
        let header = parse_header(&[0x07, 0x41]).unwrap();
        assert_eq!(header.security, SecurityHeaderType::PlainNas);
        assert_eq!(header.protocol_discriminator, 7);
        assert_eq!(header.message_type, 0x41);
        assert_eq!(header.payload_offset, 1);
    }

    #[test]
    fn test_header_protected() {
        let pdu = [0x27, 0xaa, 0xbb, 0xcc, 0xdd, 0x05, 0x07];
        let header = parse_header(&pdu).unwrap();
        assert!(header.security.is_protected());
        assert_eq!(header.payload_offset, 6);
        assert_eq!(header.message_type, 0x07);
    }

    #[test]
    fn test_header_too_short() {
        assert!(parse_header(&[]).is_none());
        // Protected header but only 3 bytes.
        assert!(parse_header(&[0x27, 0x00, 0x00]).is_none());
    }

    #[test]
    fn test_tbcd_odd_imsi() {
        // 15 digits, odd count.
        let identity = tbcd_identity("123456789012345", 1);
        let decoded = decode_mobile_identity(&identity).unwrap();
        assert_eq!(decoded.kind, MobileIdentityType::Imsi);
        assert_eq!(decoded.value, "123456789012345");
    }

    #[test]
    fn test_tbcd_even_digits_with_filler() {
        // 6 digits: filler 0xF in the final high nibble terminates.
        let identity = tbcd_identity("123456", 1);
        let decoded = decode_mobile_identity(&identity).unwrap();
        assert_eq!(decoded.value, "123456");
    }

    #[test]
    fn test_imsi_too_short_rejected() {
        let identity = tbcd_identity("1234", 1);
        assert!(decode_mobile_identity(&identity).is_none());
    }

    #[test]
    fn test_imsi_all_zero_rejected() {
        let identity = tbcd_identity("00000", 1);
        assert!(decode_mobile_identity(&identity).is_none());
    }

    #[test]
    fn test_imeisv_sixteen_digits() {
        let identity = tbcd_identity("3512340912345678", 3);
        let decoded = decode_mobile_identity(&identity).unwrap();
        assert_eq!(decoded.kind, MobileIdentityType::Imeisv);
        assert_eq!(decoded.value, "3512340912345678");
    }

    #[test]
    fn test_tmsi_four_bytes_after_type_byte() {
        let identity = [0xF4, 0xDE, 0xAD, 0xBE, 0xEF];
        let decoded = decode_mobile_identity(&identity).unwrap();
        assert_eq!(decoded.kind, MobileIdentityType::Tmsi);
        assert_eq!(decoded.value, "deadbeef");
    }

    #[test]
    fn test_tmsi_truncated_rejected() {
        assert!(decode_mobile_identity(&[0xF4, 0xDE, 0xAD]).is_none());
    }

    #[test]
    fn test_guti_m_tmsi_tail() {
        // Type byte (GUTI=6), mock MME identifier, then 4-byte m-TMSI.
        let mut guti = vec![0xF6, 0x12, 0xF3, 0x40, 0x12, 0x34];
        guti.extend_from_slice(&[0xCA, 0xFE, 0xBA, 0xBE]);
        let decoded = decode_eps_mobile_identity(&guti).unwrap();
        assert_eq!(decoded.kind, MobileIdentityType::Tmsi);
        assert_eq!(decoded.value, "cafebabe");
    }

    #[test]
    fn test_attach_request_imsi() {
        let pdu = attach_request_with_imsi("123456789012345");
        assert_eq!(extract_imsis(&pdu), vec!["123456789012345".to_string()]);
    }

    #[test]
    fn test_identity_response_with_and_without_iei() {
        let identity = tbcd_identity("310150123456789", 1);

        let without = identity_response(&identity);
        assert_eq!(extract_imsis(&without), vec!["310150123456789".to_string()]);

        let mut with = vec![0x07, 0x56, 0x02];
        with.push(identity.len() as u8);
        with.extend_from_slice(&identity);
        assert_eq!(extract_imsis(&with), vec!["310150123456789".to_string()]);
    }

    #[test]
    fn test_security_mode_complete_imeisv() {
        let identity = tbcd_identity("3512340912345678", 3);
        let mut pdu = vec![0x07, 0x5E, IEI_MOBILE_IDENTITY];
        pdu.push(identity.len() as u8);
        pdu.extend_from_slice(&identity);
        assert_eq!(extract_imeisvs(&pdu), vec!["3512340912345678".to_string()]);
    }

    #[test]
    fn test_attach_accept_additional_guti() {
        let mut guti = vec![0xF6, 0x12, 0xF3, 0x40, 0x12, 0x34];
        guti.extend_from_slice(&[0x11, 0x22, 0x33, 0x44]);

        let mut pdu = vec![0x07, 0x42];
        pdu.push(0x02); // attach result
        pdu.push(0x21); // T3412
        pdu.extend_from_slice(&[0x06, 0, 0, 0, 0, 0, 0]); // TAI list, LV
        pdu.extend_from_slice(&[0x00, 0x03, 0x52, 0x01, 0xC1]); // ESM, LV-E
        pdu.push(IEI_ADDITIONAL_GUTI);
        pdu.push(guti.len() as u8);
        pdu.extend_from_slice(&guti);

        assert_eq!(extract_tmsis(&pdu), vec!["11223344".to_string()]);
    }

    #[test]
    fn test_extended_service_request_tmsi() {
        let identity = [0xF4, 0xAB, 0xCD, 0xEF, 0x01];
        let mut pdu = vec![0x07, 0x4D, 0x01];
        pdu.push(identity.len() as u8);
        pdu.extend_from_slice(&identity);
        assert_eq!(extract_tmsis(&pdu), vec!["abcdef01".to_string()]);
    }

    #[test]
    fn test_ciphered_marker_tmsi_low_confidence() {
        // Security header type 2: header + MAC + seq, then ciphered bytes.
        let mut pdu = vec![0x27, 0x01, 0x02, 0x03, 0x04, 0x1A];
        pdu.extend_from_slice(&[0x50, 0x0b, 0xf6]); // marker ends at index 2
        pdu.extend_from_slice(&[0u8; 6]); // indexes 3..9
        pdu.extend_from_slice(&[0x12, 0x34, 0x56, 0x78]); // candidate at index 9

        let identities = decode_identities(&pdu);
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].value, "12345678");
        assert!(identities[0].low_confidence);
    }

    #[test]
    fn test_ciphered_plain_looking_payload_parsed_once() {
        let inner = attach_request_with_imsi("123456789012345");
        let mut pdu = vec![0x27, 0x01, 0x02, 0x03, 0x04, 0x1A];
        pdu.extend_from_slice(&inner);
        assert_eq!(extract_imsis(&pdu), vec!["123456789012345".to_string()]);
    }

    #[test]
    fn test_non_emm_discriminator_ignored() {
        // ESM (discriminator 2) is not decoded.
        let pdu = [0x02, 0x41, 0x08, 0x19, 0x32, 0x54, 0x76, 0x98, 0x10, 0x32];
        assert!(decode_identities(&pdu).is_empty());
    }

    #[test]
    fn test_empty_and_tiny_input() {
        assert!(decode_identities(&[]).is_empty());
        assert!(decode_identities(&[0x07]).is_empty());
    }

    #[test]
    fn test_describe_plain_attach() {
        let pdu = attach_request_with_imsi("123456789012345");
        let log = describe(&pdu);
        assert!(log.contains("Plain NAS"));
        assert!(log.contains("Attach Request"));
        assert!(log.contains("123456789012345"));
    }

    #[test]
    fn test_describe_undecodable() {
        let log = describe(&[]);
        assert!(log.contains("undecodable"));
    }

    #[test]
    fn test_message_type_names() {
        assert_eq!(message_type_name(0x41), "Attach Request");
        assert_eq!(message_type_name(0x56), "Identity Response");
        assert_eq!(message_type_name(0x5E), "Security Mode Complete");
        assert_eq!(message_type_name(0x00), "Unknown EMM Message");
    }

    #[test]
    fn test_validators() {
        assert!(is_valid_imsi("12345"));
        assert!(is_valid_imsi("123456789012345"));
        assert!(!is_valid_imsi("1234"));
        assert!(!is_valid_imsi("0000000"));
        assert!(!is_valid_imsi("12a45"));
        assert!(is_valid_tmsi("abcd"));
        assert!(is_valid_tmsi("deadbeef"));
        assert!(!is_valid_tmsi("abc"));
        assert!(!is_valid_tmsi("deadbeef0"));
        assert!(!is_valid_tmsi("ghij"));
        assert!(!is_valid_tmsi("00000000"));
    }
}
