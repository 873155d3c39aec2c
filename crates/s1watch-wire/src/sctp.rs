//! SCTP extraction: captured frame in, S1AP payloads out.
//!
//! Walks Ethernet (with at most one VLAN tag), IPv4 or IPv6 (with a bounded
//! number of extension headers), and the SCTP chunk list, yielding the user
//! data of every DATA chunk whose payload protocol identifier is 18 (S1AP).
//!
//! Every path is bounds-checked; malformed framing yields an empty result.

use log::trace;

/// IP protocol number for SCTP.
const IP_PROTO_SCTP: u8 = 132;

/// SCTP chunk type for DATA.
const SCTP_CHUNK_DATA: u8 = 0;

/// Payload protocol identifier assigned to S1AP.
const PPID_S1AP: u32 = 18;

/// SCTP common header length.
const SCTP_HEADER_LEN: usize = 12;

/// Fixed part of a DATA chunk: type, flags, length, TSN, stream id,
/// stream seq, PPID.
const DATA_CHUNK_HEADER_LEN: usize = 16;

fn read_u16(packet: &[u8], at: usize) -> Option<u16> {
    let bytes = packet.get(at..at + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_u32(packet: &[u8], at: usize) -> Option<u32> {
    let bytes = packet.get(at..at + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Find the byte offset of the SCTP common header, or `None` when the frame
/// is not an Ethernet/IP/SCTP packet.
fn sctp_offset(packet: &[u8]) -> Option<usize> {
    if packet.len() < 14 {
        return None;
    }

    let mut ethertype = read_u16(packet, 12)?;
    let mut offset = 14usize;

    // One 802.1Q / 802.1ad tag at most.
    if ethertype == 0x8100 || ethertype == 0x88A8 {
        ethertype = read_u16(packet, offset + 2)?;
        offset += 4;
    }

    let protocol;
    match ethertype {
        // IPv4
        0x0800 => {
            let ver_ihl = *packet.get(offset)?;
            if ver_ihl >> 4 != 4 {
                return None;
            }
            let header_len = usize::from(ver_ihl & 0x0F) * 4;
            if header_len < 20 || packet.len() < offset + header_len {
                return None;
            }
            protocol = *packet.get(offset + 9)?;
            offset += header_len;
        }
        // IPv6
        0x86DD => {
            if packet.len() < offset + 40 {
                return None;
            }
            if *packet.get(offset)? >> 4 != 6 {
                return None;
            }
            let mut next_header = *packet.get(offset + 6)?;
            offset += 40;

            // Hop-by-hop, routing, fragment, destination options.
            let mut ext_headers = 0;
            while next_header != IP_PROTO_SCTP && ext_headers < 8 && offset < packet.len() {
                match next_header {
                    0 | 43 | 44 | 60 => {
                        let ext_len = *packet.get(offset + 1)?;
                        let header_len = (usize::from(ext_len) + 1) * 8;
                        if packet.len() < offset + header_len {
                            return None;
                        }
                        next_header = *packet.get(offset)?;
                        offset += header_len;
                        ext_headers += 1;
                    }
                    _ => break,
                }
            }
            protocol = next_header;
        }
        _ => return None,
    }

    if protocol != IP_PROTO_SCTP {
        return None;
    }
    if packet.len() < offset + SCTP_HEADER_LEN {
        return None;
    }
    Some(offset + SCTP_HEADER_LEN)
}

/// A parsed DATA chunk carrying S1AP, or the reason the chunk was skipped.
enum Chunk<'a> {
    S1ap(&'a [u8]),
    Other { data_chunk: bool },
}

/// Iterate the chunk list starting at `offset`, calling `visit` for each
/// chunk. `visit` returns `false` to stop early.
fn walk_chunks<'a>(packet: &'a [u8], mut offset: usize, mut visit: impl FnMut(Chunk<'a>) -> bool) {
    while offset + 4 <= packet.len() {
        let chunk_type = packet[offset];
        let chunk_len = match read_u16(packet, offset + 2) {
            Some(len) => usize::from(len),
            None => return,
        };
        if chunk_len < 4 || offset + chunk_len > packet.len() {
            return;
        }

        let chunk = if chunk_type == SCTP_CHUNK_DATA && chunk_len >= DATA_CHUNK_HEADER_LEN {
            match read_u32(packet, offset + 12) {
                Some(PPID_S1AP) => {
                    let payload = &packet[offset + DATA_CHUNK_HEADER_LEN..offset + chunk_len];
                    if payload.is_empty() {
                        // Zero-length user data: nothing to yield, keep walking.
                        Chunk::Other { data_chunk: false }
                    } else {
                        Chunk::S1ap(payload)
                    }
                }
                _ => Chunk::Other { data_chunk: true },
            }
        } else {
            Chunk::Other { data_chunk: false }
        };

        if !visit(chunk) {
            return;
        }

        // Chunks are padded to 4-byte alignment.
        let pad = (4 - chunk_len % 4) % 4;
        offset += chunk_len + pad;
    }
}

/// Extract the first S1AP payload from a captured frame.
///
/// Stops at the first DATA chunk: if that chunk carries a different payload
/// protocol, the frame yields nothing.
pub fn extract_first(packet: &[u8]) -> Option<Vec<u8>> {
    let offset = sctp_offset(packet)?;
    let mut found = None;
    walk_chunks(packet, offset, |chunk| match chunk {
        Chunk::S1ap(payload) => {
            found = Some(payload.to_vec());
            false
        }
        Chunk::Other { data_chunk } => !data_chunk,
    });
    found
}

/// Extract every S1AP payload from a captured frame, in chunk order.
pub fn extract_all(packet: &[u8]) -> Vec<Vec<u8>> {
    let mut payloads = Vec::new();
    let Some(offset) = sctp_offset(packet) else {
        return payloads;
    };
    walk_chunks(packet, offset, |chunk| {
        if let Chunk::S1ap(payload) = chunk {
            payloads.push(payload.to_vec());
        }
        true
    });
    trace!("sctp: extracted {} s1ap payload(s)", payloads.len());
    payloads
}


#[cfg(test)]
mod tests {
    use super::testutil::{data_chunk, ipv4_sctp_frame};
    use super::*;

    #[test]
    fn test_single_data_chunk() {
        let payload = vec![0x00, 0x0c, 0x00, 0x01];
        let frame = ipv4_sctp_frame(&data_chunk(PPID_S1AP, &payload));
        assert_eq!(extract_first(&frame), Some(payload.clone()));
        assert_eq!(extract_all(&frame), vec![payload]);
    }

    #[test]
    fn test_first_equals_head_of_all() {
        let a = vec![0x01, 0x02, 0x03, 0x04];
        let b = vec![0x05, 0x06, 0x07, 0x08];
        let mut chunks = data_chunk(PPID_S1AP, &a);
        chunks.extend_from_slice(&data_chunk(PPID_S1AP, &b));
        let frame = ipv4_sctp_frame(&chunks);

        let all = extract_all(&frame);
        assert_eq!(all.len(), 2);
        assert_eq!(extract_first(&frame).as_ref(), all.first());
    }

    #[test]
    fn test_wrong_ppid_stops_first_but_not_all() {
        let a = vec![0x01, 0x02, 0x03, 0x04];
        let b = vec![0x05, 0x06, 0x07, 0x08];
        let mut chunks = data_chunk(46, &a); // DATA but not S1AP
        chunks.extend_from_slice(&data_chunk(PPID_S1AP, &b));
        let frame = ipv4_sctp_frame(&chunks);

        assert_eq!(extract_first(&frame), None);
        assert_eq!(extract_all(&frame), vec![b]);
    }

    #[test]
    fn test_non_data_chunks_skipped() {
        let payload = vec![0xaa, 0xbb, 0xcc, 0xdd];
        // SACK chunk (type 3) before the DATA chunk.
        let mut chunks = vec![3, 0, 0, 8, 0, 0, 0, 0];
        chunks.extend_from_slice(&data_chunk(PPID_S1AP, &payload));
        let frame = ipv4_sctp_frame(&chunks);
        assert_eq!(extract_first(&frame), Some(payload));
    }

    #[test]
    fn test_vlan_tag() {
        let payload = vec![0x11, 0x22, 0x33, 0x44];
        let inner = ipv4_sctp_frame(&data_chunk(PPID_S1AP, &payload));
        // Re-frame with an 802.1Q tag inserted after the MACs.
        let mut frame = inner[..12].to_vec();
        frame.extend_from_slice(&[0x81, 0x00, 0x00, 0x64]);
        frame.extend_from_slice(&inner[12..]);
        assert_eq!(extract_first(&frame), Some(payload));
    }

    #[test]
    fn test_ipv6_with_extension_header() {
        let payload = vec![0xde, 0xad, 0xbe, 0xef];
        let chunks = data_chunk(PPID_S1AP, &payload);

        let mut frame = Vec::new();
        frame.extend_from_slice(&[0u8; 12]);
        frame.extend_from_slice(&[0x86, 0xDD]);
        frame.push(0x60); // version 6
        frame.extend_from_slice(&[0; 3]);
        let payload_len = 8 + SCTP_HEADER_LEN + chunks.len();
        frame.extend_from_slice(&(payload_len as u16).to_be_bytes());
        frame.push(60); // next header: destination options
        frame.push(64); // hop limit
        frame.extend_from_slice(&[0; 32]); // src + dst
        // Destination options header: next=SCTP, len=0 (8 bytes total).
        frame.push(IP_PROTO_SCTP);
        frame.push(0);
        frame.extend_from_slice(&[0; 6]);
        frame.extend_from_slice(&[0u8; SCTP_HEADER_LEN]);
        frame.extend_from_slice(&chunks);

        assert_eq!(extract_first(&frame), Some(payload));
    }

    #[test]
    fn test_not_ip() {
        let mut frame = vec![0u8; 14];
        frame[12] = 0x08;
        frame[13] = 0x06; // ARP
        assert_eq!(extract_first(&frame), None);
        assert!(extract_all(&frame).is_empty());
    }

    #[test]
    fn test_empty_and_truncated_input() {
        assert_eq!(extract_first(&[]), None);
        assert!(extract_all(&[]).is_empty());
        let frame = ipv4_sctp_frame(&data_chunk(PPID_S1AP, &[1, 2, 3, 4]));
        // Truncate inside the chunk list.
        assert!(extract_all(&frame[..frame.len() - 6]).is_empty());
    }

    #[test]
    fn test_not_sctp() {
        let mut frame = ipv4_sctp_frame(&data_chunk(PPID_S1AP, &[1, 2, 3, 4]));
        frame[23] = 6; // TCP
        assert_eq!(extract_first(&frame), None);
    }

    #[test]
    fn test_chunk_length_out_of_bounds() {
        // A chunk whose declared length overruns the frame yields nothing.
        let mut chunk = data_chunk(PPID_S1AP, &[1, 2, 3, 4]);
        chunk[3] = 0xff;
        let frame = ipv4_sctp_frame(&chunk);
        assert!(extract_all(&frame).is_empty());
    }
}
