//! Classic pcap file reading for replaying captures into the pipeline.
//!
//! Supports the microsecond (0xA1B2C3D4) and nanosecond (0xA1B23C4D) magic
//! numbers in both byte orders. Only the legacy format is handled; pcapng
//! captures should be converted first.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::info;

use crate::error::{Result, WireError};

const MAGIC_MICROS: u32 = 0xA1B2_C3D4;
const MAGIC_NANOS: u32 = 0xA1B2_3C4D;

/// One captured packet.
#[derive(Debug, Clone)]
pub struct PcapPacket {
    pub timestamp_sec: u32,
    /// Sub-second part in the file's native resolution (µs or ns).
    pub timestamp_subsec: u32,
    pub original_len: u32,
    /// 1-indexed position within the capture.
    pub frame_number: i64,
    pub data: Vec<u8>,
}

struct ByteOrder {
    swapped: bool,
}

impl ByteOrder {
    fn u32(&self, bytes: [u8; 4]) -> u32 {
        if self.swapped {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        }
    }
}

fn read_u32<R: Read>(reader: &mut R, order: &ByteOrder) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(order.u32(buf))
}

/// Read a pcap file, invoking `packet_callback` per packet in capture order.
///
/// Returns the number of packets read. A truncated final record is an
/// error; everything read before it has already been delivered.
pub fn read_pcap_file(
    path: &Path,
    mut packet_callback: impl FnMut(&PcapPacket),
) -> Result<usize> {
    let mut reader = BufReader::new(File::open(path)?);

    let mut magic_bytes = [0u8; 4];
    reader.read_exact(&mut magic_bytes)?;
    let magic_le = u32::from_le_bytes(magic_bytes);
    let magic_be = u32::from_be_bytes(magic_bytes);

    let order = if magic_le == MAGIC_MICROS || magic_le == MAGIC_NANOS {
        ByteOrder { swapped: false }
    } else if magic_be == MAGIC_MICROS || magic_be == MAGIC_NANOS {
        ByteOrder { swapped: true }
    } else {
        return Err(WireError::BadPcapMagic(magic_le));
    };

    // Version, thiszone, sigfigs, snaplen, linktype.
    let mut header_rest = [0u8; 20];
    reader.read_exact(&mut header_rest)?;

    let mut count = 0usize;
    loop {
        let ts_sec = match read_u32(&mut reader, &order) {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        let ts_subsec = read_u32(&mut reader, &order)
            .map_err(|_| WireError::TruncatedPcap(count + 1))?;
        let captured_len = read_u32(&mut reader, &order)
            .map_err(|_| WireError::TruncatedPcap(count + 1))?;
        let original_len = read_u32(&mut reader, &order)
            .map_err(|_| WireError::TruncatedPcap(count + 1))?;

        let mut data = vec![0u8; captured_len as usize];
        reader
            .read_exact(&mut data)
            .map_err(|_| WireError::TruncatedPcap(count + 1))?;

        count += 1;
        packet_callback(&PcapPacket {
            timestamp_sec: ts_sec,
            timestamp_subsec: ts_subsec,
            original_len,
            frame_number: count as i64,
            data,
        });
    }

    info!("pcap: read {count} packet(s) from {}", path.display());
    Ok(count)
}
