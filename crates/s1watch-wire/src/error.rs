//! Wire-level error types.
//!
//! Most decoders in this crate are total functions (bad input yields a
//! `decode_failed` result rather than an error); `WireError` covers the
//! places where an operation genuinely fails, such as reading a capture file.

use thiserror::Error;

/// Errors produced while reading or decoding captured input.
#[derive(Debug, Error)]
pub enum WireError {
    /// An I/O failure while reading a capture file.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A capture file did not start with a known pcap magic number.
    #[error("not a pcap file: magic 0x{0:08x}")]
    BadPcapMagic(u32),

    /// A capture file ended in the middle of a record.
    #[error("truncated pcap record at packet {0}")]
    TruncatedPcap(usize),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, WireError>;
