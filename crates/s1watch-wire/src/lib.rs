//! # s1watch-wire
//!
//! Binary decoders for captured LTE S1 control-plane signalling.
//!
//! This crate turns raw captured frames into [`canonical::CanonicalMessage`]
//! values, in four layers:
//!
//! - **sctp**: strips Ethernet/VLAN/IPv4·IPv6/SCTP framing and yields the
//!   user data of DATA chunks carrying S1AP (payload protocol id 18)
//! - **s1ap**: decodes 3GPP TS 36.413 PDUs (Aligned PER), producing a
//!   procedure code, PDU variant, and a map of information elements keyed by
//!   their canonical names
//! - **nas**: decodes 3GPP TS 24.301 EMM messages found inside S1AP NAS-PDU
//!   information elements and extracts IMSI/TMSI/IMEISV mobile identities
//! - **canonical**: combines the above into one normalised message carrying
//!   the raw bytes, a JSON decode tree, the message-type name, and every
//!   extracted identifier
//!
//! Decoding is parse-only and total: malformed input produces a message with
//! `decode_failed` set and the raw bytes retained, never a panic.
//!
//! ## Quick start
//!
//! ```rust
//! use s1watch_wire::canonical::decode_to_canonical;
//!
//! // Truncated garbage still yields a canonical message.
//! let msg = decode_to_canonical(&[0xff]);
//! assert!(msg.decode_failed);
//! assert_eq!(msg.raw_bytes, vec![0xff]);
//! ```

pub mod canonical;
pub mod error;
pub mod hex;
pub mod nas;
pub mod pcap;
pub mod s1ap;
pub mod sctp;

pub use canonical::{CanonicalMessage, decode_to_canonical};
pub use error::{Result, WireError};
