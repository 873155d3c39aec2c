//! Lowercase-hex helpers shared by the decoders.
//!
//! Information element values travel through the decode pipeline as
//! lowercase hex strings, so both directions are needed in several places.

/// Render bytes as a lowercase hex string.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Decode a hex string into bytes.
///
/// Whitespace and `:`/`-` separators are tolerated; invalid pairs and any
/// trailing odd nibble are skipped rather than failing the whole value.
pub fn from_hex(hex: &str) -> Vec<u8> {
    let clean: Vec<u8> = hex
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':' && *b != b'-')
        .collect();

    let mut out = Vec::with_capacity(clean.len() / 2);
    for pair in clean.chunks_exact(2) {
        let hi = (pair[0] as char).to_digit(16);
        let lo = (pair[1] as char).to_digit(16);
        if let (Some(hi), Some(lo)) = (hi, lo) {
            out.push(((hi << 4) | lo) as u8);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let bytes = vec![0x00, 0x0a, 0xff, 0x42];
        assert_eq!(from_hex(&to_hex(&bytes)), bytes);
    }

    #[test]
    fn test_to_hex_lowercase() {
        assert_eq!(to_hex(&[0xAB, 0xCD]), "abcd");
    }

    #[test]
    fn test_from_hex_separators() {
        assert_eq!(from_hex("0a:0b-0c 0d"), vec![0x0a, 0x0b, 0x0c, 0x0d]);
    }

    #[test]
    fn test_from_hex_odd_tail_dropped() {
        assert_eq!(from_hex("0af"), vec![0x0a]);
    }

    #[test]
    fn test_from_hex_empty() {
        assert!(from_hex("").is_empty());
    }
}
