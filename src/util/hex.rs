//! # Hex Helpers
//!
//! The c't-Lab wire format carries its checksum as two lowercase hex digits, and
//! frame logging shows raw bytes as a compact hex dump. Both go through the `hex`
//! crate so the encoding is identical everywhere.
//!
//! ```rust
//! use ctlab_rs::util::hex::{decode_checksum, encode_checksum, format_hex_compact};
//!
//! assert_eq!(encode_checksum(0x0a), "0a");
//! assert_eq!(decode_checksum("3F").unwrap(), 0x3f);
//! assert_eq!(format_hex_compact(b"0:"), "30 3a");
//! ```

use thiserror::Error;

/// Errors that can occur during hex operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("Invalid hex character: {0}")]
    InvalidCharacter(char),

    #[error("Expected {expected} hex characters, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("Hex decoding error: {0}")]
    DecodeError(String),
}

/// Encode a checksum byte as the two lowercase hex digits used on the wire.
pub fn encode_checksum(checksum: u8) -> String {
    hex::encode([checksum])
}

/// Decode a two-digit checksum field. Either case is accepted.
pub fn decode_checksum(digits: &str) -> Result<u8, HexError> {
    if digits.len() != 2 {
        return Err(HexError::WrongLength {
            expected: 2,
            actual: digits.len(),
        });
    }
    if let Some(c) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(HexError::InvalidCharacter(c));
    }

    let mut out = [0u8; 1];
    hex::decode_to_slice(digits, &mut out).map_err(|e| HexError::DecodeError(e.to_string()))?;
    Ok(out[0])
}

/// Format hex data for compact display (useful for logs)
///
/// Formats data as "30 3a 69" with spaces between bytes.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| hex::encode([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}
