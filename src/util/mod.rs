//! # Utility Modules
//!
//! Small helpers shared across the crate. Currently only hex formatting of
//! checksums and raw frames.

pub mod hex;

pub use hex::{decode_checksum, encode_checksum, format_hex_compact, HexError};
