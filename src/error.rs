//! # c't-Lab Error Handling
//!
//! This module defines the CtlabError enum, which represents the different error
//! types that can occur in the ctlab-rs crate.

use thiserror::Error;

/// Represents the different error types that can occur in the c't-Lab crate.
#[derive(Debug, Error)]
pub enum CtlabError {
    /// Indicates an error related to the serial port communication.
    #[error("Serial port error: {0}")]
    SerialPortError(String),

    /// Indicates a request frame that could not be decoded.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Indicates a checksum mismatch in a request frame.
    #[error("Invalid checksum: expected 0x{expected:02x}, calculated 0x{calculated:02x}")]
    InvalidChecksum { expected: u8, calculated: u8 },

    /// A device index outside the addressable range 0..=8.
    #[error("Invalid device index: {0}")]
    InvalidDeviceIndex(u8),

    /// The response did not carry a usable `=value` payload.
    #[error("Malformed value in response '{response}': {reason}")]
    MalformedValue { response: String, reason: String },

    /// The device answered with a status the policy treats as fatal.
    #[error("Device {device} rejected command '{command}' with status {status}")]
    StatusRejected {
        device: u8,
        command: String,
        status: String,
    },

    /// The retry policy gave up on a command.
    #[error("Command '{command}' failed after {attempts} attempts (last response: {last_response:?})")]
    RetriesExhausted {
        command: String,
        attempts: u32,
        last_response: Option<String>,
    },

    /// No inbound data arrived before the response deadline.
    #[error("No response to '{command}' within {timeout_ms} ms")]
    ResponseTimeout { command: String, timeout_ms: u64 },

    /// A typed accessor was used for a device that discovery did not find.
    #[error("No {0} device found on the bus")]
    SlotUnassigned(String),

    /// Errors reading or writing calibration snapshots.
    #[error("Calibration error: {0}")]
    Calibration(String),

    /// A catch‑all error for uncategorized cases.
    #[error("Other error: {0}")]
    Other(String),
}

impl From<std::io::Error> for CtlabError {
    fn from(e: std::io::Error) -> Self {
        CtlabError::SerialPortError(e.to_string())
    }
}

impl From<serde_json::Error> for CtlabError {
    fn from(e: serde_json::Error) -> Self {
        CtlabError::Calibration(e.to_string())
    }
}
