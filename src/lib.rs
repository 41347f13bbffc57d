//! # ctlab-rs - A Rust Crate for the c't-Lab Instrument Bus
//!
//! c't-Lab modules (power supplies, electronic loads, DDS generators, I/O boards)
//! share one serial line. Each module has a bus index 0..=8 and answers ASCII
//! commands framed as `"<index>:<command>!$<xor>\r"`.
//!
//! ## Features
//!
//! - Build and check checksummed request frames
//! - Extract device, status and value fields from answer lines
//! - Send commands with status checking, retry on checksum errors, and echo detection
//! - Scan the bus and map module roles (`dcg`, `ada`, ...) to their bus index
//! - Typed accessors for common instrument commands
//! - Dump and restore DCG2 calibration registers as JSON
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! ctlab-rs = "0.1.0"
//! ```
//!
//! ```rust
//! use ctlab_rs::{
//!     connect, Ctlab, CtlabError, CommandEngine, DeviceSlot, DeviceDirectory,
//!     init_logger, log_info,
//! };
//! ```

pub mod calibration;
pub mod constants;
pub mod ctlab;
pub mod device_directory;
pub mod error;
pub mod lab;
pub mod logging;
pub mod util;

pub use crate::error::CtlabError;
pub use crate::logging::{init_logger, log_debug, log_info, log_warn};

// Protocol core
pub use ctlab::{
    build_frame, decode_frame, parse_value, xor_checksum, CommandEngine, EngineConfig,
    MockTransport, ParsedResponse, ProtocolPolicy, Request, RetryPolicy, SerialConfig,
    SerialTransport, Transport,
};

pub use calibration::{CalibrationSnapshot, RegisterEntry, RegisterValue};
pub use device_directory::{DeviceDirectory, DeviceSlot, ScanRecord};
pub use lab::Ctlab;

/// Opens a c't-Lab chain on a serial port and scans it.
///
/// # Arguments
/// * `port` - Serial port path (e.g., "/dev/ttyUSB0" on Linux, "COM3" on Windows)
/// * `verbose` - Log a scan report at info level
///
/// # Returns
/// * `Ok(Ctlab)` - Connection with its device directory filled
/// * `Err(CtlabError)` - Opening the port or the scan failed
pub async fn connect(port: &str, verbose: bool) -> Result<Ctlab<SerialTransport>, CtlabError> {
    let mut lab = Ctlab::open(port)?;
    lab.discover(verbose).await?;
    Ok(lab)
}
