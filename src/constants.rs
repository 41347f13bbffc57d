//! c't-Lab Protocol Constants
//!
//! Wire-level constants of the c't-Lab module bus: framing delimiters, the
//! default serial settings, and the addressable device range.

/// Highest addressable module index on the bus (indices are 0..=8).
pub const CTLAB_MAX_DEVICE_INDEX: u8 = 8;

/// Separates the device index from the command text.
pub const CTLAB_ADDRESS_DELIMITER: u8 = b':';

/// Terminates the command text; covered by the checksum.
pub const CTLAB_COMMAND_TERMINATOR: u8 = b'!';

/// Introduces the two hex digit checksum trailer.
pub const CTLAB_CHECKSUM_MARKER: u8 = b'$';

/// Ends every outgoing frame.
pub const CTLAB_FRAME_END: u8 = b'\r';

/// Ends every response line.
pub const CTLAB_LINE_END: u8 = b'\n';

/// Marker a module sends back when it rejected a frame's checksum.
pub const CTLAB_CHECKSUM_ERROR_MARKER: &str = "7 [CHKSUM]";

/// Status text of a successfully executed command.
pub const CTLAB_STATUS_OK: &str = "OK";

/// Identification query answered by every module.
pub const CTLAB_IDN_QUERY: &str = "idn?";

/// Default line speed of the module bus.
pub const CTLAB_DEFAULT_BAUDRATE: u32 = 38400;

/// Default per-read I/O timeout in milliseconds.
pub const CTLAB_DEFAULT_READ_TIMEOUT_MS: u64 = 100;

/// Default interval between polls for inbound data, in milliseconds.
pub const CTLAB_DEFAULT_POLL_INTERVAL_MS: u64 = 1;
