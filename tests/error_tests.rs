//! Unit tests for the `CtlabError` enum and its `Display` output.

use ctlab_rs::error::CtlabError;

/// Tests that the `SerialPortError` variant is correctly formatted.
#[test]
fn test_serial_port_error() {
    let err = CtlabError::SerialPortError("Test error".to_string());
    assert_eq!(err.to_string(), "Serial port error: Test error");
}

#[test]
fn test_invalid_checksum_error() {
    let err = CtlabError::InvalidChecksum {
        expected: 0x0a,
        calculated: 0x75,
    };
    assert_eq!(
        err.to_string(),
        "Invalid checksum: expected 0x0a, calculated 0x75"
    );
}

#[test]
fn test_invalid_device_index_error() {
    let err = CtlabError::InvalidDeviceIndex(12);
    assert_eq!(err.to_string(), "Invalid device index: 12");
}

#[test]
fn test_retries_exhausted_error() {
    let err = CtlabError::RetriesExhausted {
        command: "1:dcv=5.000!".to_string(),
        attempts: 3,
        last_response: Some("#1:[ERR]".to_string()),
    };
    assert_eq!(
        err.to_string(),
        "Command '1:dcv=5.000!' failed after 3 attempts (last response: Some(\"#1:[ERR]\"))"
    );
}

#[test]
fn test_slot_unassigned_error() {
    let err = CtlabError::SlotUnassigned("dcg".to_string());
    assert_eq!(err.to_string(), "No dcg device found on the bus");
}

/// Tests that I/O errors become serial port errors.
#[test]
fn test_from_io_error() {
    let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "no data");
    let err: CtlabError = io.into();
    assert!(matches!(err, CtlabError::SerialPortError(ref msg) if msg == "no data"));
}

/// Tests that the `Other` variant is correctly formatted.
#[test]
fn test_other_error() {
    let err = CtlabError::Other("Test error message".to_string());
    assert_eq!(err.to_string(), "Other error: Test error message");
}
