//! Integration tests for field extraction from module answer lines.

use ctlab_rs::ctlab::response::{
    extract_device, extract_device_options, extract_device_type, extract_status, extract_value,
    ParsedResponse,
};

#[test]
fn test_ok_confirmation() {
    let parsed = ParsedResponse::parse(b"#1:[OK]");
    assert_eq!(parsed.device_echo.as_deref(), Some("1"));
    assert_eq!(parsed.status_code.as_deref(), Some("OK"));
    assert_eq!(parsed.value_text, None);
    assert!(parsed.has_status("OK"));
}

#[test]
fn test_value_with_checksum_trailer() {
    assert_eq!(extract_value(b"#0:100=3.140$ab").as_deref(), Some("3.140"));
    assert_eq!(extract_value(b"#0:10=12.5").as_deref(), Some("12.5"));
}

#[test]
fn test_value_uses_last_equals() {
    assert_eq!(extract_value(b"#2:a=b=7").as_deref(), Some("7"));
}

#[test]
fn test_missing_markers() {
    let parsed = ParsedResponse::parse(b"garbage");
    assert_eq!(parsed, ParsedResponse::default());
    assert_eq!(extract_device(b"1:[OK]"), None);
    assert_eq!(extract_status(b"#1:OK]"), None);
}

#[test]
fn test_idn_fields() {
    let line = b"#0:255=[DCG 1.0 c't-Lab;OPT1]";
    assert_eq!(extract_device_type(line), "DCG");
    assert_eq!(extract_device_options(line).as_deref(), Some("OPT1"));
}

#[test]
fn test_idn_without_options() {
    let line = b"#3:255=[ADA 2.1]";
    assert_eq!(extract_device_type(line), "ADA");
    assert_eq!(extract_device_options(line), None);
}

#[test]
fn test_device_type_without_brackets_is_empty() {
    assert_eq!(extract_device_type(b"#3:255=ADA"), "");
}

#[test]
fn test_checksum_status() {
    let parsed = ParsedResponse::parse(b"#4:7 [CHKSUM]");
    assert_eq!(parsed.status_code.as_deref(), Some("CHKSUM"));
    assert!(!parsed.has_status("OK"));
}
