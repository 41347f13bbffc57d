//! # c't-Lab Response Parser
//!
//! Module answers are free-form text lines. Three markers carry structure:
//!
//! - `#<device>:` echoes the answering device,
//! - `[<status-or-type>[;<options>]]` carries a status code (`OK`, `CHKSUM`, ...)
//!   or, for `idn?`, the device type, version, and options,
//! - `=<value>` carries a data payload, optionally followed by a `$xx` checksum.
//!
//! A field is `None` when its marker is absent; nothing else about the line is
//! guaranteed.

use crate::constants::CTLAB_CHECKSUM_MARKER;

/// The optional fields of one response line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub device_echo: Option<String>,
    pub status_code: Option<String>,
    pub value_text: Option<String>,
}

impl ParsedResponse {
    pub fn parse(raw: &[u8]) -> Self {
        ParsedResponse {
            device_echo: extract_device(raw),
            status_code: extract_status(raw),
            value_text: extract_value(raw),
        }
    }

    /// True when the status field reads exactly `status`.
    pub fn has_status(&self, status: &str) -> bool {
        self.status_code.as_deref() == Some(status)
    }
}

/// Returns the bytes between the first `open` and the next `close` after it.
fn delimited_by(raw: &[u8], open: u8, close: u8) -> Option<&[u8]> {
    let start = raw.iter().position(|&b| b == open)? + 1;
    let len = raw[start..].iter().position(|&b| b == close)?;
    Some(&raw[start..start + len])
}

fn to_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Text between the first `#` and the following `:`.
pub fn extract_device(raw: &[u8]) -> Option<String> {
    delimited_by(raw, b'#', b':').map(to_text)
}

/// Interior of the first `[...]` group.
pub fn extract_status(raw: &[u8]) -> Option<String> {
    delimited_by(raw, b'[', b']').map(to_text)
}

/// Text after the last `=`, cut at a trailing `$` checksum marker, trimmed.
pub fn extract_value(raw: &[u8]) -> Option<String> {
    let start = raw.iter().rposition(|&b| b == b'=')? + 1;
    let tail = &raw[start..];
    let end = tail
        .iter()
        .position(|&b| b == CTLAB_CHECKSUM_MARKER)
        .unwrap_or(tail.len());
    Some(to_text(&tail[..end]).trim().to_string())
}

/// Device type token of an `idn?` answer: the first word inside the brackets.
///
/// Returns an empty string when the line has no bracket group.
pub fn extract_device_type(raw: &[u8]) -> String {
    delimited_by(raw, b'[', b']')
        .map(|group| {
            let text = to_text(group);
            text.split_whitespace()
                .next()
                .unwrap_or_default()
                .split(';')
                .next()
                .unwrap_or_default()
                .to_string()
        })
        .unwrap_or_default()
}

/// Option string of an `idn?` answer: the text after `;` inside the brackets.
pub fn extract_device_options(raw: &[u8]) -> Option<String> {
    let group = delimited_by(raw, b'[', b']')?;
    let split = group.iter().rposition(|&b| b == b';')?;
    Some(to_text(&group[split + 1..]).trim().to_string())
}

/// Text after the first `=` of a line, or the whole line when there is none.
///
/// Used for string registers such as the identification text, where the
/// payload itself may contain `=`.
pub fn value_after_equals(text: &str) -> &str {
    match text.find('=') {
        Some(pos) => &text[pos + 1..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_status() {
        assert_eq!(extract_status(b"#3:[OK]"), Some("OK".to_string()));
        assert_eq!(extract_status(b"#3:255=[CHKSUM] [x]"), Some("CHKSUM".to_string()));
        assert_eq!(extract_status(b"no brackets here"), None);
        assert_eq!(extract_status(b"[unterminated"), None);
    }

    #[test]
    fn test_extract_device() {
        assert_eq!(extract_device(b"#3:[OK]"), Some("3".to_string()));
        assert_eq!(extract_device(b"#12:100=5"), Some("12".to_string()));
        assert_eq!(extract_device(b"3:[OK]"), None);
        assert_eq!(extract_device(b"#3 no colon"), None);
    }

    #[test]
    fn test_extract_value() {
        assert_eq!(extract_value(b"100=3.140$ab"), Some("3.140".to_string()));
        assert_eq!(extract_value(b"#1:10= 12.5 "), Some("12.5".to_string()));
        assert_eq!(extract_value(b"#1:dca=1=2"), Some("2".to_string()));
        assert_eq!(extract_value(b"#1:[OK]"), None);
    }

    #[test]
    fn test_extract_device_type_and_options() {
        let raw = b"#2:[DCG2 1.0;opt1]";
        assert_eq!(extract_device_type(raw), "DCG2");
        assert_eq!(extract_device_options(raw), Some("opt1".to_string()));

        let plain = b"#0:[DCG 1.0]";
        assert_eq!(extract_device_type(plain), "DCG");
        assert_eq!(extract_device_options(plain), None);

        assert_eq!(extract_device_type(b"no group"), "");
        assert_eq!(extract_device_options(b"no group;x"), None);
    }

    #[test]
    fn test_parsed_response() {
        let parsed = ParsedResponse::parse(b"#4:[OK]");
        assert_eq!(parsed.device_echo.as_deref(), Some("4"));
        assert!(parsed.has_status("OK"));
        assert_eq!(parsed.value_text, None);

        let empty = ParsedResponse::parse(b"");
        assert_eq!(empty, ParsedResponse::default());
    }

    #[test]
    fn test_value_after_equals() {
        assert_eq!(value_after_equals("#0:254=DCG2 V1.2 a=b"), "DCG2 V1.2 a=b");
        assert_eq!(value_after_equals("no payload"), "no payload");
    }
}
