//! # c't-Lab Frame Codec
//!
//! Every request on the module bus is a single ASCII line:
//!
//! ```text
//! <device_index>:<command>!$<xx>\r
//! ```
//!
//! where `<xx>` is the XOR of every byte of `<device_index>:<command>!`, written
//! as two lowercase hex digits. This module builds such frames and, using `nom`,
//! decodes them back into a [`Request`] with checksum verification.
//!
//! ```rust
//! use ctlab_rs::ctlab::frame::{build_frame, decode_frame};
//!
//! let frame = build_frame(2, "idn?");
//! assert_eq!(frame, b"2:idn?!$75\r");
//!
//! let request = decode_frame(&frame).unwrap();
//! assert_eq!(request.device_index(), 2);
//! assert_eq!(request.command(), "idn?");
//! ```
//!
//! The command text must not contain `$`; a `:` or `!` inside the command is
//! carried through unchanged. This is a caller contract and is not validated.

use crate::constants::{
    CTLAB_ADDRESS_DELIMITER, CTLAB_CHECKSUM_MARKER, CTLAB_COMMAND_TERMINATOR, CTLAB_FRAME_END,
    CTLAB_MAX_DEVICE_INDEX,
};
use crate::error::CtlabError;
use crate::util::hex::{decode_checksum, encode_checksum};
use nom::{
    bytes::complete::{take_until, take_while_m_n},
    character::complete::{char, digit1},
    combinator::map_res,
    IResult,
};
use std::fmt;

/// A command addressed to one module on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    device_index: u8,
    command: String,
}

impl Request {
    /// Creates a request, rejecting indices outside `0..=8`.
    pub fn new(device_index: u8, command: impl Into<String>) -> Result<Self, CtlabError> {
        if device_index > CTLAB_MAX_DEVICE_INDEX {
            return Err(CtlabError::InvalidDeviceIndex(device_index));
        }
        Ok(Request {
            device_index,
            command: command.into(),
        })
    }

    pub fn device_index(&self) -> u8 {
        self.device_index
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// The checksummed part of the wire form, `"<device>:<command>!"`.
    pub fn render(&self) -> String {
        render_request(self.device_index, &self.command)
    }

    /// The complete frame, ready for a single write.
    pub fn to_frame(&self) -> Vec<u8> {
        build_frame(self.device_index, &self.command)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn render_request(device_index: u8, command: &str) -> String {
    format!(
        "{device_index}{}{command}{}",
        CTLAB_ADDRESS_DELIMITER as char, CTLAB_COMMAND_TERMINATOR as char
    )
}

/// XOR of every byte in `data`.
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Builds the wire frame `"<device>:<command>!$<xx>\r"`.
pub fn build_frame(device_index: u8, command: &str) -> Vec<u8> {
    let rendered = render_request(device_index, command);
    let checksum = xor_checksum(rendered.as_bytes());

    let mut frame = Vec::with_capacity(rendered.len() + 4);
    frame.extend_from_slice(rendered.as_bytes());
    frame.push(CTLAB_CHECKSUM_MARKER);
    frame.extend_from_slice(encode_checksum(checksum).as_bytes());
    frame.push(CTLAB_FRAME_END);
    frame
}

/// Uses `nom` to split a frame into its request and the transmitted checksum.
///
/// The checksum is returned as sent; [`decode_frame`] verifies it.
pub fn parse_frame(input: &[u8]) -> IResult<&[u8], (Request, u8)> {
    let (i, device_index) = map_res(digit1, |d: &[u8]| {
        std::str::from_utf8(d)
            .map_err(|_| ())
            .and_then(|s| s.parse::<u8>().map_err(|_| ()))
    })(input)?;
    let (i, _) = char(CTLAB_ADDRESS_DELIMITER as char)(i)?;
    let (i, body) = take_until(&[CTLAB_CHECKSUM_MARKER][..])(i)?;
    let (i, _) = char(CTLAB_CHECKSUM_MARKER as char)(i)?;
    let (i, checksum) = map_res(
        take_while_m_n(2, 2, |c: u8| c.is_ascii_hexdigit()),
        |d: &[u8]| decode_checksum(&String::from_utf8_lossy(d)),
    )(i)?;
    let (i, _) = char(CTLAB_FRAME_END as char)(i)?;

    let command = match body.split_last() {
        Some((&last, command)) if last == CTLAB_COMMAND_TERMINATOR => command,
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                body,
                nom::error::ErrorKind::Tag,
            )))
        }
    };

    let request = Request {
        device_index,
        command: String::from_utf8_lossy(command).into_owned(),
    };
    Ok((i, (request, checksum)))
}

/// Parses a complete frame and verifies its checksum.
pub fn decode_frame(input: &[u8]) -> Result<Request, CtlabError> {
    let (remaining, (request, transmitted)) =
        parse_frame(input).map_err(|e| CtlabError::InvalidFrame(format!("{e:?}")))?;
    if !remaining.is_empty() {
        return Err(CtlabError::InvalidFrame(format!(
            "{} trailing bytes after frame end",
            remaining.len()
        )));
    }
    if request.device_index > CTLAB_MAX_DEVICE_INDEX {
        return Err(CtlabError::InvalidDeviceIndex(request.device_index));
    }

    let calculated = xor_checksum(request.render().as_bytes());
    if calculated != transmitted {
        return Err(CtlabError::InvalidChecksum {
            expected: transmitted,
            calculated,
        });
    }
    Ok(request)
}

/// Verifies that `input` is a well-formed frame with a matching checksum.
pub fn verify_frame(input: &[u8]) -> Result<(), CtlabError> {
    decode_frame(input).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_frame_layout() {
        let frame = build_frame(0, "idn?");
        // '0' ^ ':' ^ 'i' ^ 'd' ^ 'n' ^ '?' ^ '!'
        let expected = xor_checksum(b"0:idn?!");
        assert_eq!(frame, format!("0:idn?!${expected:02x}\r").into_bytes());
    }

    #[test]
    fn test_xor_checksum() {
        assert_eq!(xor_checksum(b""), 0);
        assert_eq!(xor_checksum(b"A"), 0x41);
        assert_eq!(xor_checksum(b"AA"), 0);
        assert_eq!(xor_checksum(&[0x0f, 0xf0]), 0xff);
    }

    #[test]
    fn test_request_rejects_out_of_range_index() {
        assert!(Request::new(8, "idn?").is_ok());
        assert!(matches!(
            Request::new(9, "idn?"),
            Err(CtlabError::InvalidDeviceIndex(9))
        ));
    }

    #[test]
    fn test_decode_command_with_trailing_bang() {
        // Register writes are sent as "<idx>=<value>!" so the frame carries "!!".
        let frame = build_frame(4, "156=3.4!");
        let request = decode_frame(&frame).unwrap();
        assert_eq!(request.command(), "156=3.4!");
        assert_eq!(request.render(), "4:156=3.4!!");
    }

    #[test]
    fn test_decode_rejects_bad_checksum() {
        let mut frame = build_frame(1, "msv?");
        let len = frame.len();
        frame[len - 2] = if frame[len - 2] == b'0' { b'1' } else { b'0' };
        assert!(matches!(
            decode_frame(&frame),
            Err(CtlabError::InvalidChecksum { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_missing_terminator() {
        assert!(matches!(
            decode_frame(b"1:msv?$00\r"),
            Err(CtlabError::InvalidFrame(_))
        ));
        assert!(matches!(
            decode_frame(b"1:msv?!$00"),
            Err(CtlabError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_display_matches_render() {
        let request = Request::new(3, "dcv=1.500").unwrap();
        assert_eq!(request.to_string(), "3:dcv=1.500!");
    }
}
