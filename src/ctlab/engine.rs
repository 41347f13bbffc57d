//! # c't-Lab Command Engine
//!
//! The engine runs every exchange on the module bus. One exchange is always the
//! same sequence:
//!
//! 1. drop whatever is still waiting in the inbound buffer (the protocol has no
//!    sequence numbers, so a late answer would otherwise be taken for the next one),
//! 2. write one checksummed frame,
//! 3. wait until the transport reports inbound bytes,
//! 4. read one line and strip surrounding whitespace.
//!
//! On top of that sit three request flavors:
//!
//! - [`CommandEngine::send_command`]: expects only a `[OK]` confirmation and
//!   resends on any other status,
//! - [`CommandEngine::send_command_result`]: expects a data line, resends when the
//!   module complains about the checksum, and reports a pure echo of the request
//!   as "no result",
//! - [`CommandEngine::read_value`]: asks until there is a result, then parses its
//!   `=value` payload as a number.
//!
//! How long the engine keeps resending is governed by the [`RetryPolicy`] in the
//! [`EngineConfig`]; the default never gives up.
//!
//! [`RetryPolicy`]: crate::ctlab::policy::RetryPolicy

use crate::constants::CTLAB_STATUS_OK;
use crate::ctlab::frame::Request;
use crate::ctlab::policy::EngineConfig;
use crate::ctlab::response::{extract_value, ParsedResponse};
use crate::ctlab::transport::Transport;
use crate::error::CtlabError;
use crate::logging::log_frame_hex;
use log::{debug, warn};
use tokio::time::Instant;

/// Drives request/response exchanges over one [`Transport`].
pub struct CommandEngine<T: Transport> {
    transport: T,
    config: EngineConfig,
}

impl<T: Transport> CommandEngine<T> {
    /// Creates an engine with the default (unbounded) policy.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, EngineConfig::default())
    }

    pub fn with_config(transport: T, config: EngineConfig) -> Self {
        CommandEngine { transport, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }


    /// Fire-and-forget: flushes stale input and transmits one frame.
    ///
    /// Returns the request as rendered on the wire (without checksum).
    pub async fn send_command_only(
        &mut self,
        device: u8,
        command: &str,
    ) -> Result<Request, CtlabError> {
        let request = Request::new(device, command)?;
        self.discard_stale_input().await?;

        let frame = request.to_frame();
        log_frame_hex("TX", &frame);
        self.transport.write(&frame).await?;
        Ok(request)
    }

    /// Sends a command that only returns a confirmation.
    ///
    /// Succeeds on status `OK`. Any other answer is logged and the identical
    /// command is sent again, unless the status is listed as fatal in the
    /// protocol policy.
    pub async fn send_command(&mut self, device: u8, command: &str) -> Result<(), CtlabError> {
        let policy = self.config.policy.clone();
        let mut retry = policy.retry.start();
        let mut last_response = None;

        while retry.next_attempt().await {
            let (request, answer) = self.exchange(device, command).await?;
            let parsed = ParsedResponse::parse(&answer);
            if parsed.has_status(CTLAB_STATUS_OK) {
                return Ok(());
            }

            let text = String::from_utf8_lossy(&answer).into_owned();
            warn!(
                "command ({request}) answer: {text:?} (device: {:?}, code {:?})",
                parsed.device_echo, parsed.status_code
            );
            if let Some(status) = parsed.status_code.filter(|s| policy.is_fatal_status(s)) {
                return Err(CtlabError::StatusRejected {
                    device,
                    command: command.to_string(),
                    status,
                });
            }
            last_response = Some(text);
        }

        Err(CtlabError::RetriesExhausted {
            command: render(device, command),
            attempts: retry.attempts(),
            last_response,
        })
    }

    /// Sends a command that returns a data line.
    ///
    /// Checksum complaints are resent. Returns `None` when the line is a pure
    /// echo of the request, which is what the bus delivers when no module
    /// answers at `device`.
    pub async fn send_command_result(
        &mut self,
        device: u8,
        command: &str,
    ) -> Result<Option<Vec<u8>>, CtlabError> {
        let policy = self.config.policy.clone();
        let mut retry = policy.retry.start();
        let mut last_response = None;

        while retry.next_attempt().await {
            let (request, answer) = self.exchange(device, command).await?;
            if policy.is_checksum_error(&answer) {
                warn!(
                    "checksum rejected for ({request}): {:?}, resending",
                    String::from_utf8_lossy(&answer)
                );
                last_response = Some(String::from_utf8_lossy(&answer).into_owned());
                continue;
            }
            if is_echo(&request, &answer) {
                debug!("no answer to ({request})");
                return Ok(None);
            }
            return Ok(Some(answer));
        }

        Err(CtlabError::RetriesExhausted {
            command: render(device, command),
            attempts: retry.attempts(),
            last_response,
        })
    }

    /// [`send_command_result`](Self::send_command_result) decoded as text.
    ///
    /// An absent result reads as the empty string.
    pub async fn send_command_result_as_text(
        &mut self,
        device: u8,
        command: &str,
    ) -> Result<String, CtlabError> {
        Ok(self
            .send_command_result(device, command)
            .await?
            .map(|answer| String::from_utf8_lossy(&answer).into_owned())
            .unwrap_or_default())
    }

    /// Reads a numeric value, asking again while the module does not answer.
    ///
    /// A result without an `=value` payload, or with a non-numeric one, fails
    /// with [`CtlabError::MalformedValue`] and is not retried.
    pub async fn read_value(&mut self, device: u8, command: &str) -> Result<f64, CtlabError> {
        let policy = self.config.policy.clone();
        let mut retry = policy.retry.start();

        while retry.next_attempt().await {
            if let Some(answer) = self.send_command_result(device, command).await? {
                return parse_value(&answer);
            }
        }

        Err(CtlabError::RetriesExhausted {
            command: render(device, command),
            attempts: retry.attempts(),
            last_response: None,
        })
    }

    /// One send/wait/read cycle.
    async fn exchange(
        &mut self,
        device: u8,
        command: &str,
    ) -> Result<(Request, Vec<u8>), CtlabError> {
        let request = self.send_command_only(device, command).await?;
        let answer = self.wait_for_answer(&request).await?;
        Ok((request, answer))
    }

    async fn discard_stale_input(&mut self) -> Result<(), CtlabError> {
        if self.transport.bytes_available()? != 0 {
            let stale = self.transport.read_line().await?;
            warn!(
                "obsolete buffer content: {:?}",
                String::from_utf8_lossy(trim_line(&stale))
            );
        }
        self.transport.discard_input().await
    }

    async fn wait_for_answer(&mut self, request: &Request) -> Result<Vec<u8>, CtlabError> {
        let deadline = self.config.response_timeout.map(|t| (Instant::now() + t, t));

        while self.transport.bytes_available()? == 0 {
            if let Some((deadline, timeout)) = deadline {
                if Instant::now() >= deadline {
                    return Err(CtlabError::ResponseTimeout {
                        command: request.render(),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        let line = self.transport.read_line().await?;
        let answer = trim_line(&line).to_vec();
        log_frame_hex("RX", &answer);
        Ok(answer)
    }
}

fn render(device: u8, command: &str) -> String {
    format!("{device}:{command}!")
}

/// An answer identical to what was sent, with or without its checksum trailer.
fn is_echo(request: &Request, answer: &[u8]) -> bool {
    answer == request.render().as_bytes() || answer == trim_line(&request.to_frame())
}

/// Parses the `=value` payload of an answer line as a float.
pub fn parse_value(answer: &[u8]) -> Result<f64, CtlabError> {
    let response = || String::from_utf8_lossy(answer).into_owned();
    let text = extract_value(answer).ok_or_else(|| CtlabError::MalformedValue {
        response: response(),
        reason: "no '=' payload".to_string(),
    })?;
    text.parse::<f64>().map_err(|e| CtlabError::MalformedValue {
        response: response(),
        reason: format!("'{text}' is not a number: {e}"),
    })
}

/// Strips leading and trailing ASCII whitespace, CR/LF included.
pub(crate) fn trim_line(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    &line[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctlab::policy::RetryPolicy;
    use crate::ctlab::transport_mock::MockTransport;

    fn bounded(mock: &MockTransport, attempts: u32) -> CommandEngine<MockTransport> {
        let config =
            EngineConfig::default().with_retry(RetryPolicy::default().with_max_attempts(attempts));
        CommandEngine::with_config(mock.clone(), config)
    }

    #[test]
    fn test_trim_line() {
        assert_eq!(trim_line(b"  #1:[OK]\r\n"), b"#1:[OK]");
        assert_eq!(trim_line(b"\r\n"), b"");
        assert_eq!(trim_line(b""), b"");
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value(b"100=3.140$ab").unwrap(), 3.14);
        assert_eq!(parse_value(b"#1:10=-0.5").unwrap(), -0.5);
        assert!(matches!(
            parse_value(b"#1:[OK]"),
            Err(CtlabError::MalformedValue { .. })
        ));
        assert!(matches!(
            parse_value(b"#1:254=DCG2"),
            Err(CtlabError::MalformedValue { .. })
        ));
    }

    #[test]
    fn test_is_echo() {
        let request = Request::new(3, "idn?").unwrap();
        assert!(is_echo(&request, b"3:idn?!"));
        assert!(is_echo(&request, trim_line(&request.to_frame())));
        assert!(!is_echo(&request, b"#3:[ADA 2.1]"));
    }

    #[tokio::test]
    async fn test_send_command_ok() {
        let mock = MockTransport::new();
        mock.queue_reply("#1:[OK]");
        let mut engine = CommandEngine::new(mock.clone());

        engine.send_command(1, "dcv=5.000").await.unwrap();
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_send_command_resends_until_ok() {
        let mock = MockTransport::new();
        mock.queue_reply("#1:[BUSY]");
        mock.queue_reply("garbled");
        mock.queue_reply("#1:[OK]");
        let mut engine = CommandEngine::new(mock.clone());

        engine.send_command(1, "dcv=5.000").await.unwrap();
        let requests = mock.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.command() == "dcv=5.000"));
    }

    #[tokio::test]
    async fn test_send_command_exhausts_bounded_policy() {
        let mock = MockTransport::with_responder(|_| Some("#1:[BUSY]".to_string()));
        let mut engine = bounded(&mock, 4);

        let err = engine.send_command(1, "dcv=5.000").await.unwrap_err();
        match err {
            CtlabError::RetriesExhausted {
                attempts,
                last_response,
                ..
            } => {
                assert_eq!(attempts, 4);
                assert_eq!(last_response.as_deref(), Some("#1:[BUSY]"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mock.request_count(), 4);
    }

    #[tokio::test]
    async fn test_stale_input_is_discarded_before_send() {
        let mock = MockTransport::new();
        mock.queue_rx_data(b"#4:100=1\r\n#4:[OK]\r\n");
        mock.queue_reply("#4:101=2");
        let mut engine = CommandEngine::new(mock.clone());

        let answer = engine.send_command_result(4, "101?").await.unwrap();
        assert_eq!(answer.as_deref(), Some(&b"#4:101=2"[..]));
        assert_eq!(mock.discarded_data(), b"#4:[OK]\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_deadline() {
        let mock = MockTransport::new();
        mock.queue_silence();
        let config = EngineConfig::default()
            .with_response_timeout(std::time::Duration::from_millis(250));
        let mut engine = CommandEngine::with_config(mock.clone(), config);

        let err = engine.send_command_result(2, "idn?").await.unwrap_err();
        assert!(matches!(err, CtlabError::ResponseTimeout { timeout_ms: 250, .. }));
    }
}
