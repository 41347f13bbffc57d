//! Mock transport implementation for testing
//!
//! This module provides an in-memory [`Transport`] that decodes every frame the
//! engine writes and answers it, either from a queue of scripted replies or from
//! a responder closure. It lets the command engine and device discovery be
//! exercised without a module bus attached.

use crate::constants::CTLAB_LINE_END;
use crate::ctlab::frame::{decode_frame, Request};
use crate::ctlab::transport::Transport;
use crate::error::CtlabError;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

/// Computes the answer line for a decoded request; `None` means no answer.
pub type Responder = Box<dyn FnMut(&Request) -> Option<String> + Send>;

#[derive(Default)]
struct MockState {
    /// Data written to the port (outgoing)
    tx: Vec<u8>,
    /// Data to be read from the port (incoming)
    rx: VecDeque<u8>,
    /// One entry per written frame; `None` keeps the line silent
    replies: VecDeque<Option<String>>,
    responder: Option<Responder>,
    requests: Vec<Request>,
    discarded: Vec<u8>,
    next_error: Option<io::Error>,
}

/// Mock module bus. Clones share state, so a test keeps one clone for
/// inspection while the engine owns the other.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock that answers every request through `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&Request) -> Option<String> + Send + 'static,
    {
        let mock = Self::new();
        mock.set_responder(responder);
        mock
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&Request) -> Option<String> + Send + 'static,
    {
        self.state().responder = Some(Box::new(responder));
    }

    /// Queues the answer to the next written frame. Scripted replies take
    /// precedence over the responder.
    pub fn queue_reply(&self, line: &str) {
        self.state().replies.push_back(Some(line.to_string()));
    }

    /// The next written frame gets no answer at all.
    pub fn queue_silence(&self) {
        self.state().replies.push_back(None);
    }

    /// Places raw bytes in the inbound buffer, as if left over from an
    /// earlier exchange.
    pub fn queue_rx_data(&self, data: &[u8]) {
        self.state().rx.extend(data);
    }

    /// Get data that was written to the port
    pub fn get_tx_data(&self) -> Vec<u8> {
        self.state().tx.clone()
    }

    /// Every request decoded from the written frames, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.state().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state().requests.len()
    }

    /// Bytes dropped by `discard_input`.
    pub fn discarded_data(&self) -> Vec<u8> {
        self.state().discarded.clone()
    }

    /// Set an error to be returned on the next operation
    pub fn set_next_error(&self, error: io::Error) {
        self.state().next_error = Some(error);
    }

    /// Clear all buffers
    pub fn clear(&self) {
        let mut state = self.state();
        state.tx.clear();
        state.rx.clear();
        state.replies.clear();
        state.requests.clear();
        state.discarded.clear();
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn write(&mut self, data: &[u8]) -> Result<(), CtlabError> {
        let mut state = self.state();
        if let Some(error) = state.next_error.take() {
            return Err(CtlabError::SerialPortError(error.to_string()));
        }
        state.tx.extend_from_slice(data);

        // A frame that does not decode is lost on the line.
        let Ok(request) = decode_frame(data) else {
            return Ok(());
        };

        let reply = match state.replies.pop_front() {
            Some(reply) => reply,
            None => match state.responder.as_mut() {
                Some(responder) => responder(&request),
                None => None,
            },
        };
        state.requests.push(request);

        if let Some(line) = reply {
            state.rx.extend(line.as_bytes());
            state.rx.extend(b"\r\n");
        }
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize, CtlabError> {
        Ok(self.state().rx.len())
    }

    async fn read_line(&mut self) -> Result<Vec<u8>, CtlabError> {
        let mut state = self.state();
        if let Some(error) = state.next_error.take() {
            return Err(CtlabError::SerialPortError(error.to_string()));
        }

        let len = match state.rx.iter().position(|&b| b == CTLAB_LINE_END) {
            Some(end) => end + 1,
            None => state.rx.len(),
        };
        Ok(state.rx.drain(..len).collect())
    }

    async fn discard_input(&mut self) -> Result<(), CtlabError> {
        let mut state = self.state();
        let stale: Vec<u8> = state.rx.drain(..).collect();
        state.discarded.extend(stale);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctlab::frame::build_frame;

    #[tokio::test]
    async fn test_scripted_reply_follows_frame() {
        let mut mock = MockTransport::new();
        mock.queue_reply("#1:[OK]");

        mock.write(&build_frame(1, "dcv=1.000")).await.unwrap();
        assert_eq!(mock.bytes_available().unwrap(), 9);
        assert_eq!(mock.read_line().await.unwrap(), b"#1:[OK]\r\n");
        assert_eq!(mock.bytes_available().unwrap(), 0);
        assert_eq!(mock.requests()[0].command(), "dcv=1.000");
    }

    #[tokio::test]
    async fn test_responder_sees_decoded_request() {
        let mut mock = MockTransport::with_responder(|req| {
            Some(format!("#{}:{}", req.device_index(), req.command()))
        });

        mock.write(&build_frame(5, "msv?")).await.unwrap();
        assert_eq!(mock.read_line().await.unwrap(), b"#5:msv?\r\n");
    }

    #[tokio::test]
    async fn test_silence_and_undecodable_frames() {
        let mut mock = MockTransport::with_responder(|_| Some("never".to_string()));
        mock.queue_silence();

        mock.write(&build_frame(0, "idn?")).await.unwrap();
        assert_eq!(mock.bytes_available().unwrap(), 0);

        mock.write(b"garbage\r").await.unwrap();
        assert_eq!(mock.bytes_available().unwrap(), 0);
        assert_eq!(mock.request_count(), 1);
        assert_eq!(mock.get_tx_data().len(), build_frame(0, "idn?").len() + 8);
    }

    #[tokio::test]
    async fn test_discard_input_keeps_stale_bytes() {
        let mut mock = MockTransport::new();
        mock.queue_rx_data(b"#2:[OK]\r\n");

        mock.discard_input().await.unwrap();
        assert_eq!(mock.bytes_available().unwrap(), 0);
        assert_eq!(mock.discarded_data(), b"#2:[OK]\r\n");
    }

    #[tokio::test]
    async fn test_partial_line_is_returned() {
        let mut mock = MockTransport::new();
        mock.queue_rx_data(b"#2:[O");
        assert_eq!(mock.read_line().await.unwrap(), b"#2:[O");
    }

    #[tokio::test]
    async fn test_injected_error() {
        let mut mock = MockTransport::new();
        mock.set_next_error(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));

        let result = mock.write(&build_frame(0, "idn?")).await;
        assert!(matches!(result, Err(CtlabError::SerialPortError(_))));
    }
}
