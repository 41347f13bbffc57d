//! # c't-Lab Serial Transport
//!
//! This module provides the byte-level side of the module bus: opening the serial
//! port, writing frames, polling for inbound bytes, and reading one response line
//! at a time. The [`Transport`] trait is the seam the command engine is written
//! against, so tests can swap in [`MockTransport`](crate::ctlab::transport_mock::MockTransport).

use crate::constants::{CTLAB_DEFAULT_BAUDRATE, CTLAB_DEFAULT_READ_TIMEOUT_MS, CTLAB_LINE_END};
use crate::error::CtlabError;
use bytes::{Buf, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{timeout, Instant};
use tokio_serial::{SerialPort as _, SerialPortBuilderExt};

/// Minimal byte-level contract the command engine needs from the bus.
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Sends exactly `data` and flushes it onto the line.
    async fn write(&mut self, data: &[u8]) -> Result<(), CtlabError>;

    /// Number of inbound bytes that can be read without blocking.
    fn bytes_available(&mut self) -> Result<usize, CtlabError>;

    /// Reads one `\n`-terminated line, bounded by the transport's I/O timeout.
    ///
    /// On timeout the bytes received so far are returned, possibly none.
    async fn read_line(&mut self) -> Result<Vec<u8>, CtlabError>;

    /// Drops every buffered inbound byte.
    async fn discard_input(&mut self) -> Result<(), CtlabError>;
}

/// Configuration for serial connection.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baudrate: u32,
    /// Bound on a single `read_line` call.
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            baudrate: CTLAB_DEFAULT_BAUDRATE,
            read_timeout: Duration::from_millis(CTLAB_DEFAULT_READ_TIMEOUT_MS),
        }
    }
}

/// A [`Transport`] over a real serial port, encapsulating the tokio_serial::SerialStream.
pub struct SerialTransport {
    port: tokio_serial::SerialStream,
    config: SerialConfig,
    /// Bytes read past the end of the previous line.
    pending: BytesMut,
}

impl SerialTransport {
    /// Opens `port_name` with the default settings (38400 baud, 8N1).
    pub fn open(port_name: &str) -> Result<SerialTransport, CtlabError> {
        Self::open_with_config(port_name, SerialConfig::default())
    }

    /// Opens `port_name` with custom settings; data format is always 8N1.
    pub fn open_with_config(
        port_name: &str,
        config: SerialConfig,
    ) -> Result<SerialTransport, CtlabError> {
        let port = tokio_serial::new(port_name, config.baudrate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .timeout(config.read_timeout)
            .open_native_async()
            .map_err(|e| CtlabError::SerialPortError(format!("{port_name}: {e}")))?;

        Ok(SerialTransport {
            port,
            config,
            pending: BytesMut::with_capacity(256),
        })
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Splits one complete line off the pending buffer, terminator included.
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let end = self.pending.iter().position(|&b| b == CTLAB_LINE_END)?;
        Some(self.pending.split_to(end + 1).to_vec())
    }
}

#[async_trait::async_trait]
impl Transport for SerialTransport {
    async fn write(&mut self, data: &[u8]) -> Result<(), CtlabError> {
        self.port
            .write_all(data)
            .await
            .map_err(|e| CtlabError::SerialPortError(e.to_string()))?;
        AsyncWriteExt::flush(&mut self.port)
            .await
            .map_err(|e| CtlabError::SerialPortError(e.to_string()))
    }

    fn bytes_available(&mut self) -> Result<usize, CtlabError> {
        let waiting = self
            .port
            .bytes_to_read()
            .map_err(|e| CtlabError::SerialPortError(e.to_string()))?;
        Ok(self.pending.len() + waiting as usize)
    }

    async fn read_line(&mut self) -> Result<Vec<u8>, CtlabError> {
        let deadline = Instant::now() + self.config.read_timeout;
        let mut chunk = [0u8; 64];

        loop {
            if let Some(line) = self.take_line() {
                return Ok(line);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, AsyncReadExt::read(&mut self.port, &mut chunk)).await {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(n)) => self.pending.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => return Err(CtlabError::SerialPortError(e.to_string())),
            }
        }

        // Timed out: hand back the partial line like a short read would.
        let partial = self.pending.to_vec();
        self.pending.advance(partial.len());
        Ok(partial)
    }

    async fn discard_input(&mut self) -> Result<(), CtlabError> {
        self.pending.clear();
        self.port
            .clear(tokio_serial::ClearBuffer::Input)
            .map_err(|e| CtlabError::SerialPortError(e.to_string()))
    }
}
