//! Serial Line Transport
//!
//! Wraps a UART (hardware or software serial) as a byte stream. The device is
//! opened on `activate()`; tests and alternative back-ends inject an already
//! open stream instead.

use crate::error::TransportError;
use std::future::poll_fn;
use std::pin::Pin;
use std::task::Poll;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, trace};

/// Bytes dropped per read while discarding input
const DISCARD_CHUNK: usize = 64;

/// Any async byte stream usable as a serial line
pub trait SerialLine: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> SerialLine for T {}

enum LineState {
    /// Configured, not yet opened
    Closed { path: String },
    /// Open and ready for traffic
    Open(Box<dyn SerialLine>),
}

/// Byte-stream transport over a serial line
pub struct SerialTransport {
    label: String,
    baud_rate: u32,
    state: LineState,
}

impl SerialTransport {
    /// Transport for a device path, opened on activation
    pub fn new(path: &str, baud_rate: u32) -> Self {
        Self {
            label: path.to_string(),
            baud_rate,
            state: LineState::Closed {
                path: path.to_string(),
            },
        }
    }

    /// Transport over an already-open stream
    pub fn from_stream<S: SerialLine + 'static>(label: &str, stream: S) -> Self {
        Self {
            label: label.to_string(),
            baud_rate: 0,
            state: LineState::Open(Box::new(stream)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, LineState::Open(_))
    }

    /// Open the device at the configured baud rate
    pub async fn activate(&mut self) -> Result<(), TransportError> {
        let path = match &self.state {
            LineState::Open(_) => {
                debug!("Serial line {} already open", self.label);
                return Ok(());
            }
            LineState::Closed { path } => path.clone(),
        };

        info!("Opening serial line {} at {} baud", path, self.baud_rate);
        let stream = tokio_serial::new(&path, self.baud_rate)
            .open_native_async()
            .map_err(|e| TransportError::Open {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        self.state = LineState::Open(Box::new(stream));
        Ok(())
    }

    fn line(&mut self) -> Result<&mut Box<dyn SerialLine>, TransportError> {
        match &mut self.state {
            LineState::Open(stream) => Ok(stream),
            LineState::Closed { .. } => Err(TransportError::NotActivated),
        }
    }

    /// Write a whole command frame
    pub async fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        trace!("{} <- {:02X?}", self.label, bytes);
        let line = self.line()?;
        line.write_all(bytes).await?;
        line.flush().await?;
        Ok(())
    }

    /// Drain up to `max` bytes that are already buffered, without waiting
    pub async fn receive(&mut self, buf: &mut [u8], max: usize) -> Result<usize, TransportError> {
        let max = max.min(buf.len());
        let line = self.line()?;
        let mut filled = 0;

        while filled < max {
            let got = poll_fn(|cx| {
                let mut read_buf = ReadBuf::new(&mut buf[filled..max]);
                match Pin::new(&mut *line).poll_read(cx, &mut read_buf) {
                    Poll::Ready(Ok(())) => Poll::Ready(Ok(read_buf.filled().len())),
                    Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
                    // Nothing buffered right now
                    Poll::Pending => Poll::Ready(Ok(0)),
                }
            })
            .await?;

            if got == 0 {
                break;
            }
            filled += got;
        }

        trace!("{} -> {:02X?}", self.label, &buf[..filled]);
        Ok(filled)
    }

    /// Wait for exactly one byte, up to `deadline`
    pub async fn read_byte(&mut self, deadline: Duration) -> Result<u8, TransportError> {
        let line = self.line()?;
        match tokio::time::timeout(deadline, line.read_u8()).await {
            Ok(byte) => Ok(byte?),
            Err(_) => Err(TransportError::Timeout(deadline.as_millis() as u64)),
        }
    }

    /// Drop whatever is currently buffered on the line
    pub async fn discard_input(&mut self) -> Result<usize, TransportError> {
        let mut scratch = [0u8; DISCARD_CHUNK];
        let mut total = 0;
        loop {
            let n = self.receive(&mut scratch, DISCARD_CHUNK).await?;
            total += n;
            if n < DISCARD_CHUNK {
                break;
            }
        }
        if total > 0 {
            debug!("Discarded {} stale bytes on {}", total, self.label);
        }
        Ok(total)
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("label", &self.label)
            .field("baud_rate", &self.baud_rate)
            .field("active", &self.is_active())
            .finish()
    }
}
