//! Outbound line writing.
//!
//! Every write is one complete line, flushed before the call returns. Writers
//! never merge or buffer partial lines across calls.

use crate::error::LinkError;
use async_trait::async_trait;
use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::Mutex;
use tokio_util::codec::{FramedWrite, LinesCodec};
use tracing::trace;

/// Sink for complete protocol lines.
#[async_trait]
pub trait LineWriter: Send + Sync {
    /// Write one line (without terminator) and flush it.
    async fn write_line(&self, line: &str) -> Result<(), LinkError>;
}

/// Writes lines to the socket through a [`LinesCodec`].
pub struct FramedWriter<W> {
    inner: Mutex<FramedWrite<W, LinesCodec>>,
}

impl<W: AsyncWrite + Unpin + Send> FramedWriter<W> {
    pub fn new(write_half: W) -> Self {
        Self {
            inner: Mutex::new(FramedWrite::new(write_half, LinesCodec::new())),
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> LineWriter for FramedWriter<W> {
    async fn write_line(&self, line: &str) -> Result<(), LinkError> {
        trace!(line = %line, "->");
        let mut framed = self.inner.lock().await;
        // `send` flushes after the item is encoded.
        framed.send(line).await?;
        Ok(())
    }
}

/// Captures written lines for tests.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingWriter {
    lines: parking_lot::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Drain and return everything written so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }
}

#[cfg(test)]
#[async_trait]
impl LineWriter for RecordingWriter {
    async fn write_line(&self, line: &str) -> Result<(), LinkError> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn framed_writer_terminates_each_line() {
        let (client, mut server) = tokio::io::duplex(256);
        let writer = FramedWriter::new(client);
        writer.write_line("AS EB").await.unwrap();
        writer.write_line("AS G :ping").await.unwrap();
        drop(writer);

        let mut received = String::new();
        server.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "AS EB\nAS G :ping\n");
    }
}
