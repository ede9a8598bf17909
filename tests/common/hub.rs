//! Fake P10 hub.
//!
//! Listens on an ephemeral port, accepts the services link and lets tests
//! send lines and wait for expected replies.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

/// A listening hub waiting for services to connect.
pub struct FakeHub {
    listener: TcpListener,
}

impl FakeHub {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener })
    }

    pub fn address(&self) -> anyhow::Result<String> {
        Ok(self.listener.local_addr()?.to_string())
    }

    /// Accept the services connection.
    pub async fn accept(&self) -> anyhow::Result<HubLink> {
        let (stream, _) = timeout(Duration::from_secs(10), self.listener.accept()).await??;
        let (read_half, write_half) = stream.into_split();
        Ok(HubLink {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        })
    }
}

/// The hub's side of an accepted link.
pub struct HubLink {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl HubLink {
    /// Send a raw line.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Receive one line, without its terminator.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        let mut line = String::new();
        let read = timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await??;
        if read == 0 {
            anyhow::bail!("services closed the link");
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Read lines until one satisfies `pred`, returning it.
    pub async fn expect<F>(&mut self, pred: F) -> anyhow::Result<String>
    where
        F: Fn(&str) -> bool,
    {
        loop {
            let line = self.recv().await?;
            if pred(&line) {
                return Ok(line);
            }
        }
    }
}
