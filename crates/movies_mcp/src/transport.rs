//! Newline-delimited JSON transport (`spec.md` §4.A).
//!
//! One request per line on the read side, preserving arrival order; one
//! response per line on the write side, with concurrent writers serialized
//! so two responses never interleave mid-line. Production wraps the
//! process's stdio; tests use an in-memory channel pair so the protocol
//! engine never has to spawn a child process.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Reads the next complete line. `Ok(None)` signals EOF.
    async fn read_line(&self) -> std::io::Result<Option<String>>;

    /// Writes one line, atomically with respect to other writers.
    async fn write_line(&self, line: &str) -> std::io::Result<()>;
}

/// Wraps the process's stdin/stdout.
pub struct StdioTransport {
    reader: Mutex<BufReader<tokio::io::Stdin>>,
    writer: Mutex<tokio::io::Stdout>,
}

impl StdioTransport {
    pub fn new() -> Self {
        Self {
            reader: Mutex::new(BufReader::new(tokio::io::stdin())),
            writer: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn read_line(&self) -> std::io::Result<Option<String>> {
        let mut reader = self.reader.lock().await;
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }

    async fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }
}

/// In-memory transport for tests: inbound lines are fed through an
/// `mpsc::UnboundedSender<String>` handed back to the caller; outbound
/// lines go out the other `mpsc::UnboundedSender<String>`, also handed
/// back, so a test can both drive the server and assert on its replies.
pub struct ChannelTransport {
    incoming: Mutex<mpsc::UnboundedReceiver<String>>,
    outgoing: mpsc::UnboundedSender<String>,
}

impl ChannelTransport {
    /// Returns the transport plus the sender tests use to push inbound
    /// lines and the receiver tests use to collect outbound lines.
    pub fn new() -> (Self, mpsc::UnboundedSender<String>, mpsc::UnboundedReceiver<String>) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (
            Self {
                incoming: Mutex::new(in_rx),
                outgoing: out_tx,
            },
            in_tx,
            out_rx,
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn read_line(&self) -> std::io::Result<Option<String>> {
        Ok(self.incoming.lock().await.recv().await)
    }

    async fn write_line(&self, line: &str) -> std::io::Result<()> {
        self.outgoing
            .send(line.to_string())
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "receiver dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_transport_round_trips_a_line() {
        let (transport, in_tx, mut out_rx) = ChannelTransport::new();
        in_tx.send("hello".to_string()).unwrap();
        let line = transport.read_line().await.unwrap();
        assert_eq!(line.as_deref(), Some("hello"));

        transport.write_line("world").await.unwrap();
        assert_eq!(out_rx.recv().await.as_deref(), Some("world"));
    }

    #[tokio::test]
    async fn dropping_the_sender_signals_eof() {
        let (transport, in_tx, _out_rx) = ChannelTransport::new();
        drop(in_tx);
        let line = transport.read_line().await.unwrap();
        assert!(line.is_none());
    }
}
