//! Line-oriented byte transport underneath the protocol codec.

#[async_trait::async_trait]
pub trait LineSource: Send {
    /// Next line without its terminator, or `None` once the peer has closed.
    async fn recv_line(&mut self) -> anyhow::Result<Option<String>>;
}

#[async_trait::async_trait]
pub trait LineSink: Send {
    /// Write one line; the terminator is appended here.
    async fn send_line(&mut self, line: &str) -> anyhow::Result<()>;
    async fn shutdown(&mut self) -> anyhow::Result<()>;
}

pub mod line;

pub use line::{split, LineReader, LineWriter};
