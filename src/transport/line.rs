//! Newline-framed reader and writer over any tokio byte stream.

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf,
    WriteHalf,
};

use crate::transport::{LineSink, LineSource};

pub struct LineReader<R> {
    inner: BufReader<R>,
    max_line_length: usize,
}

impl<R: AsyncRead + Unpin + Send> LineReader<R> {
    pub fn new(inner: R, max_line_length: usize) -> Self {
        Self {
            inner: BufReader::new(inner),
            max_line_length,
        }
    }
}

#[async_trait::async_trait]
impl<R: AsyncRead + Unpin + Send> LineSource for LineReader<R> {
    async fn recv_line(&mut self) -> anyhow::Result<Option<String>> {
        // One byte of slack for the terminator.
        let limit = self.max_line_length as u64 + 1;
        let mut buf = Vec::new();
        let n = (&mut self.inner)
            .take(limit)
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::ConnectionReset {
                    anyhow::anyhow!("Connection reset by peer")
                } else {
                    anyhow::anyhow!("Read error: {}", e)
                }
            })?;
        if n == 0 {
            return Ok(None);
        }
        if buf.last() != Some(&b'\n') && buf.len() as u64 >= limit {
            return Err(anyhow::anyhow!(
                "Line too long (max: {} bytes)",
                self.max_line_length
            ));
        }

        // Invalid bytes become U+FFFD and the line is left for the protocol
        // layer to reject.
        let mut line = String::from_utf8_lossy(&buf).into_owned();
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }
}

pub struct LineWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin + Send> LineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

fn write_error(e: std::io::Error) -> anyhow::Error {
    if e.kind() == std::io::ErrorKind::BrokenPipe || e.kind() == std::io::ErrorKind::ConnectionReset
    {
        anyhow::anyhow!("Connection closed by peer")
    } else {
        anyhow::anyhow!("Write error: {}", e)
    }
}

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send> LineSink for LineWriter<W> {
    async fn send_line(&mut self, line: &str) -> anyhow::Result<()> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.inner.write_all(&data).await.map_err(write_error)?;
        self.inner.flush().await.map_err(write_error)
    }

    async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.inner.shutdown().await.map_err(write_error)
    }
}

/// Split a stream into a bounded line reader and a line writer.
///
/// Works for `TcpStream` as well as `tokio::io::DuplexStream` in tests.
pub fn split<S>(
    stream: S,
    max_line_length: usize,
) -> (LineReader<ReadHalf<S>>, LineWriter<WriteHalf<S>>)
where
    S: AsyncRead + AsyncWrite + Send,
{
    let (read, write) = tokio::io::split(stream);
    (LineReader::new(read, max_line_length), LineWriter::new(write))
}
