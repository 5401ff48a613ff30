//! Line-oriented client connections
//!
//! Wraps any bidirectional byte stream (TCP socket, in-memory duplex, ...)
//! and splits it into a newline-framed reader and writer. Only the trailing
//! `\n` is stripped from incoming lines and a single `\n` terminates every
//! outgoing line.

use std::fmt;
use std::io;
use std::sync::Arc;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};

/// Any byte stream a client can be served over
pub trait Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> Stream for T {}

type BoxedStream = Box<dyn Stream>;

/// A client connection before it is split between a User's two tasks
pub struct Connection {
    reader: LineReader,
    writer: LineWriter,
}

impl Connection {
    /// Wrap a raw stream accepted by the outer process
    pub fn new<S: Stream>(stream: S, peer: impl Into<String>) -> Self {
        let peer: Arc<str> = peer.into().into();
        let (read_half, write_half) = tokio::io::split(Box::new(stream) as BoxedStream);
        Self {
            reader: LineReader {
                peer: peer.clone(),
                inner: BufReader::new(read_half),
            },
            writer: LineWriter {
                peer,
                inner: write_half,
            },
        }
    }

    /// Peer address used in logs and errors
    pub fn peer(&self) -> &str {
        &self.writer.peer
    }

    /// Read one line, see [`LineReader::read_line`]
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        self.reader.read_line().await
    }

    /// Write one newline-terminated line
    pub async fn write_line(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_line(text).await
    }

    /// Shut down the write side and drop the stream
    pub async fn close(self) {
        let Self { reader, mut writer } = self;
        let _ = writer.close().await;
        drop(reader);
    }

    /// Split into independently owned read and write paths
    ///
    /// Bytes already buffered by earlier reads stay with the reader.
    pub fn into_split(self) -> (LineReader, LineWriter) {
        (self.reader, self.writer)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").field("peer", &self.peer()).finish()
    }
}

/// Read path of a connection
pub struct LineReader {
    peer: Arc<str>,
    inner: BufReader<ReadHalf<BoxedStream>>,
}

impl LineReader {
    /// Read the next complete line with its `\n` stripped
    ///
    /// Returns `Ok(None)` at end of stream. A trailing fragment without a
    /// newline is discarded. There is no length limit beyond the delimiter.
    /// Bytes that are not valid UTF-8 become U+FFFD.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        let n = self.inner.read_until(b'\n', &mut buf).await?;
        if n == 0 || buf.last() != Some(&b'\n') {
            return Ok(None);
        }
        buf.pop();
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    /// Peer address
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

/// Write path of a connection
pub struct LineWriter {
    peer: Arc<str>,
    inner: WriteHalf<BoxedStream>,
}

impl LineWriter {
    /// Write `text` followed by a newline as one unit
    pub async fn write_line(&mut self, text: &str) -> io::Result<()> {
        let mut line = Vec::with_capacity(text.len() + 1);
        line.extend_from_slice(text.as_bytes());
        line.push(b'\n');
        self.inner.write_all(&line).await?;
        self.inner.flush().await
    }

    /// Shut down the write side
    pub async fn close(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }

    /// Peer address
    pub fn peer(&self) -> &str {
        &self.peer
    }
}
