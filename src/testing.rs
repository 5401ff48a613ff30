//! Test helpers: the client side of an in-memory connection

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{
    duplex, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, Lines,
    ReadBuf, ReadHalf, WriteHalf,
};
use tokio::time::timeout;

use crate::connection::Connection;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);
const SILENCE: Duration = Duration::from_millis(100);

pub(crate) struct TestClient {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl TestClient {
    /// A client plus the server-side connection it talks to
    pub(crate) fn pair(peer: &str) -> (Self, Connection) {
        Self::pair_with_capacity(peer, 4096)
    }

    /// Like [`TestClient::pair`] with a chosen transport buffer size
    pub(crate) fn pair_with_capacity(peer: &str, capacity: usize) -> (Self, Connection) {
        let (client, server) = duplex(capacity);
        (Self::wrap(client), Connection::new(server, format!("{}:test", peer)))
    }

    /// A pair whose next server-side write fails once the returned flag is set
    pub(crate) fn breakable_pair(peer: &str) -> (Self, Connection, Arc<AtomicBool>) {
        let (client, server) = duplex(4096);
        let fail_next = Arc::new(AtomicBool::new(false));
        let server = BreakableStream {
            inner: server,
            fail_next: fail_next.clone(),
        };
        let connection = Connection::new(server, format!("{}:test", peer));
        (Self::wrap(client), connection, fail_next)
    }

    fn wrap(client: DuplexStream) -> Self {
        let (read_half, writer) = tokio::io::split(client);
        Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    pub(crate) async fn send(&mut self, line: &str) {
        self.try_send(line).await.unwrap();
    }

    /// Write a line, reporting failure instead of panicking
    pub(crate) async fn try_send(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(format!("{}\n", line).as_bytes()).await?;
        self.writer.flush().await
    }

    pub(crate) async fn recv(&mut self) -> String {
        timeout(RECV_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap()
            .expect("connection closed")
    }

    pub(crate) async fn closed(&mut self) -> bool {
        matches!(
            timeout(RECV_TIMEOUT, self.lines.next_line()).await,
            Ok(Ok(None)) | Ok(Err(_))
        )
    }

    pub(crate) async fn silent(&mut self) -> bool {
        timeout(SILENCE, self.lines.next_line()).await.is_err()
    }
}

/// Server-side stream that can be told to fail exactly one write
struct BreakableStream {
    inner: DuplexStream,
    fail_next: Arc<AtomicBool>,
}

impl AsyncRead for BreakableStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for BreakableStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
