use std::time::Duration;

use tokio::io::{
    duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};
use tokio::time::timeout;

use line_chat::{Director, WELCOME};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);
const SILENCE: Duration = Duration::from_millis(150);

/// Client side of an in-memory connection handed to the Director
pub struct Client {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

#[allow(dead_code)]
impl Client {
    pub async fn connect(director: &Director, peer: &str) -> Self {
        Self::connect_with_capacity(director, peer, 64 * 1024).await
    }

    /// Connect with a small transport buffer to model a slow reader
    pub async fn connect_with_capacity(director: &Director, peer: &str, capacity: usize) -> Self {
        let (client, server) = duplex(capacity);
        director
            .intake(server, format!("{}:test", peer))
            .await
            .expect("director accepts connections");
        let (read_half, writer) = tokio::io::split(client);
        Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    /// Connect, answer the prompt with `name`; the roster is left unread
    pub async fn join(director: &Director, name: &str) -> Self {
        let mut client = Self::connect(director, name).await;
        assert_eq!(client.recv().await, WELCOME);
        client.send(name).await;
        client
    }

    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .unwrap();
    }

    pub async fn recv(&mut self) -> String {
        timeout(RECV_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap()
            .expect("connection closed")
    }

    pub async fn closed(&mut self) -> bool {
        matches!(
            timeout(RECV_TIMEOUT, self.lines.next_line()).await,
            Ok(Ok(None)) | Ok(Err(_))
        )
    }

    pub async fn silent(&mut self) -> bool {
        timeout(SILENCE, self.lines.next_line()).await.is_err()
    }
}
