//! Unidirectional byte relay.
//!
//! One relay copies one direction of a session. On end-of-stream it
//! half-closes its destination so the peer sees EOF; it never closes the
//! source, which belongs to the opposite relay.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the per-relay copy buffer.
pub const RELAY_BUFFER_SIZE: usize = 16 * 1024;

/// Which way bytes flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ClientToBackend,
    BackendToClient,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ClientToBackend => "client_to_backend",
            Direction::BackendToClient => "backend_to_client",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a relay ended.
#[derive(Debug)]
pub enum RelayOutcome {
    /// Source reached end-of-stream and the destination was half-closed.
    Eof,
    /// Read or write failed.
    Error(io::Error),
    /// Torn down by the session after the other direction finished.
    Cancelled,
}

impl RelayOutcome {
    /// True when the relay finished on its own without error.
    pub fn is_clean(&self) -> bool {
        matches!(self, RelayOutcome::Eof)
    }
}

/// Final accounting for one direction of a session.
#[derive(Debug)]
pub struct RelayReport {
    pub direction: Direction,
    pub bytes: u64,
    pub outcome: RelayOutcome,
}

/// Copy `reader` into `writer` until EOF or error.
///
/// `transferred` is updated after every write so the count survives if the
/// task is aborted.
pub async fn relay<R, W>(
    mut reader: R,
    mut writer: W,
    direction: Direction,
    transferred: Arc<AtomicU64>,
) -> RelayOutcome
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(direction = %direction, error = %e, "Relay read failed");
                return RelayOutcome::Error(e);
            }
        };

        if let Err(e) = writer.write_all(&buf[..n]).await {
            tracing::debug!(direction = %direction, error = %e, "Relay write failed");
            return RelayOutcome::Error(e);
        }
        transferred.fetch_add(n as u64, Ordering::Relaxed);
    }

    // The peer may already be gone; EOF was still reached cleanly.
    if let Err(e) = writer.shutdown().await {
        tracing::trace!(direction = %direction, error = %e, "Half-close failed");
    }

    tracing::trace!(
        direction = %direction,
        bytes = transferred.load(Ordering::Relaxed),
        "Relay reached end of stream"
    );
    RelayOutcome::Eof
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn copies_until_eof_and_half_closes() {
        let (mut source, source_peer) = tokio::io::duplex(64);
        let (dest, mut dest_peer) = tokio::io::duplex(64);
        let counter = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(relay(
            source_peer,
            dest,
            Direction::ClientToBackend,
            Arc::clone(&counter),
        ));

        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let expected = payload.clone();
        let writer = tokio::spawn(async move {
            for chunk in payload.chunks(7) {
                source.write_all(chunk).await.unwrap();
            }
            source.shutdown().await.unwrap();
        });

        let mut received = Vec::new();
        dest_peer.read_to_end(&mut received).await.unwrap();
        writer.await.unwrap();

        assert!(task.await.unwrap().is_clean());
        assert_eq!(received, expected);
        assert_eq!(counter.load(Ordering::Relaxed), expected.len() as u64);
    }

    #[tokio::test]
    async fn empty_stream_is_clean() {
        let (source, source_peer) = tokio::io::duplex(64);
        let (dest, mut dest_peer) = tokio::io::duplex(64);
        drop(source);

        let counter = Arc::new(AtomicU64::new(0));
        let outcome = relay(source_peer, dest, Direction::BackendToClient, Arc::clone(&counter)).await;
        assert!(outcome.is_clean());

        let mut received = Vec::new();
        dest_peer.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn write_failure_is_reported() {
        let (mut source, source_peer) = tokio::io::duplex(64);
        let (dest, dest_peer) = tokio::io::duplex(64);
        drop(dest_peer);

        source.write_all(b"hello").await.unwrap();
        let outcome = relay(source_peer, dest, Direction::ClientToBackend, Arc::new(AtomicU64::new(0))).await;
        assert!(matches!(outcome, RelayOutcome::Error(_)));
        assert!(!outcome.is_clean());
    }

    #[test]
    fn direction_labels() {
        assert_eq!(Direction::ClientToBackend.to_string(), "client_to_backend");
        assert_eq!(Direction::BackendToClient.as_str(), "backend_to_client");
    }
}
