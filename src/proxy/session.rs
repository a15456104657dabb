//! One proxied client session.
//!
//! # Responsibilities
//! - Select a backend and dial it with a deadline
//! - Answer the client directly when the backend is unreachable
//! - Run the two relay tasks and join their lifetimes
//! - Close both sockets on every exit path
//!
//! # State Machine
//! ```text
//! Created → BackendSelected → Dialing → Relaying → Closing → Closed
//!                                │                    ▲
//!                                └── dial failure ────┘
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::{JoinError, JoinHandle};

use crate::load_balancer::{BackendPool, SelectedBackend};
use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::proxy::relay::{relay, Direction, RelayOutcome, RelayReport};
use crate::proxy::response::reject_unavailable;
use crate::resilience::timeouts::{connect_with_timeout, DialError};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    BackendSelected,
    Dialing,
    Relaying,
    Closing,
    Closed,
}

impl SessionState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Created, BackendSelected)
                | (BackendSelected, Dialing)
                | (Dialing, Relaying)
                | (Dialing, Closing)
                | (Relaying, Closing)
                | (Closing, Closed)
        )
    }
}

/// Timing knobs for a session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Deadline for dialing the backend and for writing the failure response.
    pub connect_timeout: Duration,
    /// How long the surviving relay may drain after the other hit EOF.
    pub half_close_grace: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            half_close_grace: Duration::from_secs(5),
        }
    }
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// Backend unreachable; the client got the unavailable response.
    DialFailed(DialError),
    /// Both directions relayed until teardown.
    Relayed {
        client_to_backend: RelayReport,
        backend_to_client: RelayReport,
    },
}

/// Summary of a finished session.
#[derive(Debug)]
pub struct SessionReport {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub backend: SelectedBackend,
    pub outcome: SessionOutcome,
}

impl SessionReport {
    pub fn is_dial_failure(&self) -> bool {
        matches!(self.outcome, SessionOutcome::DialFailed(_))
    }
}

/// A session in progress. Owns the client connection from creation.
pub struct Session {
    id: ConnectionId,
    peer: SocketAddr,
    state: SessionState,
}

impl Session {
    pub fn new(id: ConnectionId, peer: SocketAddr) -> Self {
        Self {
            id,
            peer,
            state: SessionState::Created,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal session transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(from = ?self.state, to = ?next, "Session state");
        self.state = next;
    }

    /// Drive the session to completion.
    pub async fn run(
        mut self,
        mut client: TcpStream,
        pool: &BackendPool,
        settings: &SessionSettings,
    ) -> SessionReport {
        let backend = pool.select();
        self.advance(SessionState::BackendSelected);
        metrics::record_session_started(&backend.name);
        tracing::debug!(
            backend = %backend.name,
            addr = %backend.addr,
            index = backend.index,
            routed = backend.connections,
            "Backend selected"
        );

        self.advance(SessionState::Dialing);
        let upstream = match connect_with_timeout(&backend.addr, settings.connect_timeout).await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(backend = %backend.name, error = %err, "Backend unavailable");
                metrics::record_dial_failure(&backend.name);

                self.advance(SessionState::Closing);
                reject_unavailable(&mut client, settings.connect_timeout).await;
                drop(client);
                self.advance(SessionState::Closed);
                metrics::record_session_finished();

                return self.report(backend, SessionOutcome::DialFailed(err));
            }
        };

        self.advance(SessionState::Relaying);
        tracing::debug!(backend = %backend.name, "Relaying");
        let (client_to_backend, backend_to_client) =
            relay_pair(client, upstream, settings.half_close_grace).await;

        self.advance(SessionState::Closing);
        metrics::record_relay_bytes(Direction::ClientToBackend, client_to_backend.bytes);
        metrics::record_relay_bytes(Direction::BackendToClient, backend_to_client.bytes);
        tracing::info!(
            backend = %backend.name,
            sent = client_to_backend.bytes,
            received = backend_to_client.bytes,
            upstream_end = ?client_to_backend.outcome,
            downstream_end = ?backend_to_client.outcome,
            "Session closed"
        );
        self.advance(SessionState::Closed);
        metrics::record_session_finished();

        self.report(
            backend,
            SessionOutcome::Relayed {
                client_to_backend,
                backend_to_client,
            },
        )
    }

    fn report(&self, backend: SelectedBackend, outcome: SessionOutcome) -> SessionReport {
        SessionReport {
            id: self.id,
            peer: self.peer,
            backend,
            outcome,
        }
    }
}

/// Relay both directions on their own tasks and join them.
///
/// The first relay to finish decides the teardown: after an error the other
/// is aborted at once, after EOF it gets `grace` to drain. Each socket half
/// is owned by exactly one task, so aborting a task closes its halves and a
/// socket is closed once both of its halves are gone.
///
/// Returns `(client_to_backend, backend_to_client)`.
pub async fn relay_pair(
    client: TcpStream,
    backend: TcpStream,
    grace: Duration,
) -> (RelayReport, RelayReport) {
    // Latency over batching; failure here is harmless.
    let _ = client.set_nodelay(true);
    let _ = backend.set_nodelay(true);

    let (client_read, client_write) = client.into_split();
    let (backend_read, backend_write) = backend.into_split();

    let up_bytes = Arc::new(AtomicU64::new(0));
    let down_bytes = Arc::new(AtomicU64::new(0));

    let mut upstream = tokio::spawn(relay(
        client_read,
        backend_write,
        Direction::ClientToBackend,
        Arc::clone(&up_bytes),
    ));
    let mut downstream = tokio::spawn(relay(
        backend_read,
        client_write,
        Direction::BackendToClient,
        Arc::clone(&down_bytes),
    ));

    let (first_direction, first, survivor) = tokio::select! {
        res = &mut upstream => (Direction::ClientToBackend, settle(res), downstream),
        res = &mut downstream => (Direction::BackendToClient, settle(res), upstream),
    };

    let rest = if first.is_clean() {
        finish_within(survivor, grace).await
    } else {
        tracing::debug!(direction = %first_direction, "Relay failed, tearing down session");
        cancel(survivor).await
    };

    let (up, down) = match first_direction {
        Direction::ClientToBackend => (first, rest),
        Direction::BackendToClient => (rest, first),
    };

    (
        RelayReport {
            direction: Direction::ClientToBackend,
            bytes: up_bytes.load(Ordering::Relaxed),
            outcome: up,
        },
        RelayReport {
            direction: Direction::BackendToClient,
            bytes: down_bytes.load(Ordering::Relaxed),
            outcome: down,
        },
    )
}

async fn finish_within(mut task: JoinHandle<RelayOutcome>, grace: Duration) -> RelayOutcome {
    match tokio::time::timeout(grace, &mut task).await {
        Ok(res) => settle(res),
        Err(_) => {
            tracing::info!(grace = ?grace, "Half-close grace elapsed, closing session");
            cancel(task).await
        }
    }
}

/// Abort a relay and wait until its socket halves are dropped.
async fn cancel(task: JoinHandle<RelayOutcome>) -> RelayOutcome {
    task.abort();
    settle(task.await)
}

fn settle(res: Result<RelayOutcome, JoinError>) -> RelayOutcome {
    match res {
        Ok(outcome) => outcome,
        Err(e) if e.is_cancelled() => RelayOutcome::Cancelled,
        Err(e) => RelayOutcome::Error(io::Error::other(format!("relay task panicked: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn happy_path_transitions() {
        let path = [Created, BackendSelected, Dialing, Relaying, Closing, Closed];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn dial_failure_skips_relaying() {
        assert!(Dialing.can_advance_to(Closing));
        assert!(!Dialing.can_advance_to(Closed));
    }

    #[test]
    fn no_backwards_or_skipping_edges() {
        assert!(!Created.can_advance_to(Dialing));
        assert!(!Relaying.can_advance_to(Dialing));
        assert!(!Closed.can_advance_to(Created));
        assert!(!Closing.can_advance_to(Relaying));
        assert!(!BackendSelected.can_advance_to(Relaying));
    }

    #[test]
    fn new_session_starts_created() {
        let session = Session::new(ConnectionId::new(), "127.0.0.1:1".parse().unwrap());
        assert_eq!(session.state(), Created);
    }

    #[tokio::test]
    async fn survivor_past_grace_is_cancelled() {
        let stuck = tokio::spawn(std::future::pending::<RelayOutcome>());
        let outcome = finish_within(stuck, Duration::from_millis(20)).await;
        assert!(matches!(outcome, RelayOutcome::Cancelled));

        let done = tokio::spawn(async { RelayOutcome::Eof });
        let outcome = finish_within(done, Duration::from_secs(1)).await;
        assert!(matches!(outcome, RelayOutcome::Eof));
    }
}
