//! TCP listener and accept loop.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections and spawn one session task each
//! - Survive transient accept errors, stop on listener-level failures
//! - Stop accepting when shutdown is signalled

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::ListenerConfig;
use crate::observability::metrics;
use crate::proxy::Proxy;
use crate::resilience::backoff::Backoff;

/// First delay after a transient accept error.
const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(5);
/// Longest delay between accept attempts while errors persist.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind(io::Error),
    /// The listener itself became unusable.
    Accept(io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind(e) | ListenerError::Accept(e) => Some(e),
        }
    }
}

/// Whether an accept error means the listening socket is no longer usable.
///
/// Everything else (aborted handshakes, resets, descriptor exhaustion) is
/// specific to one connection or passes with time.
pub fn is_fatal_accept_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::InvalidInput | io::ErrorKind::NotConnected | io::ErrorKind::Unsupported
    )
}

/// The proxy's listening socket.
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
}

impl Listener {
    /// Bind to the configured address.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|e| ListenerError::Bind(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(ListenerError::Bind)?;

        let local_addr = listener
            .local_addr()
            .map_err(ListenerError::Bind)?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self { inner: listener })
    }

    /// Wrap an already bound listener.
    pub fn from_tcp(inner: TcpListener) -> Self {
        Self { inner }
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        self.inner.local_addr()
    }

    /// Accept connections until shutdown or a fatal listener error.
    ///
    /// Each connection is handed to `proxy` on its own task, so a slow
    /// session never holds up the loop.
    pub async fn run(
        self,
        proxy: Arc<Proxy>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let mut backoff = Backoff::new(ACCEPT_BACKOFF_BASE, ACCEPT_BACKOFF_MAX);

        loop {
            let accepted = tokio::select! {
                res = self.inner.accept() => res,
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    return Ok(());
                }
            };

            match accepted {
                Ok((stream, peer)) => {
                    backoff.reset();
                    tracing::debug!(peer_addr = %peer, "Connection accepted");

                    let proxy = Arc::clone(&proxy);
                    tokio::spawn(async move {
                        proxy.handle(stream, peer).await;
                    });
                }
                Err(e) if is_fatal_accept_error(&e) => {
                    tracing::error!(error = %e, "Listener failed");
                    return Err(ListenerError::Accept(e));
                }
                Err(e) => {
                    metrics::record_accept_error();
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        error = %e,
                        consecutive = backoff.failures(),
                        retry_in = ?delay,
                        "Accept failed"
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.recv() => {
                            tracing::info!("Shutdown signal received, no longer accepting");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
