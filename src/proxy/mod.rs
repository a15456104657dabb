//! Connection proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted client connection
//!     → session.rs (select backend, dial with deadline)
//!         → dial failed: response.rs (502 to client) → close
//!         → dialed: relay.rs ×2 (client→backend, backend→client)
//!     → first relay to end triggers teardown of the other
//!     → both sockets closed, report returned
//! ```
//!
//! # Design Decisions
//! - One task per session, one task per relay direction
//! - Socket halves are owned by exactly one task each; closing is drop
//! - Per-session failures never escape the session

pub mod relay;
pub mod response;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::Instrument;

use crate::config::TimeoutConfig;
use crate::load_balancer::BackendPool;
use crate::net::connection::ConnectionTracker;

pub use session::{Session, SessionOutcome, SessionReport, SessionSettings, SessionState};

impl From<&TimeoutConfig> for SessionSettings {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            connect_timeout: config.connect(),
            half_close_grace: config.half_close(),
        }
    }
}

/// Shared entry point for sessions: the pool plus session settings.
#[derive(Debug)]
pub struct Proxy {
    pool: Arc<BackendPool>,
    settings: SessionSettings,
    tracker: ConnectionTracker,
}

impl Proxy {
    pub fn new(pool: Arc<BackendPool>, settings: SessionSettings) -> Self {
        Self {
            pool,
            settings,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Proxy one accepted client connection to the next backend.
    ///
    /// Takes ownership of `client`; it is closed before this returns.
    pub async fn handle(&self, client: TcpStream, peer: SocketAddr) -> SessionReport {
        let guard = self.tracker.track();
        let span = tracing::info_span!("session", id = %guard.id(), peer = %peer);

        let report = Session::new(guard.id(), peer)
            .run(client, &self.pool, &self.settings)
            .instrument(span)
            .await;

        drop(guard);
        report
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Live session tracking, used to drain on shutdown.
    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }
}
