//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl+C) or SIGTERM
//! - Report which one arrived so startup code can trigger shutdown

use std::io;

/// Termination signals the balancer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

/// Wait until the process is asked to stop.
pub async fn wait_for_signal() -> io::Result<Signal> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.map(|_| Signal::Interrupt),
            _ = terminate.recv() => Ok(Signal::Terminate),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|_| Signal::Interrupt)
    }
}
