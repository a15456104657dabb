//! Timeout enforcement for outbound dials.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;

use crate::load_balancer::BackendAddr;

/// Why a backend could not be reached.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("connect to {addr} timed out after {timeout:?}")]
    Timeout { addr: BackendAddr, timeout: Duration },

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: BackendAddr,
        #[source]
        source: io::Error,
    },
}

/// Connect to a backend, giving up after `timeout`.
///
/// Name resolution counts against the same deadline.
pub async fn connect_with_timeout(
    addr: &BackendAddr,
    timeout: Duration,
) -> Result<TcpStream, DialError> {
    let connect = TcpStream::connect((addr.host.as_str(), addr.port));
    dial_within(addr, timeout, connect).await
}

/// Await `connect`, mapping its failure or the elapsed deadline to a [`DialError`].
async fn dial_within<F>(addr: &BackendAddr, timeout: Duration, connect: F) -> Result<TcpStream, DialError>
where
    F: Future<Output = io::Result<TcpStream>>,
{
    match tokio::time::timeout(timeout, connect).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(DialError::Connect {
            addr: addr.clone(),
            source,
        }),
        Err(_) => Err(DialError::Timeout {
            addr: addr.clone(),
            timeout,
        }),
    }
}
