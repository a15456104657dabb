//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use tcp_balancer::lifecycle::Shutdown;
use tcp_balancer::load_balancer::{Backend, BackendAddr, BackendPool};
use tcp_balancer::net::{Listener, ListenerError};
use tcp_balancer::proxy::{Proxy, SessionSettings};

/// Upper bound for any single wait in the tests.
#[allow(dead_code)]
pub const WAIT: Duration = Duration::from_secs(5);

/// Start a backend that echoes every byte and half-closes on EOF.
#[allow(dead_code)]
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.into_split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
                let _ = writer.shutdown().await;
            });
        }
    });

    addr
}

/// Start a backend that writes `body` immediately and closes.
#[allow(dead_code)]
pub async fn start_greeting_backend(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = socket.write_all(body.as_bytes()).await;
                let _ = socket.shutdown().await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            });
        }
    });

    addr
}

/// Start a backend that accepts and then never reads, writes or closes.
#[allow(dead_code)]
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

/// An address with nothing listening on it.
#[allow(dead_code)]
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// A running balancer bound to an ephemeral port.
#[allow(dead_code)]
pub struct Harness {
    pub addr: SocketAddr,
    pub proxy: Arc<Proxy>,
    pub shutdown: Shutdown,
    pub task: JoinHandle<Result<(), ListenerError>>,
}

/// Start the accept loop over `backends`, optionally with a starting cursor.
#[allow(dead_code)]
pub async fn start_balancer(backends: &[SocketAddr], cursor: Option<usize>) -> Harness {
    start_balancer_with(backends, cursor, test_settings()).await
}

#[allow(dead_code)]
pub async fn start_balancer_with(
    backends: &[SocketAddr],
    cursor: Option<usize>,
    settings: SessionSettings,
) -> Harness {
    let backends: Vec<Backend> = backends
        .iter()
        .enumerate()
        .map(|(i, addr)| {
            Backend::new(
                format!("backend-{}", i),
                BackendAddr::new(addr.ip().to_string(), addr.port()),
            )
        })
        .collect();

    let pool = match cursor {
        Some(cursor) => BackendPool::with_cursor(backends, cursor),
        None => BackendPool::new(backends),
    }
    .unwrap();

    let proxy = Arc::new(Proxy::new(Arc::new(pool), settings));
    let listener = Listener::from_tcp(TcpListener::bind("127.0.0.1:0").await.unwrap());
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let task = tokio::spawn(listener.run(Arc::clone(&proxy), shutdown.subscribe()));

    Harness {
        addr,
        proxy,
        shutdown,
        task,
    }
}

#[allow(dead_code)]
pub fn test_settings() -> SessionSettings {
    SessionSettings {
        connect_timeout: Duration::from_secs(1),
        half_close_grace: Duration::from_millis(200),
    }
}
