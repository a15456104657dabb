//! Minimal backend for trying the balancer locally.
//!
//! Answers every connection with a small HTTP-shaped greeting and closes,
//! or echoes bytes back with `--echo`.

use clap::Parser;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use tcp_balancer::observability::logging;

#[derive(Parser)]
#[command(name = "demo-backend")]
#[command(about = "Demo backend for the TCP balancer", long_about = None)]
struct Cli {
    /// Port to listen on.
    #[arg(short, long, default_value_t = 8000)]
    port: u16,

    /// Name included in the greeting.
    #[arg(short, long, default_value = "backend server")]
    name: String,

    /// Echo input instead of greeting.
    #[arg(long)]
    echo: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(logging::env_filter("info"))
        .init();

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, name = %cli.name, echo = cli.echo, "Demo backend listening");

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "Accept failed");
                continue;
            }
        };
        tracing::info!(peer = %peer, "New connection");

        let name = cli.name.clone();
        let echo = cli.echo;
        tokio::spawn(async move {
            let res = if echo {
                echo_back(socket).await
            } else {
                greet(socket, &name).await
            };
            if let Err(e) = res {
                tracing::debug!(peer = %peer, error = %e, "Connection ended with error");
            }
        });
    }
}

async fn greet(mut socket: TcpStream, name: &str) -> std::io::Result<()> {
    // Read whatever request arrived first; the content is not inspected.
    let mut buf = [0u8; 4096];
    let _ = socket.read(&mut buf).await?;

    let body = format!("Hello from {}\n", name);
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

async fn echo_back(socket: TcpStream) -> std::io::Result<()> {
    let (mut reader, mut writer) = socket.into_split();
    tokio::io::copy(&mut reader, &mut writer).await?;
    writer.shutdown().await
}
