//! Response written to a client whose backend could not be reached.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Body of the unavailable response.
pub const UNAVAILABLE_BODY: &str = "backend server not available\n";

/// How long to keep discarding client input after the response, so the
/// close does not turn into a reset that swallows the response.
const LINGER: Duration = Duration::from_millis(500);

/// Upper bound on input discarded while lingering.
const LINGER_LIMIT: usize = 64 * 1024;

/// Full wire bytes of the unavailable response.
pub fn unavailable_response() -> String {
    format!(
        "HTTP/1.1 502 Bad Gateway\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        UNAVAILABLE_BODY.len(),
        UNAVAILABLE_BODY
    )
}

/// Write the unavailable response, half-close, and drain briefly.
///
/// Writing is bounded by `timeout` and draining by a short linger; failures
/// only mean the client already left.
pub async fn reject_unavailable<S>(client: &mut S, timeout: Duration)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let response = unavailable_response();
    let written = tokio::time::timeout(timeout, async {
        client.write_all(response.as_bytes()).await?;
        client.shutdown().await
    })
    .await;

    match written {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "Failed to send unavailable response");
            return;
        }
        Err(_) => {
            tracing::debug!("Timed out sending unavailable response");
            return;
        }
    }

    let _ = tokio::time::timeout(LINGER, async {
        let mut buf = [0u8; 4096];
        let mut discarded = 0;
        while discarded < LINGER_LIMIT {
            match client.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => discarded += n,
            }
        }
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_is_well_formed() {
        let response = unavailable_response();
        assert!(response.starts_with("HTTP/1.1 502 Bad Gateway\r\n"));
        assert!(response.contains("Content-Length: 29\r\n"));
        assert!(response.ends_with("\r\n\r\nbackend server not available\n"));
    }

    #[tokio::test]
    async fn writes_response_then_eof() {
        let (mut proxy_side, mut client_side) = tokio::io::duplex(1024);

        let rejecting = tokio::spawn(async move {
            reject_unavailable(&mut proxy_side, Duration::from_secs(1)).await;
        });

        let mut received = String::new();
        client_side.read_to_string(&mut received).await.unwrap();
        drop(client_side);
        rejecting.await.unwrap();

        assert_eq!(received, unavailable_response());
    }
}
