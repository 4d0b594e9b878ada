//! Shared HTTP Client Module
//!
//! Provides global, lazy-initialized HTTP clients with connection pooling, and
//! the mapping from transport failures onto session error kinds.
//!
//! Timeouts are applied per request from each provider's configuration, so the
//! pooled clients themselves carry none.

use crate::error::SessionError;
use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// Global HTTP client for document uploads
///
/// Few idle connections: one session uploads at most one document at a time.
pub static UPLOAD_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .expect("Failed to create upload HTTP client")
});

/// Global HTTP client for text-completion requests
pub static COMPLETION_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(8)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .build()
        .expect("Failed to create completion HTTP client")
});

#[inline]
pub fn upload_client() -> &'static Client {
    &UPLOAD_CLIENT
}

#[inline]
pub fn completion_client() -> &'static Client {
    &COMPLETION_CLIENT
}

/// Map a transport-level reqwest failure onto the session taxonomy
///
/// Connection failures mean the provider was never reached. A timeout after the
/// connection was established is reported as a provider error without status.
pub fn classify_transport_error(err: &reqwest::Error, timeout: Duration) -> SessionError {
    if err.is_connect() {
        SessionError::NetworkUnavailable {
            message: err.to_string(),
        }
    } else if err.is_timeout() {
        SessionError::ProviderError {
            status: None,
            message: format!("no response within {}s", timeout.as_secs()),
        }
    } else if err.is_decode() || err.is_body() {
        SessionError::MalformedProviderResponse {
            message: err.to_string(),
        }
    } else {
        SessionError::NetworkUnavailable {
            message: err.to_string(),
        }
    }
}

/// One-shot HTTP server for wire-level client tests
#[cfg(test)]
pub(crate) mod test_server {
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Accept one connection, capture the raw request and answer after `delay`
    ///
    /// Returns the server's base URL and a handle resolving to the captured
    /// request text.
    pub(crate) async fn serve_once(
        status: u16,
        body: impl Into<String>,
        delay: Duration,
    ) -> (String, JoinHandle<String>) {
        let body = body.into();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;

            tokio::time::sleep(delay).await;
            let response = format!(
                "HTTP/1.1 {} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;

            request
        });

        (base_url, handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        while !request_complete(&buf) {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        String::from_utf8_lossy(&buf).into_owned()
    }

    fn request_complete(buf: &[u8]) -> bool {
        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let body = &buf[header_end + 4..];

        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok());

        match content_length {
            Some(len) => body.len() >= len,
            None if headers.contains("transfer-encoding: chunked") => body.ends_with(b"0\r\n\r\n"),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clients_are_created() {
        let _ = upload_client();
        let _ = completion_client();
    }

    #[test]
    fn test_clients_are_same_instance() {
        let client1 = completion_client();
        let client2 = completion_client();
        assert!(std::ptr::eq(client1, client2));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_unavailable() {
        // Port 1 (tcpmux) is not listening on test machines
        let err = upload_client()
            .get("http://127.0.0.1:1/")
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .unwrap_err();

        let mapped = classify_transport_error(&err, Duration::from_secs(5));
        assert_eq!(mapped.kind(), crate::error::ErrorKind::NetworkUnavailable);
    }
}
