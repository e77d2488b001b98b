//! HTTP plumbing shared by the providers: status mapping and SSE framing.

use std::time::Duration;

use ragent_core::error::ProviderError;
use tracing::warn;

/// Build the shared HTTP client. Falls back to reqwest's defaults if the
/// TLS backend cannot be initialised with a timeout.
pub(crate) fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Map a non-success response onto the provider error taxonomy.
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    match status {
        429 => {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            Err(ProviderError::RateLimited { retry_after_secs })
        }
        401 | 403 => Err(ProviderError::AuthenticationFailed(format!(
            "{provider}: invalid API key or insufficient permissions"
        ))),
        404 => {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::ModelNotFound(body))
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            warn!(provider, status, body = %body, "Provider returned error");
            Err(ProviderError::ApiError {
                status_code: status,
                message: body,
            })
        }
    }
}

pub(crate) fn network_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Splits a server-sent-events byte stream into `data:` payloads.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across network chunks decode intact.
#[derive(Debug, Default)]
pub(crate) struct SseBuffer {
    pending: Vec<u8>,
}

impl SseBuffer {
    /// Feed raw bytes, returning every complete `data:` payload.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    payloads.push(data.to_string());
                }
            }
        }
        payloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer one request with a canned response head and body.
    async fn respond_once(head: &'static str, body: &'static str) -> reqwest::Response {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let reply = format!(
                "{head}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
        });
        client(Duration::from_secs(5))
            .get(format!("http://{addr}/"))
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn any_2xx_status_is_accepted() {
        for head in ["HTTP/1.1 200 OK", "HTTP/1.1 201 Created", "HTTP/1.1 202 Accepted"] {
            let response = respond_once(head, "{}").await;
            assert!(check_status("test", response).await.is_ok(), "{head}");
        }
    }

    #[tokio::test]
    async fn error_statuses_map_to_provider_errors() {
        let response = respond_once("HTTP/1.1 503 Service Unavailable", "overloaded").await;
        match check_status("test", response).await {
            Err(ProviderError::ApiError { status_code, message }) => {
                assert_eq!(status_code, 503);
                assert_eq!(message, "overloaded");
            }
            other => panic!("expected ApiError, got {:?}", other.map(|r| r.status())),
        }

        let response = respond_once("HTTP/1.1 429 Too Many Requests\r\nretry-after: 12", "").await;
        assert!(matches!(
            check_status("test", response).await,
            Err(ProviderError::RateLimited { retry_after_secs: 12 })
        ));

        let response = respond_once("HTTP/1.1 401 Unauthorized", "").await;
        assert!(matches!(
            check_status("test", response).await,
            Err(ProviderError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn sse_splits_lines_and_skips_comments() {
        let mut sse = SseBuffer::default();
        let out = sse.push(b": keep-alive\nevent: ping\ndata: {\"a\":1}\r\n\ndata:[DONE]\n");
        assert_eq!(out, vec!["{\"a\":1}", "[DONE]"]);
    }

    #[test]
    fn sse_holds_partial_line() {
        let mut sse = SseBuffer::default();
        assert!(sse.push(b"data: {\"content\":").is_empty());
        assert_eq!(sse.push(b"\"hi\"}\n"), vec!["{\"content\":\"hi\"}"]);
    }

    #[test]
    fn sse_keeps_split_utf8_intact() {
        let text = "data: 这是\n".as_bytes();
        // Split inside the first CJK character.
        let (a, b) = text.split_at(7);
        let mut sse = SseBuffer::default();
        assert!(sse.push(a).is_empty());
        assert_eq!(sse.push(b), vec!["这是"]);
    }
}
