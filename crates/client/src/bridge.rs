//! HTTP bridge client used by the application tier after it persists an event.

use serde_json::Value;
use shared::{BroadcastRequest, BroadcastResponse};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The relay refused the body (4xx).
    #[error("relay rejected event ({status}): {reason}")]
    Rejected { status: u16, reason: String },
    /// Connect failure or timeout.
    #[error("relay unreachable: {0}")]
    Unreachable(reqwest::Error),
    #[error("bridge request failed: {0}")]
    Transport(reqwest::Error),
    #[error("relay returned {status}: {reason}")]
    Status { status: u16, reason: String },
}

impl From<reqwest::Error> for BridgeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            Self::Unreachable(e)
        } else {
            Self::Transport(e)
        }
    }
}

impl BridgeError {
    /// Status an application-tier `/api/broadcast` proxy should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Rejected { status, .. } => *status,
            Self::Unreachable(_) | Self::Transport(_) => 500,
            Self::Status { status, .. } => *status,
        }
    }
}

/// Posts events to the relay's `/broadcast` endpoint.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    base_url: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl BridgeClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// RELAY_URL (default `http://localhost:3001`) and optional BRIDGE_API_KEY.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("RELAY_URL").unwrap_or_else(|_| "http://localhost:3001".to_string());
        let client = Self::new(&base_url);
        match std::env::var("BRIDGE_API_KEY") {
            Ok(key) if !key.is_empty() => client.with_api_key(key),
            _ => client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn broadcast_url(&self) -> String {
        format!("{}/broadcast", self.base_url)
    }

    pub async fn publish(&self, req: &BroadcastRequest) -> Result<(), BridgeError> {
        let mut request = self.http.post(self.broadcast_url()).json(req);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let res = request.send().await?;
        let status = res.status();
        if status.is_success() {
            return Ok(());
        }

        let text = res.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<BroadcastResponse>(&text)
            .ok()
            .and_then(|r| r.error)
            .unwrap_or(text);
        if status.is_client_error() {
            Err(BridgeError::Rejected {
                status: status.as_u16(),
                reason,
            })
        } else {
            Err(BridgeError::Status {
                status: status.as_u16(),
                reason,
            })
        }
    }

    /// Best-effort publish: the caller's write already happened, so a relay
    /// failure is only logged.
    pub async fn notify(&self, channel: &str, kind: &str, message: Value) -> bool {
        let req = BroadcastRequest {
            kind: Some(kind.to_string()),
            channel: channel.to_string(),
            message,
        };
        match self.publish(&req).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(channel = %channel, kind = %kind, error = %e, "broadcast failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// One-shot HTTP responder; returns the base url and the captured request.
    async fn canned_relay(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf);
                if let Some(split) = text.find("\r\n\r\n") {
                    let len = text[..split]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if buf.len() >= split + 4 + len {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf).to_string()
        });
        (format!("http://{}", addr), handle)
    }

    fn request() -> BroadcastRequest {
        BroadcastRequest {
            kind: Some("message".to_string()),
            channel: "srv1-gen".to_string(),
            message: json!({"id": "m1", "content": "hi"}),
        }
    }

    #[test]
    fn broadcast_url_trims_trailing_slash() {
        let client = BridgeClient::new("http://relay:3001/");
        assert_eq!(client.broadcast_url(), "http://relay:3001/broadcast");
    }

    #[tokio::test]
    async fn publish_sends_body_and_bearer() {
        let (base, captured) = canned_relay("200 OK", r#"{"success":true}"#).await;
        let client = BridgeClient::new(&base).with_api_key("k1");

        client.publish(&request()).await.unwrap();

        let raw = captured.await.unwrap();
        assert!(raw.starts_with("POST /broadcast"));
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer k1"));
        assert!(raw.contains(r#""channel":"srv1-gen""#));
    }

    #[tokio::test]
    async fn client_errors_are_rejections() {
        let (base, _captured) = canned_relay(
            "400 Bad Request",
            r#"{"success":false,"error":"`channel` is missing or empty"}"#,
        )
        .await;
        let err = BridgeClient::new(&base).publish(&request()).await.unwrap_err();
        assert!(matches!(
            &err,
            BridgeError::Rejected { status: 400, reason } if reason.contains("channel")
        ));
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn unreachable_relay_maps_to_server_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = BridgeClient::new(&format!("http://{}", addr));
        let err = client.publish(&request()).await.unwrap_err();
        assert!(matches!(err, BridgeError::Unreachable(_)));
        assert_eq!(err.status_code(), 500);
        assert!(!client.notify("srv1-gen", "message", json!("hi")).await);
    }

    #[tokio::test]
    async fn bad_base_url_is_a_transport_error() {
        let client = BridgeClient::new("not a url");
        let err = client.publish(&request()).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
        assert_eq!(err.status_code(), 500);
    }
}
