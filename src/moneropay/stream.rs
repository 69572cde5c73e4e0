//! Gateway push stream client
//!
//! Subscribes to the per-transaction WebSocket endpoint and yields status
//! documents as they arrive. The stream is deliberately one-shot: a close
//! frame or transport error ends it, and the caller decides whether a new
//! subscription is worth opening (the poller keeps running either way).

use super::error::GatewayError;
use super::models::ReceiveStatus;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

/// Factory for per-transaction status subscriptions.
#[derive(Debug, Clone)]
pub struct StatusStreamClient {
    ws_base: String,
}

impl StatusStreamClient {
    /// Build from the gateway HTTP base URL; the scheme is rewritten to
    /// its WebSocket counterpart.
    pub fn new(base_url: &str) -> Self {
        let trimmed = base_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = trimmed.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = trimmed.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            trimmed.to_string()
        };
        Self { ws_base }
    }

    pub fn endpoint(&self, transaction_id: &str) -> String {
        format!("{}/receive/{}/stream", self.ws_base, transaction_id)
    }

    /// Open a subscription scoped to one transaction.
    pub async fn subscribe(&self, transaction_id: &str) -> Result<StatusStream, GatewayError> {
        let url = self.endpoint(transaction_id);
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| GatewayError::Stream(format!("connect to {} failed: {}", url, e)))?;

        debug!(transaction_id, "Status stream connected");
        Ok(StatusStream { socket })
    }
}

/// A live push subscription. Pull payloads with [`next_status`].
///
/// [`next_status`]: StatusStream::next_status
pub struct StatusStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl StatusStream {
    /// Next status payload, or `None` once the stream has ended.
    ///
    /// A server close frame ends the stream normally. A transport error
    /// ends it too, after a warning; it is never escalated. Frames that
    /// fail to parse are skipped without ending the stream.
    pub async fn next_status(&mut self) -> Option<ReceiveStatus> {
        while let Some(frame) = self.socket.next().await {
            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<ReceiveStatus>(&text) {
                    Ok(status) => return Some(status),
                    Err(e) => {
                        warn!(error = %e, "Skipping malformed status frame");
                    }
                },
                Ok(Message::Close(_)) => {
                    debug!("Status stream closed by server");
                    return None;
                }
                // Ping/pong and binary frames are not status traffic
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Status stream transport error");
                    return None;
                }
            }
        }
        None
    }
}
