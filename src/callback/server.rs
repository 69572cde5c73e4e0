//! Local callback listener
//!
//! A small HTTP server the payment processor pushes notifications to.
//! One fallback handler answers every path, because the processor POSTs
//! to whatever callback URL it was handed; the method alone decides the
//! acknowledgement. The response body never varies with the processing
//! outcome.

use axum::Router;
use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::Method;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::registry::CallbackRegistry;
use crate::config::CallbackConfig;
use crate::moneropay::PaymentEvent;
use crate::payment::ChannelEvent;

/// Acknowledgement body for every POST, processed or not.
pub const ACK_PROCESSED: &str = "Callback processed successfully";
/// Acknowledgement body for any non-POST request.
pub const ACK_INVALID_METHOD: &str = "Invalid request method";

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Failed to bind callback listener: {0}")]
    Bind(std::io::Error),

    #[error("Callback listener failed: {0}")]
    Serve(std::io::Error),
}

struct ListenerShared {
    registry: Arc<CallbackRegistry>,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

pub struct CallbackListener {
    shared: Arc<ListenerShared>,
}

impl CallbackListener {
    pub fn new(
        registry: Arc<CallbackRegistry>,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Self {
        Self {
            shared: Arc::new(ListenerShared { registry, events }),
        }
    }

    /// The router alone, for in-process tests.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(acknowledge)
            .with_state(self.shared.clone())
    }

    /// Bind and serve until the process ends.
    pub async fn run(self, config: &CallbackConfig) -> Result<(), ListenerError> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!(addr, error = %e, "Failed to bind callback listener");
                return Err(ListenerError::Bind(e));
            }
        };

        println!("📡 Callback listener on http://{}", addr);

        axum::serve(listener, self.router())
            .await
            .map_err(ListenerError::Serve)
    }
}

/// Single handler for every inbound request.
async fn acknowledge(
    State(shared): State<Arc<ListenerShared>>,
    method: Method,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> &'static str {
    if method != Method::POST {
        debug!(%method, "Non-POST callback request");
        return ACK_INVALID_METHOD;
    }

    let query = query.unwrap_or_default();

    let Some(correlation_id) = query_param(&query, "correlationId")
        .and_then(|raw| Uuid::parse_str(&raw).ok())
    else {
        debug!("Callback without a parseable correlationId; acknowledged only");
        return ACK_PROCESSED;
    };

    let Some(registered_fiat) = shared.registry.expectation(&correlation_id) else {
        debug!(%correlation_id, "Callback for unregistered correlation id; acknowledged only");
        return ACK_PROCESSED;
    };

    let event: PaymentEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(%correlation_id, error = %e, "Dropping malformed callback body");
            return ACK_PROCESSED;
        }
    };

    let fiat_value = query_param(&query, "fiatValue")
        .and_then(|raw| raw.parse::<f64>().ok())
        .unwrap_or(registered_fiat);

    // The send never blocks the response. A closed mailbox means the
    // reconciler is gone; the processor still gets its acknowledgement.
    if shared
        .events
        .send(ChannelEvent::Callback {
            correlation_id,
            event,
            fiat_value,
        })
        .is_err()
    {
        warn!(%correlation_id, "Reconciler mailbox closed; callback dropped");
    }

    ACK_PROCESSED
}

fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then(|| v.to_string())
    })
}
