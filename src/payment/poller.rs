//! Periodic status poller.
//!
//! Safety net under the push stream: fetches the receive status on a
//! fixed cadence and forwards whatever it gets, errors included. The
//! reconciler decides what an error means; the poller only checks that
//! its receive is still the active one before spending a request on it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::debug;
use uuid::Uuid;

use super::reconciler::ReconcilerCore;
use super::types::ChannelEvent;
use crate::moneropay::PaymentGateway;

pub struct StatusPoller {
    gateway: Arc<dyn PaymentGateway>,
    core: Arc<ReconcilerCore>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    correlation_id: Uuid,
    transaction_id: String,
    interval: Duration,
}

impl StatusPoller {
    pub(crate) fn new(
        gateway: Arc<dyn PaymentGateway>,
        core: Arc<ReconcilerCore>,
        events: mpsc::UnboundedSender<ChannelEvent>,
        correlation_id: Uuid,
        transaction_id: String,
        interval: Duration,
    ) -> Self {
        Self {
            gateway,
            core,
            events,
            correlation_id,
            transaction_id,
            interval,
        }
    }

    /// Poll until the receive is superseded or the mailbox closes.
    pub async fn run(self) {
        loop {
            if self.core.active_correlation().await != Some(self.correlation_id) {
                break;
            }

            let result = self.gateway.receive_status(&self.transaction_id).await;
            let event = ChannelEvent::Poll {
                transaction_id: self.transaction_id.clone(),
                result,
            };
            if self.events.send(event).is_err() {
                break;
            }

            sleep(self.interval).await;
        }

        debug!(correlation_id = %self.correlation_id, "Status poller stopped");
    }
}
