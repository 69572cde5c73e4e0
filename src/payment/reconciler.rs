//! Status reconciliation.
//!
//! Three channels report on the same receive: the push stream, the
//! poller, and the callback listener. The reconciler owns the merge.
//! Updates funnel through one mailbox into a single apply path, so the
//! rules hold no matter which channel spoke last: identity is re-checked
//! under the state lock, the last applied update wins, and the
//! completion result is emitted exactly once per receive.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::InitiationError;
use super::initiator::PaymentInitiator;
use super::poller::StatusPoller;
use super::state::PaymentPhase;
use super::types::{
    ChannelEvent, CompletionResult, PaymentRequest, StatusSnapshot, TransactionHandle,
};
use crate::callback::CallbackRegistry;
use crate::config::{CallbackConfig, PaymentConfig};
use crate::moneropay::{PaymentEvent, PaymentGateway, StatusStreamClient};

/// A callback that arrived after registration but before activation.
/// Held until `start()` finishes; latest arrival wins.
struct PendingCallback {
    correlation_id: Uuid,
    event: PaymentEvent,
    fiat_value: f64,
}

/// Everything owned by one in-flight receive. Dropping the tasks is not
/// enough to stop them; teardown aborts them explicitly.
struct ActiveReceive {
    handle: TransactionHandle,
    fiat_value: f64,
    exchange_rate: f64,
    stream_task: Option<JoinHandle<()>>,
    poller_task: Option<JoinHandle<()>>,
}

struct ReceiveState {
    phase: PaymentPhase,
    active: Option<ActiveReceive>,
    snapshot: Option<StatusSnapshot>,
    pending_callback: Option<PendingCallback>,
}

/// Shared core: the state lock plus everything the apply path needs.
/// Held by the reconciler, its event loop, and both child tasks.
pub(crate) struct ReconcilerCore {
    state: RwLock<ReceiveState>,
    registry: Arc<CallbackRegistry>,
    status_tx: watch::Sender<Option<StatusSnapshot>>,
    completions: mpsc::UnboundedSender<CompletionResult>,
    discarded_events: AtomicU64,
    poll_failures: AtomicU64,
}

impl ReconcilerCore {
    pub(crate) async fn active_correlation(&self) -> Option<Uuid> {
        self.state
            .read()
            .await
            .active
            .as_ref()
            .map(|active| active.handle.correlation_id)
    }

    /// Apply one channel update. All mutation happens under the write
    /// lock, so an update for a receive that was just torn down fails
    /// the identity check here even if its channel task is still alive.
    async fn apply_event(&self, event: ChannelEvent) {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        match event {
            ChannelEvent::Stream {
                transaction_id,
                status,
            } => {
                let Some(active) = state.active.as_ref() else {
                    self.discard("stream", &transaction_id);
                    return;
                };
                if active.handle.transaction_id != transaction_id {
                    self.discard("stream", &transaction_id);
                    return;
                }
                let snapshot = StatusSnapshot::from_status(&active.handle, &status);
                self.commit(state, snapshot);
            }

            ChannelEvent::Poll {
                transaction_id,
                result,
            } => {
                let Some(active) = state.active.as_ref() else {
                    self.discard("poll", &transaction_id);
                    return;
                };
                if active.handle.transaction_id != transaction_id {
                    self.discard("poll", &transaction_id);
                    return;
                }
                match result {
                    Ok(status) => {
                        let snapshot = StatusSnapshot::from_status(&active.handle, &status);
                        self.commit(state, snapshot);
                    }
                    Err(e) => {
                        // Non-fatal: the last applied snapshot stands.
                        self.poll_failures.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            transaction_id = %transaction_id,
                            error = %e,
                            "Poll failed; keeping last known status"
                        );
                    }
                }
            }

            ChannelEvent::Callback {
                correlation_id,
                event,
                fiat_value,
            } => {
                let snapshot = match state.active.as_mut() {
                    Some(active) if active.handle.correlation_id == correlation_id => {
                        active.fiat_value = fiat_value;
                        Some(StatusSnapshot::from_event(&active.handle, &event))
                    }
                    Some(_) => {
                        self.discard("callback", &correlation_id.to_string());
                        None
                    }
                    None => {
                        if self.registry.expectation(&correlation_id).is_some() {
                            debug!(%correlation_id, "Buffering callback ahead of activation");
                            state.pending_callback = Some(PendingCallback {
                                correlation_id,
                                event,
                                fiat_value,
                            });
                        } else {
                            self.discard("callback", &correlation_id.to_string());
                        }
                        None
                    }
                };
                if let Some(snapshot) = snapshot {
                    self.commit(state, snapshot);
                }
            }
        }
    }

    fn commit(&self, state: &mut ReceiveState, snapshot: StatusSnapshot) {
        if state.phase == PaymentPhase::AwaitingFirstUpdate {
            state.phase = PaymentPhase::Observing;
        }

        debug!(
            covered = snapshot.covered_total,
            expected = snapshot.expected,
            confirmations = snapshot.confirmations,
            complete = snapshot.complete,
            "Applied status update"
        );

        state.snapshot = Some(snapshot.clone());
        self.status_tx.send_replace(Some(snapshot.clone()));

        if snapshot.complete {
            self.complete(state, &snapshot);
        }
    }

    /// Emit the completion result, then retire the receive. Both happen
    /// under the same write lock, so no later update can match it.
    fn complete(&self, state: &mut ReceiveState, snapshot: &StatusSnapshot) {
        state.phase = PaymentPhase::Completed;

        // Identity was checked before commit, so the receive is present.
        let Some(active) = state.active.as_ref() else {
            return;
        };

        let result = CompletionResult {
            correlation_id: active.handle.correlation_id,
            transaction_id: active.handle.transaction_id.clone(),
            expected: snapshot.expected,
            covered: snapshot.covered_total,
            confirmations: snapshot.confirmations,
            tx_hash: snapshot.tx_hash.clone(),
            fiat_value: active.fiat_value,
            exchange_rate: active.exchange_rate,
            completed_at: Utc::now(),
        };

        info!(
            correlation_id = %result.correlation_id,
            covered = result.covered,
            confirmations = result.confirmations,
            "Payment completed"
        );

        if self.completions.send(result).is_err() {
            warn!("Completion receiver dropped; result unobserved");
        }

        self.teardown(state);
    }

    /// Retire the active receive: abort its tasks, drop its callback
    /// expectation, reset to Idle. Safe to call with nothing active.
    fn teardown(&self, state: &mut ReceiveState) {
        if let Some(active) = state.active.take() {
            self.registry.unregister(&active.handle.correlation_id);
            if let Some(task) = active.stream_task {
                task.abort();
            }
            if let Some(task) = active.poller_task {
                task.abort();
            }
            debug!(
                correlation_id = %active.handle.correlation_id,
                "Receive retired"
            );
        }
        state.pending_callback = None;
        state.snapshot = None;
        state.phase = PaymentPhase::Idle;
        self.status_tx.send_replace(None);
    }

    fn discard(&self, channel: &str, id: &str) {
        self.discarded_events.fetch_add(1, Ordering::Relaxed);
        debug!(channel, id, "Discarded update for a different receive");
    }
}

/// Diagnostic counters, cumulative over the process lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcilerStats {
    pub phase: String,
    pub has_active_receive: bool,
    pub discarded_events: u64,
    pub poll_failures: u64,
    pub registered_expectations: usize,
}

/// Owns the payment lifecycle for one receive at a time.
///
/// `start()` initiates a payment and wires up the reporting channels;
/// `stop()` cancels whatever is in flight. Completion is delivered on
/// the receiver returned by [`PaymentReconciler::new`], exactly once
/// per completed receive.
pub struct PaymentReconciler {
    core: Arc<ReconcilerCore>,
    initiator: PaymentInitiator,
    gateway: Arc<dyn PaymentGateway>,
    stream: StatusStreamClient,
    poll_interval: Duration,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
    status_rx: watch::Receiver<Option<StatusSnapshot>>,
    lifecycle: Mutex<()>,
    event_loop: JoinHandle<()>,
}

impl PaymentReconciler {
    /// Build the reconciler and spawn its event loop. Must be called
    /// from within a runtime.
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        stream: StatusStreamClient,
        registry: Arc<CallbackRegistry>,
        payment: &PaymentConfig,
        callback: &CallbackConfig,
    ) -> (Self, mpsc::UnboundedReceiver<CompletionResult>) {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(None);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let core = Arc::new(ReconcilerCore {
            state: RwLock::new(ReceiveState {
                phase: PaymentPhase::Idle,
                active: None,
                snapshot: None,
                pending_callback: None,
            }),
            registry: registry.clone(),
            status_tx,
            completions: completions_tx,
            discarded_events: AtomicU64::new(0),
            poll_failures: AtomicU64::new(0),
        });

        let loop_core = core.clone();
        let event_loop = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                loop_core.apply_event(event).await;
            }
            debug!("Reconciler mailbox closed");
        });

        let initiator = PaymentInitiator::new(gateway.clone(), registry, callback, payment);

        let reconciler = Self {
            core,
            initiator,
            gateway,
            stream,
            poll_interval: Duration::from_secs(payment.poll_interval_secs.max(1)),
            events_tx,
            status_rx,
            lifecycle: Mutex::new(()),
            event_loop,
        };
        (reconciler, completions_rx)
    }

    /// Sender half of the reconciler mailbox, for the callback listener.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<ChannelEvent> {
        self.events_tx.clone()
    }

    /// Watch the latest applied snapshot. `None` while Idle.
    pub fn subscribe_status(&self) -> watch::Receiver<Option<StatusSnapshot>> {
        self.status_rx.clone()
    }

    /// Initiate a payment and begin reconciling its status.
    ///
    /// Any receive already in flight is torn down first, so calling
    /// `start()` twice supersedes the first receive rather than leaking
    /// it. Only initiation failures surface here; once the handle is
    /// returned, everything else is absorbed into the lifecycle.
    pub async fn start(
        &self,
        request: PaymentRequest,
    ) -> Result<TransactionHandle, InitiationError> {
        let _lifecycle = self.lifecycle.lock().await;

        {
            let mut state = self.core.state.write().await;
            self.core.teardown(&mut state);
        }

        let handle = self.initiator.initiate(&request).await?;

        let pending = {
            let mut state = self.core.state.write().await;
            state.phase = PaymentPhase::AwaitingFirstUpdate;
            state.active = Some(ActiveReceive {
                handle: handle.clone(),
                fiat_value: request.fiat_value,
                exchange_rate: request.exchange_rate,
                stream_task: None,
                poller_task: None,
            });
            state.pending_callback.take()
        };

        let stream_task = tokio::spawn(stream_worker(
            self.stream.clone(),
            self.core.clone(),
            handle.correlation_id,
            handle.transaction_id.clone(),
            self.events_tx.clone(),
        ));
        let poller_task = tokio::spawn(
            StatusPoller::new(
                self.gateway.clone(),
                self.core.clone(),
                self.events_tx.clone(),
                handle.correlation_id,
                handle.transaction_id.clone(),
                self.poll_interval,
            )
            .run(),
        );

        {
            let mut state = self.core.state.write().await;
            match state.active.as_mut() {
                Some(active) if active.handle.correlation_id == handle.correlation_id => {
                    active.stream_task = Some(stream_task);
                    active.poller_task = Some(poller_task);
                }
                _ => {
                    // A completion applied between the two lock sections
                    // already retired this receive. Never store tasks on
                    // someone else's receive.
                    stream_task.abort();
                    poller_task.abort();
                }
            }
        }

        if let Some(pending) = pending {
            if pending.correlation_id == handle.correlation_id {
                debug!(
                    correlation_id = %pending.correlation_id,
                    "Applying callback buffered during initiation"
                );
                self.core
                    .apply_event(ChannelEvent::Callback {
                        correlation_id: pending.correlation_id,
                        event: pending.event,
                        fiat_value: pending.fiat_value,
                    })
                    .await;
            } else {
                self.core
                    .discard("callback", &pending.correlation_id.to_string());
            }
        }

        info!(
            transaction_id = %handle.transaction_id,
            correlation_id = %handle.correlation_id,
            required_confirmations = handle.required_confirmations,
            "Reconciliation started"
        );

        Ok(handle)
    }

    /// Cancel the receive in flight, if any. Idempotent; updates already
    /// queued for the old receive are discarded by the identity check.
    pub async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let mut state = self.core.state.write().await;
        self.core.teardown(&mut state);
    }

    pub async fn phase(&self) -> PaymentPhase {
        self.core.state.read().await.phase
    }

    /// The last applied snapshot, if a receive is in flight.
    pub async fn status(&self) -> Option<StatusSnapshot> {
        self.core.state.read().await.snapshot.clone()
    }

    pub async fn stats(&self) -> ReconcilerStats {
        let state = self.core.state.read().await;
        ReconcilerStats {
            phase: state.phase.as_str().to_string(),
            has_active_receive: state.active.is_some(),
            discarded_events: self.core.discarded_events.load(Ordering::Relaxed),
            poll_failures: self.core.poll_failures.load(Ordering::Relaxed),
            registered_expectations: self.core.registry.len(),
        }
    }
}

impl Drop for PaymentReconciler {
    fn drop(&mut self) {
        // Child tasks notice the closed mailbox on their next send.
        self.event_loop.abort();
    }
}

/// Forwards pushed status frames until the stream or the receive ends.
/// A stream that cannot connect is only logged; the poller still covers
/// the receive.
async fn stream_worker(
    client: StatusStreamClient,
    core: Arc<ReconcilerCore>,
    correlation_id: Uuid,
    transaction_id: String,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let mut stream = match client.subscribe(&transaction_id).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(
                transaction_id = %transaction_id,
                error = %e,
                "Status stream unavailable; poller carries the receive"
            );
            return;
        }
    };

    while let Some(status) = stream.next_status().await {
        if core.active_correlation().await != Some(correlation_id) {
            break;
        }
        let event = ChannelEvent::Stream {
            transaction_id: transaction_id.clone(),
            status,
        };
        if events.send(event).is_err() {
            break;
        }
    }

    debug!(transaction_id = %transaction_id, "Status stream worker exited");
}
