//! MoneroPOS - Monero Point-of-Sale Payment Lifecycle
//!
//! Takes one payment at a time from initiation to completion. A receive
//! is created at a MoneroPay processor, then its status is reconciled
//! from three independent channels until the funds are covered and
//! confirmed deep enough:
//!
//! - a WebSocket push stream from the processor
//! - a periodic HTTP status poll as backstop
//! - callbacks the processor POSTs to a local HTTP listener
//!
//! # Modules
//!
//! - [`config`] - YAML-backed runtime configuration
//! - [`logging`] - tracing subscriber setup
//! - [`moneropay`] - processor client, wire models, and status stream
//! - [`callback`] - local listener for processor callbacks
//! - [`payment`] - initiator, poller, and the status reconciler

pub mod config;
pub mod logging;

// Processor adapter
pub mod moneropay;

// Inbound callback channel
pub mod callback;

// Lifecycle coordination
pub mod payment;

// Convenient re-exports at crate root
pub use callback::{CallbackListener, CallbackRegistry, ListenerError};
pub use moneropay::{
    GatewayError, MockGateway, MoneroPayClient, PaymentGateway, StatusStreamClient,
    piconero_to_xmr,
};
pub use payment::{
    ChannelEvent, CompletionResult, InitiationError, PaymentPhase, PaymentReconciler,
    PaymentRequest, ReconcilerStats, StatusSnapshot, TransactionHandle,
};
