//! Payment lifecycle coordination.
//!
//! One payment at a time: [`reconciler::PaymentReconciler`] initiates a
//! receive through [`initiator`], watches it through the push stream and
//! [`poller`], folds callback deliveries in, and emits a single
//! completion result when the funds are in and confirmed deep enough.

pub mod error;
pub mod initiator;
pub mod poller;
pub mod reconciler;
pub mod state;
pub mod types;

pub use error::InitiationError;
pub use reconciler::{PaymentReconciler, ReconcilerStats};
pub use state::PaymentPhase;
pub use types::{
    ChannelEvent, CompletionResult, PaymentRequest, StatusSnapshot, TransactionHandle,
};
