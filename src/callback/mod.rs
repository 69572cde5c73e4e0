//! Inbound notification channel.
//!
//! The payment processor pushes a status document to a local HTTP endpoint
//! whenever funds move. [`registry`] holds the correlation ids we currently
//! expect those pushes for, and [`server`] is the listener that checks the
//! registry and forwards accepted events to the reconciler.

pub mod registry;
pub mod server;

pub use registry::CallbackRegistry;
pub use server::{ACK_INVALID_METHOD, ACK_PROCESSED, CallbackListener, ListenerError};
