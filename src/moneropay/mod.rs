//! MoneroPay Gateway Adapter
//!
//! Everything that talks to the payment processor lives here:
//! - Wire documents of the receive API (create, status, callback, health)
//! - The `PaymentGateway` trait with the HTTP implementation and a
//!   scripted mock for tests and offline development
//! - The WebSocket status stream client
//!
//! The adapter is deliberately dumb: it moves JSON, maps failures into
//! `GatewayError`, and leaves every lifecycle decision to the payment
//! module.

pub mod client;
pub mod error;
pub mod models;
pub mod stream;

// Re-exports for convenience
pub use client::{MockGateway, MoneroPayClient, PaymentGateway};
pub use error::GatewayError;
pub use models::{
    Amount, Covered, GatewayHealth, PaymentEvent, ReceiveCreated, ReceiveRequest, ReceiveStatus,
    Transfer, PICONERO_PER_XMR, piconero_to_xmr,
};
pub use stream::{StatusStream, StatusStreamClient};
