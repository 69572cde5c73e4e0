use thiserror::Error;

/// Failures talking to the payment gateway.
///
/// All of these are absorbed by the channel tasks; none of them ever
/// tears down an active payment on its own.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway unreachable: {0}")]
    Transport(String),

    #[error("Gateway returned HTTP {0}")]
    Status(u16),

    #[error("Receive not found: {0}")]
    NotFound(String),

    #[error("Malformed gateway payload: {0}")]
    Protocol(String),

    #[error("Status stream error: {0}")]
    Stream(String),
}
