//! Payment lifecycle errors.
//!
//! Initiation is the only operation that surfaces an error to the caller.
//! Everything after it (stream drops, failed polls, mismatched callbacks)
//! is absorbed by the reconciler and visible only as diagnostics.

use thiserror::Error;

use crate::moneropay::GatewayError;

#[derive(Debug, Error)]
pub enum InitiationError {
    #[error("Invalid payment amount: {0} piconero")]
    InvalidAmount(u64),

    #[error("Payment initiation failed: {0}")]
    Gateway(#[from] GatewayError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InitiationError::InvalidAmount(0);
        assert_eq!(err.to_string(), "Invalid payment amount: 0 piconero");

        let err: InitiationError = GatewayError::Status(502).into();
        assert!(err.to_string().contains("502"));
    }
}
