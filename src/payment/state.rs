//! Payment Lifecycle Phase Definitions

use std::fmt;

/// Reconciler lifecycle phases
///
/// One receive moves Idle -> AwaitingFirstUpdate -> Observing -> Completed.
/// `stop()` returns any phase to Idle; completion does the same internally
/// after the result is emitted, so Completed is only ever observed in the
/// completion record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentPhase {
    /// No receive in flight
    Idle,

    /// Receive created, no status applied yet
    AwaitingFirstUpdate,

    /// At least one status update applied
    Observing,

    /// Completion predicate satisfied, result emitted
    Completed,
}

impl PaymentPhase {
    /// Check whether updates are currently being accepted
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PaymentPhase::AwaitingFirstUpdate | PaymentPhase::Observing
        )
    }

    /// Get human-readable phase name
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPhase::Idle => "IDLE",
            PaymentPhase::AwaitingFirstUpdate => "AWAITING_FIRST_UPDATE",
            PaymentPhase::Observing => "OBSERVING",
            PaymentPhase::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for PaymentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
