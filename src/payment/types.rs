//! Payment lifecycle data types.
//!
//! Everything the reconciler moves between its channels: the operator's
//! request, the handle identifying one in-flight receive, the snapshot a
//! status document reduces to, and the final completion record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::moneropay::{
    Amount, GatewayError, PaymentEvent, ReceiveStatus, Transfer, piconero_to_xmr,
};

/// A payment the operator wants to collect.
///
/// `amount` is in piconero. The fiat fields are display-time context that
/// rides along to the completion record; they never influence matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount: u64,
    pub description: String,
    pub fiat_value: f64,
    pub exchange_rate: f64,
}

/// Identity of one in-flight receive.
///
/// `transaction_id` is the subaddress the processor created for this
/// payment; the stream and poll channels key on it. `correlation_id` is
/// ours, minted before the create call, and keys the callback channel.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionHandle {
    pub transaction_id: String,
    pub correlation_id: Uuid,
    pub expected_amount: u64,
    pub description: String,
    pub required_confirmations: u64,
    pub created_at: DateTime<Utc>,
}

impl TransactionHandle {
    /// URI the customer scans to pay.
    pub fn payment_uri(&self) -> String {
        let amount = piconero_to_xmr(self.expected_amount);
        if self.description.is_empty() {
            format!("monero:{}?tx_amount={}", self.transaction_id, amount)
        } else {
            format!(
                "monero:{}?tx_amount={}&tx_description={}",
                self.transaction_id,
                amount,
                self.description.replace(' ', "%20")
            )
        }
    }
}

/// One status document reduced to the fields the lifecycle decides on.
///
/// Derived once at construction: `accepted` compares covered funds against
/// the document's own expectation, `confirmed` compares the newest
/// transfer's depth against the receive's requirement. The contributing
/// transfers ride along untouched for display and receipts.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub correlation_id: Uuid,
    pub transaction_id: String,
    pub expected: u64,
    pub covered_total: u64,
    pub covered_unlocked: u64,
    pub confirmations: u64,
    pub tx_hash: Option<String>,
    pub accepted: bool,
    pub confirmed: bool,
    pub complete: bool,
    pub transactions: Vec<Transfer>,
    pub updated_at: DateTime<Utc>,
}

impl StatusSnapshot {
    /// Reduce a pushed or polled status document.
    ///
    /// Confirmation depth comes from the newest transfer; a receive with
    /// no transfers yet counts as unconfirmed.
    pub fn from_status(handle: &TransactionHandle, status: &ReceiveStatus) -> Self {
        let (confirmations, tx_hash, updated_at) = match status.transactions.last() {
            Some(transfer) => (
                transfer.confirmations,
                Some(transfer.tx_hash.clone()),
                transfer.timestamp,
            ),
            None => (0, None, status.created_at),
        };
        Self::derive(
            handle,
            &status.amount,
            confirmations,
            tx_hash,
            status.transactions.clone(),
            updated_at,
        )
    }

    /// Reduce a callback event, which carries the triggering transfer.
    pub fn from_event(handle: &TransactionHandle, event: &PaymentEvent) -> Self {
        let transfer = &event.transaction;
        Self::derive(
            handle,
            &event.amount,
            transfer.confirmations,
            Some(transfer.tx_hash.clone()),
            vec![transfer.clone()],
            transfer.timestamp,
        )
    }

    fn derive(
        handle: &TransactionHandle,
        amount: &Amount,
        confirmations: u64,
        tx_hash: Option<String>,
        transactions: Vec<Transfer>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let accepted = amount.covered.total >= amount.expected;
        let confirmed = confirmations >= handle.required_confirmations;
        Self {
            correlation_id: handle.correlation_id,
            transaction_id: handle.transaction_id.clone(),
            expected: amount.expected,
            covered_total: amount.covered.total,
            covered_unlocked: amount.covered.unlocked,
            confirmations,
            tx_hash,
            accepted,
            confirmed,
            complete: accepted && confirmed,
            transactions,
            updated_at,
        }
    }
}

/// An update arriving on one of the three reporting channels.
///
/// Stream and poll updates identify themselves by subaddress, callbacks
/// by correlation id. The reconciler re-checks identity when applying.
#[derive(Debug)]
pub enum ChannelEvent {
    Stream {
        transaction_id: String,
        status: ReceiveStatus,
    },
    Poll {
        transaction_id: String,
        result: Result<ReceiveStatus, GatewayError>,
    },
    Callback {
        correlation_id: Uuid,
        event: PaymentEvent,
        fiat_value: f64,
    },
}

/// Emitted exactly once when a receive satisfies the completion predicate.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionResult {
    pub correlation_id: Uuid,
    pub transaction_id: String,
    pub expected: u64,
    pub covered: u64,
    pub confirmations: u64,
    pub tx_hash: Option<String>,
    pub fiat_value: f64,
    pub exchange_rate: f64,
    pub completed_at: DateTime<Utc>,
}

impl CompletionResult {
    /// Funds received, in XMR.
    pub fn xmr(&self) -> Decimal {
        piconero_to_xmr(self.covered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moneropay::{Covered, Transfer};

    fn handle(required_confirmations: u64) -> TransactionHandle {
        TransactionHandle {
            transaction_id: "888tNkZrPN6JsEgekjMnABU4TBzc2Dt29EPAvkRxbANsAnjy".to_string(),
            correlation_id: Uuid::new_v4(),
            expected_amount: 1_000_000_000_000,
            description: "two espressos".to_string(),
            required_confirmations,
            created_at: Utc::now(),
        }
    }

    fn transfer(confirmations: u64, tx_hash: &str) -> Transfer {
        Transfer {
            amount: 1_000_000_000_000,
            confirmations,
            double_spend_seen: false,
            fee: 31_000_000,
            height: 2_400_000,
            timestamp: Utc::now(),
            tx_hash: tx_hash.to_string(),
            unlock_time: 0,
            locked: confirmations < 10,
        }
    }

    fn status(expected: u64, covered: u64, transactions: Vec<Transfer>) -> ReceiveStatus {
        ReceiveStatus {
            amount: Amount {
                expected,
                covered: Covered {
                    total: covered,
                    unlocked: 0,
                },
            },
            complete: covered >= expected,
            description: "two espressos".to_string(),
            created_at: Utc::now(),
            transactions,
        }
    }

    #[test]
    fn test_zero_conf_receive_completes_on_covered_amount() {
        let handle = handle(0);
        let status = status(
            1_000_000_000_000,
            1_000_000_000_000,
            vec![transfer(0, "aa11")],
        );

        let snapshot = StatusSnapshot::from_status(&handle, &status);
        assert!(snapshot.accepted);
        assert!(snapshot.confirmed);
        assert!(snapshot.complete);
        assert_eq!(snapshot.tx_hash.as_deref(), Some("aa11"));
    }

    #[test]
    fn test_confirmation_threshold_gates_completion() {
        let handle = handle(10);
        let covered = status(
            1_000_000_000_000,
            1_000_000_000_000,
            vec![transfer(3, "aa11")],
        );

        let snapshot = StatusSnapshot::from_status(&handle, &covered);
        assert!(snapshot.accepted);
        assert!(!snapshot.confirmed);
        assert!(!snapshot.complete);

        let deep = status(
            1_000_000_000_000,
            1_000_000_000_000,
            vec![transfer(10, "aa11")],
        );
        let snapshot = StatusSnapshot::from_status(&handle, &deep);
        assert!(snapshot.complete);
    }

    #[test]
    fn test_underpayment_is_not_accepted() {
        let handle = handle(0);
        let status = status(1_000_000_000_000, 999_999_999_999, vec![transfer(5, "aa11")]);

        let snapshot = StatusSnapshot::from_status(&handle, &status);
        assert!(!snapshot.accepted);
        assert!(snapshot.confirmed);
        assert!(!snapshot.complete);
    }

    #[test]
    fn test_empty_transfer_list_counts_as_unconfirmed() {
        let handle = handle(1);
        let status = status(1_000_000_000_000, 1_000_000_000_000, vec![]);

        let snapshot = StatusSnapshot::from_status(&handle, &status);
        assert_eq!(snapshot.confirmations, 0);
        assert_eq!(snapshot.tx_hash, None);
        assert!(!snapshot.complete);
    }

    #[test]
    fn test_newest_transfer_wins() {
        let handle = handle(0);
        let status = status(
            1_000_000_000_000,
            1_000_000_000_000,
            vec![transfer(12, "old"), transfer(2, "new")],
        );

        let snapshot = StatusSnapshot::from_status(&handle, &status);
        assert_eq!(snapshot.confirmations, 2);
        assert_eq!(snapshot.tx_hash.as_deref(), Some("new"));
        assert_eq!(snapshot.transactions.len(), 2);
    }

    #[test]
    fn test_event_snapshot_uses_embedded_transfer() {
        let handle = handle(10);
        let event = PaymentEvent {
            amount: Amount {
                expected: 1_000_000_000_000,
                covered: Covered {
                    total: 1_000_000_000_000,
                    unlocked: 1_000_000_000_000,
                },
            },
            complete: true,
            description: "two espressos".to_string(),
            created_at: Utc::now(),
            transaction: transfer(11, "bb22"),
        };

        let snapshot = StatusSnapshot::from_event(&handle, &event);
        assert_eq!(snapshot.confirmations, 11);
        assert_eq!(snapshot.covered_unlocked, 1_000_000_000_000);
        assert!(snapshot.complete);
    }

    #[test]
    fn test_payment_uri_encodes_amount_and_description() {
        let handle = handle(0);
        assert_eq!(
            handle.payment_uri(),
            "monero:888tNkZrPN6JsEgekjMnABU4TBzc2Dt29EPAvkRxbANsAnjy\
             ?tx_amount=1&tx_description=two%20espressos"
        );

        let mut bare = handle.clone();
        bare.description = String::new();
        bare.expected_amount = 2_500_000_000_000;
        assert_eq!(
            bare.payment_uri(),
            "monero:888tNkZrPN6JsEgekjMnABU4TBzc2Dt29EPAvkRxbANsAnjy?tx_amount=2.5"
        );
    }

    #[test]
    fn test_completion_result_reports_xmr() {
        let result = CompletionResult {
            correlation_id: Uuid::new_v4(),
            transaction_id: "888tNk".to_string(),
            expected: 1_000_000_000_000,
            covered: 1_500_000_000_000,
            confirmations: 10,
            tx_hash: Some("aa11".to_string()),
            fiat_value: 3.20,
            exchange_rate: 160.0,
            completed_at: Utc::now(),
        };
        assert_eq!(result.xmr().to_string(), "1.5");
    }
}
