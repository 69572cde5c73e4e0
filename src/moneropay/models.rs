//! Wire documents of the MoneroPay receive API.
//!
//! Field names match the gateway JSON exactly (snake_case on both sides),
//! so no rename attributes are needed. Amounts are atomic units
//! (piconero) end to end; conversion to display XMR happens only at the
//! edges.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Atomic units per XMR.
pub const PICONERO_PER_XMR: u64 = 1_000_000_000_000;

/// Body of `POST /receive`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceiveRequest {
    pub amount: u64,
    pub description: String,
    pub callback_url: String,
}

/// Response of `POST /receive`: the subaddress that identifies the
/// transaction from here on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceiveCreated {
    pub address: String,
    pub amount: u64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Expected vs covered amounts of one receive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Amount {
    pub expected: u64,
    pub covered: Covered,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Covered {
    pub total: u64,
    pub unlocked: u64,
}

/// One incoming wallet transfer contributing to a receive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transfer {
    pub amount: u64,
    pub confirmations: u64,
    pub double_spend_seen: bool,
    pub fee: u64,
    pub height: u64,
    pub timestamp: DateTime<Utc>,
    pub tx_hash: String,
    pub unlock_time: u64,
    pub locked: bool,
}

/// Response of `GET /receive/{address}`; also the payload of every push
/// stream frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceiveStatus {
    pub amount: Amount,
    pub complete: bool,
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub transactions: Vec<Transfer>,
}

/// Body of a processor-originated callback POST.
///
/// Same document as [`ReceiveStatus`] except the processor reports the
/// single transfer that triggered the notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentEvent {
    pub amount: Amount,
    pub complete: bool,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub transaction: Transfer,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayHealth {
    pub status: u16,
    #[serde(default)]
    pub services: HealthServices,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HealthServices {
    #[serde(default)]
    pub walletrpc: bool,
    #[serde(default)]
    pub postgresql: bool,
}

/// Convert atomic units to display XMR.
pub fn piconero_to_xmr(atomic: u64) -> Decimal {
    (Decimal::from(atomic) / Decimal::from(PICONERO_PER_XMR)).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_piconero_to_xmr_conversion() {
        // 1 XMR = 10^12 piconero
        assert_eq!(piconero_to_xmr(1_000_000_000_000), Decimal::from(1));
        assert_eq!(piconero_to_xmr(500_000_000_000), Decimal::new(5, 1));
        assert_eq!(piconero_to_xmr(0), Decimal::ZERO);
        // One piconero survives the conversion
        assert_eq!(piconero_to_xmr(1), Decimal::new(1, 12));
    }

    #[test]
    fn test_receive_status_round_trip() {
        let json = r#"{
            "amount": {"expected": 1000000000000, "covered": {"total": 670000000000, "unlocked": 0}},
            "complete": false,
            "description": "order 42",
            "created_at": "2024-05-01T10:00:00Z",
            "transactions": [{
                "amount": 670000000000,
                "confirmations": 1,
                "double_spend_seen": false,
                "fee": 32730000,
                "height": 2407549,
                "timestamp": "2024-05-01T10:02:11Z",
                "tx_hash": "4e071e4a8e00de0ed34dcd5f0c0b0a6f8f1e61a0a9b1087c679fbadafd9d61f1",
                "unlock_time": 0,
                "locked": true
            }]
        }"#;
        let status: ReceiveStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.amount.expected, 1_000_000_000_000);
        assert_eq!(status.amount.covered.total, 670_000_000_000);
        assert!(!status.complete);
        assert_eq!(status.transactions.len(), 1);
        assert_eq!(status.transactions[0].confirmations, 1);
        assert!(status.transactions[0].locked);
    }

    #[test]
    fn test_status_without_transactions_defaults_empty() {
        let json = r#"{
            "amount": {"expected": 1, "covered": {"total": 0, "unlocked": 0}},
            "complete": false,
            "description": "",
            "created_at": "2024-05-01T10:00:00Z"
        }"#;
        let status: ReceiveStatus = serde_json::from_str(json).unwrap();
        assert!(status.transactions.is_empty());
    }

    #[test]
    fn test_health_document() {
        let json = r#"{"status": 200, "services": {"walletrpc": true, "postgresql": false}}"#;
        let health: GatewayHealth = serde_json::from_str(json).unwrap();
        assert_eq!(health.status, 200);
        assert!(health.services.walletrpc);
        assert!(!health.services.postgresql);
    }
}
