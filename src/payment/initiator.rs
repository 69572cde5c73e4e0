//! Payment initiation.
//!
//! Creates a receive at the processor and registers the callback
//! expectation. Registration happens before the create call goes out:
//! the processor may push the first callback before our HTTP response
//! arrives, and the listener must already know the correlation id.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::error::InitiationError;
use super::types::{PaymentRequest, TransactionHandle};
use crate::callback::CallbackRegistry;
use crate::config::{CallbackConfig, PaymentConfig};
use crate::moneropay::{PaymentGateway, ReceiveRequest};

pub struct PaymentInitiator {
    gateway: Arc<dyn PaymentGateway>,
    registry: Arc<CallbackRegistry>,
    public_url: String,
    required_confirmations: u64,
}

impl PaymentInitiator {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        registry: Arc<CallbackRegistry>,
        callback: &CallbackConfig,
        payment: &PaymentConfig,
    ) -> Self {
        Self {
            gateway,
            registry,
            public_url: callback.public_url.trim_end_matches('/').to_string(),
            required_confirmations: payment.required_confirmations,
        }
    }

    /// Create a receive and return its handle.
    ///
    /// On gateway failure the expectation is unregistered again, so a
    /// failed initiation leaves no trace in the callback table.
    pub async fn initiate(
        &self,
        request: &PaymentRequest,
    ) -> Result<TransactionHandle, InitiationError> {
        if request.amount == 0 {
            return Err(InitiationError::InvalidAmount(request.amount));
        }

        let correlation_id = Uuid::new_v4();
        self.registry.register(correlation_id, request.fiat_value);

        let callback_url = format!(
            "{}/callback?correlationId={}&fiatValue={}",
            self.public_url, correlation_id, request.fiat_value
        );

        let created = match self
            .gateway
            .create_receive(&ReceiveRequest {
                amount: request.amount,
                description: request.description.clone(),
                callback_url,
            })
            .await
        {
            Ok(created) => created,
            Err(e) => {
                self.registry.unregister(&correlation_id);
                warn!(%correlation_id, error = %e, "Receive creation failed");
                return Err(e.into());
            }
        };

        info!(
            address = %created.address,
            %correlation_id,
            amount = created.amount,
            "Receive created"
        );

        Ok(TransactionHandle {
            transaction_id: created.address,
            correlation_id,
            expected_amount: created.amount,
            description: request.description.clone(),
            required_confirmations: self.required_confirmations,
            created_at: created.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moneropay::MockGateway;

    fn request() -> PaymentRequest {
        PaymentRequest {
            amount: 1_000_000_000_000,
            description: "two espressos".to_string(),
            fiat_value: 3.20,
            exchange_rate: 160.0,
        }
    }

    fn initiator(gateway: Arc<MockGateway>) -> (PaymentInitiator, Arc<CallbackRegistry>) {
        let registry = Arc::new(CallbackRegistry::new());
        let callback = CallbackConfig {
            public_url: "http://127.0.0.1:8080/".to_string(),
            ..Default::default()
        };
        let payment = PaymentConfig {
            required_confirmations: 10,
            ..Default::default()
        };
        (
            PaymentInitiator::new(gateway, registry.clone(), &callback, &payment),
            registry,
        )
    }

    #[tokio::test]
    async fn test_initiate_registers_and_returns_handle() {
        let gateway = Arc::new(MockGateway::new());
        let (initiator, registry) = initiator(gateway.clone());

        let handle = initiator.initiate(&request()).await.unwrap();

        assert_eq!(handle.transaction_id, gateway.address());
        assert_eq!(handle.expected_amount, 1_000_000_000_000);
        assert_eq!(handle.required_confirmations, 10);
        assert_eq!(registry.expectation(&handle.correlation_id), Some(3.20));
    }

    #[tokio::test]
    async fn test_callback_url_carries_correlation_and_fiat() {
        let gateway = Arc::new(MockGateway::new());
        let (initiator, _registry) = initiator(gateway.clone());

        let handle = initiator.initiate(&request()).await.unwrap();

        let recorded = gateway.create_requests();
        assert_eq!(recorded.len(), 1);
        assert_eq!(
            recorded[0].callback_url,
            format!(
                "http://127.0.0.1:8080/callback?correlationId={}&fiatValue=3.2",
                handle.correlation_id
            )
        );
    }

    #[tokio::test]
    async fn test_failed_create_unregisters_expectation() {
        let gateway = Arc::new(MockGateway::new());
        gateway.set_create_failure(true);
        let (initiator, registry) = initiator(gateway);

        let err = initiator.initiate(&request()).await.unwrap_err();
        assert!(matches!(err, InitiationError::Gateway(_)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_zero_amount_rejected_before_any_call() {
        let gateway = Arc::new(MockGateway::new());
        let (initiator, registry) = initiator(gateway.clone());

        let err = initiator
            .initiate(&PaymentRequest {
                amount: 0,
                ..request()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, InitiationError::InvalidAmount(0)));
        assert!(registry.is_empty());
        assert!(gateway.create_requests().is_empty());
    }
}
