//! MoneroPay HTTP Client
//!
//! Implements the `PaymentGateway` seam over the gateway's REST API.
//! Supports both a real MoneroPay instance and a scripted mock for
//! testing without one.

use super::error::GatewayError;
use super::models::{GatewayHealth, ReceiveCreated, ReceiveRequest, ReceiveStatus};
use crate::config::MoneroPayConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::info;

/// Outbound gateway operations the payment lifecycle depends on.
///
/// The reconciler owns a `dyn PaymentGateway`, so the whole lifecycle can
/// run against [`MockGateway`] in tests.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a receive request. The returned subaddress identifies the
    /// transaction on every other channel.
    async fn create_receive(
        &self,
        request: &ReceiveRequest,
    ) -> Result<ReceiveCreated, GatewayError>;

    /// Fetch the current status of a receive.
    async fn receive_status(&self, transaction_id: &str) -> Result<ReceiveStatus, GatewayError>;

    /// Probe gateway liveness.
    async fn health(&self) -> Result<GatewayHealth, GatewayError>;
}

/// Gateway client backed by a real MoneroPay instance.
pub struct MoneroPayClient {
    client: reqwest::Client,
    base_url: String,
}

impl MoneroPayClient {
    pub fn new(config: &MoneroPayConfig) -> Result<Self, GatewayError> {
        info!("Initializing MoneroPay client for {}", config.base_url);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                GatewayError::Transport(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl PaymentGateway for MoneroPayClient {
    async fn create_receive(
        &self,
        request: &ReceiveRequest,
    ) -> Result<ReceiveCreated, GatewayError> {
        let response = self
            .client
            .post(format!("{}/receive", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("create request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GatewayError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(format!("create response: {}", e)))
    }

    async fn receive_status(&self, transaction_id: &str) -> Result<ReceiveStatus, GatewayError> {
        let response = self
            .client
            .get(format!("{}/receive/{}", self.base_url, transaction_id))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("status request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(transaction_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(GatewayError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(format!("status response: {}", e)))
    }

    async fn health(&self) -> Result<GatewayHealth, GatewayError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("health request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GatewayError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(format!("health response: {}", e)))
    }
}

/// Scripted gateway for tests and offline development.
///
/// Records every create request, serves queued status results in order,
/// and reports itself healthy. When the status queue runs dry it answers
/// not-found, which the lifecycle absorbs like any other failed poll.
pub struct MockGateway {
    address: String,
    creates: AtomicUsize,
    create_fails: AtomicBool,
    requests: Mutex<Vec<ReceiveRequest>>,
    statuses: Mutex<VecDeque<Result<ReceiveStatus, GatewayError>>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            address: "888tNkZrPN6JsEgekjMnABU4TBzc2Dt29EPAvkRxbANsAnjy".to_string(),
            creates: AtomicUsize::new(0),
            create_fails: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
            statuses: Mutex::new(VecDeque::new()),
        }
    }

    /// The subaddress the first successful create returns. Later creates
    /// get a numbered suffix, so every receive stays distinguishable.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn set_create_failure(&self, fail: bool) {
        self.create_fails.store(fail, Ordering::SeqCst);
    }

    /// Queue the next `receive_status` answer.
    pub fn push_status(&self, result: Result<ReceiveStatus, GatewayError>) {
        self.statuses.lock().unwrap().push_back(result);
    }

    /// Create requests seen so far, in order.
    pub fn create_requests(&self) -> Vec<ReceiveRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_receive(
        &self,
        request: &ReceiveRequest,
    ) -> Result<ReceiveCreated, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());

        if self.create_fails.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("mock create failure".to_string()));
        }

        let n = self.creates.fetch_add(1, Ordering::SeqCst);
        let address = if n == 0 {
            self.address.clone()
        } else {
            format!("{}{}", self.address, n)
        };

        Ok(ReceiveCreated {
            address,
            amount: request.amount,
            description: request.description.clone(),
            created_at: chrono::Utc::now(),
        })
    }

    async fn receive_status(&self, transaction_id: &str) -> Result<ReceiveStatus, GatewayError> {
        match self.statuses.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Err(GatewayError::NotFound(transaction_id.to_string())),
        }
    }

    async fn health(&self) -> Result<GatewayHealth, GatewayError> {
        Ok(GatewayHealth {
            status: 200,
            services: Default::default(),
        })
    }
}
