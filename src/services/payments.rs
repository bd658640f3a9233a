//! Payment Gateway Adapter
//!
//! Opaque interface to a third-party payment processor. The orchestrator
//! only sees approved/declined outcomes and transport errors; transport
//! errors are retried at most once, a decline never is.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// A charge request for the authoritative order total.
#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    pub amount: Decimal,
    pub currency: String,
    /// Forwarded so the processor can deduplicate on its side too
    pub idempotency_key: String,
    pub metadata: serde_json::Value,
}

/// Terminal outcome of a charge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    Approved { reference: String },
    Declined { reason: String },
}

/// Failures that never produced a terminal outcome.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway transport error: {0}")]
    Transport(String),
    #[error("gateway timed out after {0:?}")]
    Timeout(Duration),
}

impl GatewayError {
    /// Transport-level failures may be retried once; a timeout after the
    /// charge may have landed is handled by the caller's reconciliation path.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transport(_) | GatewayError::Timeout(_))
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, GatewayError>;

    fn name(&self) -> &str {
        "payment-gateway"
    }
}

#[derive(Debug, Deserialize)]
struct GatewayChargeResponse {
    approved: bool,
    reference: Option<String>,
    decline_reason: Option<String>,
}

/// HTTP implementation posting charges to a configured processor endpoint.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    endpoint: String,
    provider: String,
    timeout: Duration,
}

impl HttpPaymentGateway {
    pub fn new(
        endpoint: String,
        provider: Option<String>,
        timeout: Duration,
    ) -> Result<Self, crate::errors::ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                crate::errors::ServiceError::InternalError(format!(
                    "Failed to build payment HTTP client: {}",
                    e
                ))
            })?;

        Ok(Self {
            client,
            endpoint,
            provider: provider.unwrap_or_else(|| "stripe".to_string()),
            timeout,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, request), fields(amount = %request.amount, currency = %request.currency))]
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Idempotency-Key", &request.idempotency_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.timeout)
                } else {
                    GatewayError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(GatewayError::Transport(format!(
                "gateway returned {}",
                status
            )));
        }

        let body: GatewayChargeResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("malformed gateway response: {}", e)))?;

        if body.approved {
            let reference = body
                .reference
                .ok_or_else(|| GatewayError::Transport("approval without reference".to_string()))?;
            info!(reference = %reference, "Charge approved");
            Ok(ChargeOutcome::Approved { reference })
        } else {
            let reason = body
                .decline_reason
                .unwrap_or_else(|| "declined by processor".to_string());
            warn!(reason = %reason, "Charge declined");
            Ok(ChargeOutcome::Declined { reason })
        }
    }

    fn name(&self) -> &str {
        &self.provider
    }
}

/// Approves everything with a synthetic reference. Used in development when
/// no processor endpoint is configured, mirroring the legacy storefront's
/// simulated payment step.
#[derive(Debug, Default)]
pub struct SandboxPaymentGateway;

#[async_trait]
impl PaymentGateway for SandboxPaymentGateway {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        let reference = format!("sandbox-{}", Uuid::new_v4());
        info!(
            amount = %request.amount,
            currency = %request.currency,
            reference = %reference,
            "Sandbox gateway approved charge"
        );
        Ok(ChargeOutcome::Approved { reference })
    }

    fn name(&self) -> &str {
        "sandbox"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn sandbox_approves_with_reference() {
        let gateway = SandboxPaymentGateway;
        let outcome = gateway
            .create_charge(&ChargeRequest {
                amount: dec!(42.00),
                currency: "USD".into(),
                idempotency_key: "key-1".into(),
                metadata: serde_json::json!({}),
            })
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ChargeOutcome::Approved { reference } if reference.starts_with("sandbox-")
        ));
    }

    #[test]
    fn transport_errors_are_transient() {
        assert!(GatewayError::Transport("reset".into()).is_transient());
        assert!(GatewayError::Timeout(Duration::from_secs(10)).is_transient());
    }
}
