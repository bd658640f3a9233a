use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome states of a checkout attempt.
///
/// `PaymentCapturedUnreconciled` marks the one state that must never be
/// retried automatically: the gateway captured a charge but the order write
/// failed, so an operator has to reconcile it by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptStatus {
    InProgress,
    Completed,
    Failed,
    PaymentCapturedUnreconciled,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::Failed => "failed",
            AttemptStatus::PaymentCapturedUnreconciled => "payment_captured_unreconciled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(AttemptStatus::InProgress),
            "completed" => Some(AttemptStatus::Completed),
            "failed" => Some(AttemptStatus::Failed),
            "payment_captured_unreconciled" => Some(AttemptStatus::PaymentCapturedUnreconciled),
            _ => None,
        }
    }
}

/// Idempotency journal for checkout attempts.
///
/// Keyed by the client-supplied idempotency key; the cart hash detects a
/// replay that reuses a key for a different cart.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "checkout_attempts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub idempotency_key: String,
    pub cart_hash: String,
    pub status: String,
    pub order_id: Option<Uuid>,
    pub error_kind: Option<String>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn status(&self) -> Option<AttemptStatus> {
        AttemptStatus::from_str(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_status_round_trip() {
        for status in [
            AttemptStatus::InProgress,
            AttemptStatus::Completed,
            AttemptStatus::Failed,
            AttemptStatus::PaymentCapturedUnreconciled,
        ] {
            assert_eq!(AttemptStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(AttemptStatus::from_str("done"), None);
    }
}
