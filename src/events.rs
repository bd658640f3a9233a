use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Inventory events
    InventoryReserved {
        product_id: Uuid,
        quantity: i32,
        reservation_id: Uuid,
        reference_id: String,
    },
    ReservationCommitted {
        reservation_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    ReservationReleased {
        reservation_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    ReservationsExpired {
        count: u64,
        swept_at: DateTime<Utc>,
    },

    // Discount events
    DiscountRedeemed {
        discount_code_id: Uuid,
        order_id: Uuid,
        amount_applied: Decimal,
    },

    // Payment events
    PaymentCaptured {
        order_id: Uuid,
        reference: String,
        amount: Decimal,
    },
    /// A charge was captured but the order write failed. This is the one
    /// event that must reach an operator: money has moved and nothing in
    /// the order tables accounts for it.
    PaymentUnreconciled {
        idempotency_key: String,
        payment_reference: String,
        amount: Decimal,
    },
}

/// Consumes events off the channel and logs them.
///
/// Downstream integrations (webhooks, analytics) would hang off this loop;
/// for now every event is traced, and reconciliation alerts are logged at
/// error level so they trip alerting on the log pipeline.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::PaymentUnreconciled {
                idempotency_key,
                payment_reference,
                amount,
            } => {
                error!(
                    idempotency_key = %idempotency_key,
                    payment_reference = %payment_reference,
                    amount = %amount,
                    "ALERT: payment captured without a persisted order; manual reconciliation required"
                );
            }
            Event::ReservationsExpired { count, .. } if *count > 0 => {
                warn!(count = count, "Expired reservations swept");
            }
            other => {
                info!(event = ?other, "Processing event");
            }
        }
    }
    info!("Event channel closed; event processor shutting down");
}
