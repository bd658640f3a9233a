#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request, Response, StatusCode},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use storefront_api::{
    config::AppConfig,
    db,
    entities::{discount_code, product},
    events::{self, EventSender},
    handlers::AppServices,
    services::payments::{ChargeOutcome, ChargeRequest, GatewayError, PaymentGateway},
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Helper harness for spinning up an application state backed by a
/// throwaway SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state and an
    /// approve-everything gateway.
    pub async fn new() -> Self {
        Self::with_gateway(Arc::new(CountingGateway::default())).await
    }

    /// Construct a test application with a specific gateway double.
    pub async fn with_gateway(gateway: Arc<dyn PaymentGateway>) -> Self {
        let db_path = std::env::temp_dir().join(format!(
            "storefront_test_{}.db",
            Uuid::new_v4().simple()
        ));

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        // A single pooled connection keeps every test statement on one
        // SQLite handle.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (tx, rx) = mpsc::channel(64);
        let event_sender = EventSender::new(tx);
        let event_task = tokio::spawn(events::process_events(rx));

        let services = AppServices::new(db_arc.clone(), event_sender.clone(), gateway, &cfg);

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", storefront_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Issue a JSON request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        payload: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match payload {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("request builds"))
            .await
            .expect("request executes")
    }

    /// Insert a published product and return its row.
    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> product::Model {
        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(None),
            sku: Set(format!("SKU-{}", Uuid::new_v4().simple())),
            price: Set(price),
            sale_price: Set(None),
            stock_quantity: Set(stock),
            reserved_quantity: Set(0),
            status: Set("published".to_string()),
            size: Set(None),
            color: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
        };
        model
            .insert(&*self.state.db)
            .await
            .expect("seed product inserts")
    }

    /// Insert a discount code built by `discount_fixture`.
    pub async fn seed_discount(&self, model: discount_code::Model) -> discount_code::Model {
        let active: discount_code::ActiveModel = discount_code::ActiveModel {
            id: Set(model.id),
            code: Set(model.code),
            description: Set(model.description),
            discount_type: Set(model.discount_type),
            discount_value: Set(model.discount_value),
            min_purchase_amount: Set(model.min_purchase_amount),
            max_discount_amount: Set(model.max_discount_amount),
            usage_limit: Set(model.usage_limit),
            usage_count: Set(model.usage_count),
            per_user_limit: Set(model.per_user_limit),
            valid_from: Set(model.valid_from),
            valid_until: Set(model.valid_until),
            is_active: Set(model.is_active),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        };
        active
            .insert(&*self.state.db)
            .await
            .expect("seed discount inserts")
    }
}

/// A live, active discount code fixture; adjust fields before seeding.
pub fn discount_fixture(code: &str, discount_type: &str, value: Decimal) -> discount_code::Model {
    discount_code::Model {
        id: Uuid::new_v4(),
        code: code.to_string(),
        description: None,
        discount_type: discount_type.to_string(),
        discount_value: value,
        min_purchase_amount: Decimal::ZERO,
        max_discount_amount: None,
        usage_limit: None,
        usage_count: 0,
        per_user_limit: 1,
        valid_from: Utc::now() - chrono::Duration::days(1),
        valid_until: Some(Utc::now() + chrono::Duration::days(30)),
        is_active: true,
        created_at: Utc::now(),
        updated_at: None,
    }
}

/// Build a checkout payload for the given product lines.
pub fn checkout_payload(lines: &[(Uuid, i32)], idempotency_key: &str, code: Option<&str>) -> Value {
    let cart: Vec<Value> = lines
        .iter()
        .map(|(id, qty)| json!({"product_id": id, "quantity": qty}))
        .collect();

    let mut payload = json!({
        "idempotency_key": idempotency_key,
        "cart": cart,
        "shipping_address": {
            "first_name": "Avery",
            "last_name": "Quinn",
            "address_line_1": "12 Pine St",
            "city": "Portland",
            "state": "OR",
            "postal_code": "97201",
            "country": "US"
        }
    });
    if let Some(code) = code {
        payload["discount_code"] = json!(code);
    }
    payload
}

pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub fn assert_error_kind(status: StatusCode, body: &Value, expected_kind: &str) {
    assert!(
        status.is_client_error() || status.is_server_error(),
        "expected an error status, got {}",
        status
    );
    assert_eq!(
        body["kind"].as_str(),
        Some(expected_kind),
        "unexpected error kind in {}",
        body
    );
}

// ==================== Payment gateway doubles ====================

/// Approves every charge and counts how many times it was asked.
#[derive(Default)]
pub struct CountingGateway {
    pub charges: AtomicUsize,
}

#[async_trait]
impl PaymentGateway for CountingGateway {
    async fn create_charge(&self, _request: &ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        self.charges.fetch_add(1, Ordering::SeqCst);
        Ok(ChargeOutcome::Approved {
            reference: format!("test-{}", Uuid::new_v4()),
        })
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Declines every charge.
pub struct DecliningGateway;

#[async_trait]
impl PaymentGateway for DecliningGateway {
    async fn create_charge(&self, _request: &ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        Ok(ChargeOutcome::Declined {
            reason: "card declined".to_string(),
        })
    }

    fn name(&self) -> &str {
        "declining"
    }
}

/// Fails with a transport error on the first call, then approves.
#[derive(Default)]
pub struct FlakyGateway {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl PaymentGateway for FlakyGateway {
    async fn create_charge(&self, _request: &ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(GatewayError::Transport("connection reset".to_string()))
        } else {
            Ok(ChargeOutcome::Approved {
                reference: format!("retry-{}", Uuid::new_v4()),
            })
        }
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

/// Never produces an outcome.
pub struct UnreachableGateway;

#[async_trait]
impl PaymentGateway for UnreachableGateway {
    async fn create_charge(&self, _request: &ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        Err(GatewayError::Transport("no route to host".to_string()))
    }

    fn name(&self) -> &str {
        "unreachable"
    }
}

/// Parse a JSON money field (serialized by rust_decimal as a string) into a
/// Decimal for scale-insensitive comparison.
pub fn decimal_field(body: &Value, key: &str) -> Decimal {
    let raw = body[key]
        .as_str()
        .unwrap_or_else(|| panic!("field {} missing in {}", key, body));
    raw.parse()
        .unwrap_or_else(|_| panic!("field {} is not a decimal: {}", key, raw))
}
