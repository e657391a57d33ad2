#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait};
use serde_json::{json, Value};
use storefront_api::{
    app_router,
    config::AppConfig,
    db,
    entities::{address, order, order_item},
    errors::ServiceError,
    services::{
        addresses::AddressInput,
        catalog::{CreateProductRequest, ProductResponse},
        payment_gateway::{CheckoutSession, CheckoutSessionRequest, PaymentGateway},
        users::RegisterRequest,
    },
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "a_test_jwt_secret_that_is_long_enough_0123456789";
pub const SELLER_EMAIL: &str = "seller@example.com";
pub const SELLER_PASSWORD: &str = "seller-password";
pub const ORIGIN: &str = "https://shop.example.com";

/// Records every checkout session request; can be told to fail.
#[derive(Default)]
pub struct FakeGateway {
    requests: Mutex<Vec<CheckoutSessionRequest>>,
    sessions: AtomicUsize,
    fail: AtomicBool,
}

impl FakeGateway {
    pub fn fail_next_calls(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<CheckoutSessionRequest> {
        self.requests.lock().expect("gateway lock").clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        self.requests
            .lock()
            .expect("gateway lock")
            .push(request.clone());

        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::PaymentGateway(
                "gateway returned 500".to_string(),
            ));
        }

        // Network round trip; keeps session bookkeeping on a later timestamp
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let n = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CheckoutSession {
            id: format!("cs_test_{}", n),
            url: format!("https://checkout.example.com/pay/cs_test_{}", n),
        })
    }
}

/// A registered customer and the session token issued at registration
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

/// Application state over a private in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Builds the app after letting the caller adjust the configuration.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            SELLER_EMAIL.to_string(),
            SELLER_PASSWORD.to_string(),
            "sk_test_123".to_string(),
            "whsec_test".to_string(),
            "test".to_string(),
        );
        // One connection keeps every query on the same in-memory database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let gateway = Arc::new(FakeGateway::default());
        let state = AppState::new(Arc::new(pool), cfg, gateway.clone());
        let router = app_router(state.clone());

        Self {
            router,
            state,
            gateway,
        }
    }

    /// Send a request with an optional bearer token and extra headers.
    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        self.request_with_headers(method, uri, body, token, &[])
            .await
    }

    /// Posts a gateway notification signed with the configured webhook secret.
    pub async fn post_webhook(&self, event: &Value) -> Response {
        let payload = serde_json::to_vec(event).expect("serialize webhook");
        let signature = self
            .state
            .webhook_verifier
            .sign(Utc::now().timestamp(), &payload)
            .expect("sign webhook");
        self.post_raw_webhook(payload, Some(&signature)).await
    }

    pub async fn post_raw_webhook(&self, payload: Vec<u8>, signature: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/order/webhook")
            .header("content-type", "application/json");
        if let Some(sig) = signature {
            builder = builder.header("stripe-signature", sig);
        }

        let request = builder
            .body(Body::from(payload))
            .expect("failed to build webhook request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during webhook request")
    }

    pub async fn create_user(&self, email: &str) -> TestUser {
        let session = self
            .state
            .services
            .users
            .register(RegisterRequest {
                name: "Test Customer".to_string(),
                email: email.to_string(),
                password: "customer-password".to_string(),
            })
            .await
            .expect("register test user");

        TestUser {
            id: session.user.id,
            email: session.user.email,
            token: session.token,
        }
    }

    pub fn seller_token(&self) -> String {
        self.state
            .auth
            .issue_seller_token()
            .expect("issue seller token")
    }

    pub async fn seed_product(&self, name: &str, offer_price: Decimal, in_stock: bool) -> ProductResponse {
        self.state
            .services
            .products
            .add_product(CreateProductRequest {
                name: name.to_string(),
                description: vec![format!("{} seeded for integration tests", name)],
                price: offer_price + Decimal::from(20),
                offer_price,
                category: "Fruits".to_string(),
                images: vec![format!("https://img.example.com/{}.png", name.to_lowercase())],
                in_stock,
            })
            .await
            .expect("seed product for tests")
    }

    pub async fn seed_address(&self, user_id: Uuid) -> address::Model {
        self.state
            .services
            .addresses
            .add_address(
                user_id,
                AddressInput {
                    first_name: "Ada".to_string(),
                    last_name: "Lovelace".to_string(),
                    email: "ada@example.com".to_string(),
                    street: "12 Analytical Row".to_string(),
                    city: "London".to_string(),
                    state: "Greater London".to_string(),
                    zipcode: "N1 9GU".to_string(),
                    country: "UK".to_string(),
                    phone: "+44 20 7946 0000".to_string(),
                },
            )
            .await
            .expect("seed address for tests")
    }

    pub async fn fill_cart(&self, user_id: Uuid, product_id: Uuid, quantity: i64) {
        let mut items = BTreeMap::new();
        items.insert(product_id.to_string(), quantity);
        self.state
            .services
            .carts
            .update_cart(user_id, &items)
            .await
            .expect("fill cart");
    }

    pub async fn cart_len(&self, user_id: Uuid) -> usize {
        self.state
            .services
            .carts
            .get_cart(user_id)
            .await
            .expect("read cart")
            .len()
    }

    /// Makes every later cart write fail. Orders, products and addresses stay usable.
    pub async fn break_cart_store(&self) {
        self.state
            .db
            .execute_unprepared("DROP TABLE users")
            .await
            .expect("drop users table");
    }

    pub async fn order_count(&self) -> u64 {
        order::Entity::find()
            .count(&*self.state.db)
            .await
            .expect("count orders")
    }

    pub async fn order_item_count(&self) -> u64 {
        order_item::Entity::find()
            .count(&*self.state.db)
            .await
            .expect("count order items")
    }

    pub async fn find_order(&self, order_id: Uuid) -> Option<order::Model> {
        order::Entity::find_by_id(order_id)
            .one(&*self.state.db)
            .await
            .expect("load order")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Order request body in the shape the storefront client sends
pub fn order_body(items: &[(Uuid, i64)], address: Option<Uuid>) -> Value {
    json!({
        "items": items
            .iter()
            .map(|(product, quantity)| json!({ "product": product.to_string(), "quantity": quantity }))
            .collect::<Vec<_>>(),
        "address": address.map(|a| a.to_string()),
    })
}

pub fn checkout_event(event_type: &str, order_id: Option<Uuid>, user_id: Option<Uuid>) -> Value {
    let mut metadata = serde_json::Map::new();
    if let Some(order_id) = order_id {
        metadata.insert("orderId".into(), json!(order_id.to_string()));
    }
    if let Some(user_id) = user_id {
        metadata.insert("userId".into(), json!(user_id.to_string()));
    }

    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": event_type,
        "data": {
            "object": {
                "id": "cs_test_1",
                "object": "checkout.session",
                "metadata": Value::Object(metadata),
            }
        }
    })
}

pub fn order_id_of(body: &Value) -> Uuid {
    body["order"]["id"]
        .as_str()
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .expect("order id in response")
}
