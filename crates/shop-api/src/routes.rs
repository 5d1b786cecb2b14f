//! # Routes
//!
//! Axum router configuration for the storefront API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Orders:
///   - POST /api/v1/orders             - Create order (authenticated)
///   - GET  /api/v1/orders             - Filtered listing (admin)
///   - GET  /api/v1/orders/myorders    - Caller's orders
///   - GET  /api/v1/orders/{id}        - One order (owner/admin)
///   - PUT  /api/v1/orders/{id}/status - Status transition (admin)
///   - PUT  /api/v1/orders/{id}/pay    - Payment confirmation (owner/admin)
///
/// - Payments:
///   - POST /api/v1/payments/checkout-session - Create provider session
///   - GET  /api/v1/payments/verify/{session_id} - Verify session status
///
/// - Products:
///   - GET /api/v1/products
///   - GET /api/v1/products/{id}
///
/// - Webhooks:
///   - POST /webhook/stripe - Stripe webhook (raw body, signed)
pub fn create_router(state: AppState) -> Router {
    // CORS is wide open; the API carries no cookies
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let order_routes = Router::new()
        .route("/", post(handlers::create_order).get(handlers::list_orders))
        .route("/myorders", get(handlers::my_orders))
        .route("/{id}", get(handlers::get_order))
        .route("/{id}/status", put(handlers::update_order_status))
        .route("/{id}/pay", put(handlers::pay_order));

    let payment_routes = Router::new()
        .route("/checkout-session", post(handlers::create_checkout_session))
        .route("/verify/{session_id}", get(handlers::verify_payment));

    let product_routes = Router::new()
        .route("/", get(handlers::list_products))
        .route("/{product_id}", get(handlers::get_product));

    // Webhook route must receive the raw body (no CORS needed)
    let webhook_routes = Router::new().route("/stripe", post(handlers::stripe_webhook));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1/orders", order_routes)
        .nest("/api/v1/payments", payment_routes)
        .nest("/api/v1/products", product_routes)
        .nest("/webhook", webhook_routes)
        .fallback(handlers::route_not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppConfig;
    use async_trait::async_trait;
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use chrono::Utc;
    use serde_json::{json, Value};
    use shop_core::{
        Category, CheckoutSession, Currency, InMemoryCatalog, InMemoryDirectory, InMemoryOrders,
        LogNotifier, Order, OrderManager, PaymentGateway, Price, Product, SessionDetails,
        SharedGateway, ShopError, ShopResult, User, WebhookEvent,
    };
    use std::sync::Arc;

    struct StubGateway;

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_checkout(
            &self,
            order: &Order,
            _success_url: &str,
            _cancel_url: &str,
        ) -> ShopResult<CheckoutSession> {
            Ok(CheckoutSession {
                session_id: format!("cs_{}", order.id),
                order_id: order.id.clone(),
                provider: "stub".into(),
                checkout_url: "https://pay.test/session".into(),
                expires_at: None,
                created_at: Utc::now(),
            })
        }

        async fn retrieve_session(&self, session_id: &str) -> ShopResult<SessionDetails> {
            Ok(SessionDetails {
                session_id: session_id.to_string(),
                payment_status: "unpaid".into(),
                payment_intent_id: None,
                payer_email: None,
                order_id: None,
                amount_total: 0,
            })
        }

        async fn verify_webhook(
            &self,
            _payload: &[u8],
            _signature: &str,
        ) -> ShopResult<WebhookEvent> {
            Err(ShopError::SignatureVerification("stub".into()))
        }

        fn provider_name(&self) -> &'static str {
            "stub"
        }
    }

    fn test_server() -> TestServer {
        let catalog = InMemoryCatalog::with_products([Product::new(
            "kb-87",
            "Mechanical Keyboard",
            Price::new(89.0, Currency::USD),
            5,
            Category::Electronics,
        )]);
        let manager = OrderManager::new(
            Arc::new(catalog),
            Arc::new(InMemoryOrders::new()),
            Arc::new(InMemoryDirectory::with_users([
                User::new("u-ada", "Ada", "ada@example.com"),
                User::new("u-bob", "Bob", "bob@example.com"),
                User::new("u-ops", "Ops", "ops@example.com").admin(),
            ])),
            Arc::new(StubGateway) as SharedGateway,
            Arc::new(LogNotifier),
        );
        let config = AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            base_url: "http://localhost".into(),
            environment: "test".into(),
        };
        let app = create_router(AppState::with_parts(manager, config));
        TestServer::new(app).expect("test server")
    }

    fn user_header(user_id: &'static str) -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_static(user_id),
        )
    }

    #[tokio::test]
    async fn test_health() {
        let server = test_server();
        let response = server.get("/health").await;
        response.assert_status_ok();
    }

    #[tokio::test]
    async fn test_unknown_route_envelope() {
        let server = test_server();
        let response = server.get("/nope").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!("Route not found"));
    }

    #[tokio::test]
    async fn test_orders_require_identity() {
        let server = test_server();
        let response = server.get("/api/v1/orders/myorders").await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_order_flow() {
        let server = test_server();
        let (name, value) = user_header("u-ada");

        let created = server
            .post("/api/v1/orders")
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "items": [{"product_id": "kb-87", "quantity": 2}],
                "items_price": 178.0,
                "shipping_price": 5.0,
                "tax_price": 0.0,
                "total_price": 183.0
            }))
            .await;
        assert_eq!(created.status_code(), StatusCode::CREATED);
        let body: Value = created.json();
        assert_eq!(body["success"], json!(true));
        let order_id = body["data"]["id"].as_str().unwrap().to_string();

        // Owner can read it back
        let fetched = server
            .get(&format!("/api/v1/orders/{order_id}"))
            .add_header(name.clone(), value.clone())
            .await;
        fetched.assert_status_ok();

        // Strangers are refused
        let (bob_name, bob_value) = user_header("u-bob");
        let forbidden = server
            .get(&format!("/api/v1/orders/{order_id}"))
            .add_header(bob_name, bob_value)
            .await;
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

        // Owner listing contains the order
        let mine = server
            .get("/api/v1/orders/myorders")
            .add_header(name, value)
            .await;
        let body: Value = mine.json();
        assert_eq!(body["count"], json!(1));
    }

    #[tokio::test]
    async fn test_create_order_insufficient_stock() {
        let server = test_server();
        let (name, value) = user_header("u-ada");

        let response = server
            .post("/api/v1/orders")
            .add_header(name, value)
            .json(&json!({
                "items": [{"product_id": "kb-87", "quantity": 9}],
                "items_price": 801.0,
                "shipping_price": 0.0,
                "tax_price": 0.0,
                "total_price": 801.0
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["message"].as_str().unwrap().contains("available 5"));
    }

    #[tokio::test]
    async fn test_admin_listing_guard() {
        let server = test_server();

        let (ada_name, ada_value) = user_header("u-ada");
        let refused = server
            .get("/api/v1/orders")
            .add_header(ada_name, ada_value)
            .await;
        assert_eq!(refused.status_code(), StatusCode::FORBIDDEN);

        let (ops_name, ops_value) = user_header("u-ops");
        let allowed = server
            .get("/api/v1/orders?page=1&limit=5")
            .add_header(ops_name, ops_value)
            .await;
        allowed.assert_status_ok();
        let body: Value = allowed.json();
        assert_eq!(body["page"], json!(1));
    }

    #[tokio::test]
    async fn test_webhook_requires_signature_header() {
        let server = test_server();
        let response = server.post("/webhook/stripe").text("{}").await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn test_products_are_public() {
        let server = test_server();
        let response = server.get("/api/v1/products").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["count"], json!(1));
    }
}
