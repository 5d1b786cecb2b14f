//! # Request Handlers
//!
//! Axum request handlers for the storefront API. Handlers stay thin:
//! decode the request, call the order manager, wrap the result in the
//! uniform envelope.

use crate::auth::{Admin, Identity};
use crate::response::{ApiError, ApiResponse};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use shop_core::{
    CheckoutSession, Currency, Order, OrderFilter, OrderItemRequest, OrderStatus, PaymentReceipt,
    PaymentStatusReport, Price, PriceBreakdown, Product, ShippingAddress, ShopError,
};
use tracing::instrument;

// =============================================================================
// Request Types
// =============================================================================

/// Create order request
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Lines to order
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    /// Shipping address (missing fields take defaults)
    #[serde(default)]
    pub shipping_address: ShippingAddress,
    /// Payment method tag
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    /// Price breakdown, decimal amounts
    pub items_price: f64,
    pub shipping_price: f64,
    pub tax_price: f64,
    pub total_price: f64,
    #[serde(default)]
    pub currency: Currency,
}

fn default_payment_method() -> String {
    "card".to_string()
}

impl CreateOrderRequest {
    fn breakdown(&self) -> PriceBreakdown {
        PriceBreakdown {
            items_price: Price::new(self.items_price, self.currency),
            shipping_price: Price::new(self.shipping_price, self.currency),
            tax_price: Price::new(self.tax_price, self.currency),
            total_price: Price::new(self.total_price, self.currency),
        }
    }
}

/// Admin order listing query
#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    pub is_paid: Option<bool>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

/// Status update request
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// Checkout session request
#[derive(Debug, Deserialize)]
pub struct CheckoutSessionRequest {
    pub order_id: String,
}

fn reject(state: &AppState, err: ShopError) -> ApiError {
    ApiError::from_shop(err, !state.config.is_production())
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "storefront",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Create an order
#[instrument(skip(state, identity, request), fields(user_id = %identity.0.id, lines = request.items.len()))]
pub async fn create_order(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>), ApiError> {
    let breakdown = request.breakdown();
    let order = state
        .manager
        .create_order(
            &identity.0.id,
            &request.items,
            request.shipping_address,
            &request.payment_method,
            breakdown,
        )
        .await
        .map_err(|e| reject(&state, e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(order).with_message("Order created")),
    ))
}

/// Caller's orders, newest first
pub async fn my_orders(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<ApiResponse<Vec<Order>>>, ApiError> {
    let orders = state
        .manager
        .my_orders(&identity.0.id)
        .await
        .map_err(|e| reject(&state, e))?;
    let count = orders.len() as u64;
    Ok(Json(ApiResponse::ok(orders).with_count(count)))
}

/// One order, owner or admin only
pub async fn get_order(
    State(state): State<AppState>,
    identity: Identity,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order = state
        .manager
        .order_for(&order_id, &identity.0)
        .await
        .map_err(|e| reject(&state, e))?;
    Ok(Json(ApiResponse::ok(order)))
}

/// Filtered, paginated order listing (admin)
pub async fn list_orders(
    State(state): State<AppState>,
    Admin(_): Admin,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<ApiResponse<Vec<Order>>>, ApiError> {
    let filter = OrderFilter {
        status: query.status,
        is_paid: query.is_paid,
    };
    let page = state
        .manager
        .list_orders(filter, query.page, query.limit)
        .await
        .map_err(|e| reject(&state, e))?;

    let count = page.orders.len() as u64;
    Ok(Json(
        ApiResponse::ok(page.orders)
            .with_count(count)
            .with_paging(page.total, page.page, page.pages),
    ))
}

/// Status transition (admin)
#[instrument(skip(state), fields(order_id = %order_id))]
pub async fn update_order_status(
    State(state): State<AppState>,
    Admin(_): Admin,
    Path(order_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order = state
        .manager
        .update_status(&order_id, request.status)
        .await
        .map_err(|e| reject(&state, e))?;
    Ok(Json(ApiResponse::ok(order).with_message("Status updated")))
}

/// User-initiated payment confirmation (owner or admin)
#[instrument(skip(state, identity, receipt), fields(order_id = %order_id))]
pub async fn pay_order(
    State(state): State<AppState>,
    identity: Identity,
    Path(order_id): Path<String>,
    Json(receipt): Json<PaymentReceipt>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order = state
        .manager
        .pay_order(&order_id, &identity.0, receipt)
        .await
        .map_err(|e| reject(&state, e))?;
    Ok(Json(ApiResponse::ok(order).with_message("Order paid")))
}

/// Create a provider checkout session for an order
#[instrument(skip(state, identity, request))]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<CheckoutSessionRequest>,
) -> Result<Json<ApiResponse<CheckoutSession>>, ApiError> {
    let session = state
        .manager
        .begin_checkout(
            &request.order_id,
            &identity.0,
            &state.config.success_url(),
            &state.config.cancel_url(),
        )
        .await
        .map_err(|e| reject(&state, e))?;
    Ok(Json(ApiResponse::ok(session)))
}

/// Synchronous payment verification for a session
#[instrument(skip(state, _identity), fields(session_id = %session_id))]
pub async fn verify_payment(
    State(state): State<AppState>,
    _identity: Identity,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<PaymentStatusReport>>, ApiError> {
    let report = state
        .manager
        .verify_session(&session_id)
        .await
        .map_err(|e| reject(&state, e))?;
    Ok(Json(ApiResponse::ok(report)))
}

/// Stripe webhook: raw body plus signature header. Signature failures
/// reject before any event interpretation; everything accepted answers
/// `{received: true}` even when the order was already paid.
#[instrument(skip(state, headers, body))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ApiError::new(StatusCode::BAD_REQUEST, "Missing Stripe-Signature header")
        })?;

    state
        .manager
        .ingest_webhook(&body, signature)
        .await
        .map_err(|e| reject(&state, e))?;

    Ok(Json(serde_json::json!({ "received": true })))
}

/// List purchasable products
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Product>>>, ApiError> {
    let products = state
        .manager
        .products()
        .await
        .map_err(|e| reject(&state, e))?;
    let count = products.len() as u64;
    Ok(Json(ApiResponse::ok(products).with_count(count)))
}

/// Get a single product
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<ApiResponse<Product>>, ApiError> {
    let product = state
        .manager
        .product(&product_id)
        .await
        .map_err(|e| reject(&state, e))?;
    Ok(Json(ApiResponse::ok(product)))
}

/// Fallback for unmatched routes
pub async fn route_not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Route not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakdown_conversion() {
        let request = CreateOrderRequest {
            items: vec![],
            shipping_address: ShippingAddress::default(),
            payment_method: default_payment_method(),
            items_price: 178.0,
            shipping_price: 5.0,
            tax_price: 1.0,
            total_price: 184.0,
            currency: Currency::USD,
        };
        let breakdown = request.breakdown();
        assert_eq!(breakdown.items_price.amount, 17800);
        assert_eq!(breakdown.total_price.amount, 18400);
        assert!(breakdown.validate().is_ok());
    }

    #[test]
    fn test_list_query_defaults() {
        let query: ListOrdersQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 10);
        assert!(query.status.is_none());
        assert!(query.is_paid.is_none());
    }
}
