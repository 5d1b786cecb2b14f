//! # shop-api
//!
//! HTTP API layer for storefront-rs.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - REST endpoints for orders, payments, and products
//! - Webhook handler for payment-provider events
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/api/v1/orders` | Create order |
//! | GET | `/api/v1/orders` | Admin order listing |
//! | GET | `/api/v1/orders/myorders` | Caller's orders |
//! | GET | `/api/v1/orders/{id}` | One order |
//! | PUT | `/api/v1/orders/{id}/status` | Status transition |
//! | PUT | `/api/v1/orders/{id}/pay` | Payment confirmation |
//! | POST | `/api/v1/payments/checkout-session` | Create checkout session |
//! | GET | `/api/v1/payments/verify/{session_id}` | Verify session |
//! | GET | `/api/v1/products` | List products |
//! | POST | `/webhook/stripe` | Stripe webhook |

pub mod auth;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
