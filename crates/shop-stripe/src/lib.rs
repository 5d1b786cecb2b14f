//! # shop-stripe
//!
//! Stripe gateway adapter for storefront-rs.
//!
//! Implements `shop_core::PaymentGateway` on top of the Stripe Checkout
//! Sessions API:
//!
//! - **Session creation** with line items built from order snapshots and
//!   the local order id embedded as metadata (the correlation key)
//! - **Session retrieval** for the synchronous verify path
//! - **Webhook verification**: HMAC-SHA256 signature check with timestamp
//!   tolerance, rejecting before any payload interpretation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shop_stripe::StripeGateway;
//!
//! let gateway = StripeGateway::from_env()?;
//! let session = gateway.create_checkout(&order, success_url, cancel_url).await?;
//! // Redirect the customer to session.checkout_url
//! ```

pub mod checkout;
pub mod config;

// Re-exports
pub use checkout::StripeGateway;
pub use config::StripeConfig;
