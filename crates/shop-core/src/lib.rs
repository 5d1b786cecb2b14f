//! # shop-core
//!
//! Core domain for the storefront order engine.
//!
//! This crate provides:
//! - `Product`, `Price`, and the catalog store with atomic stock reservation
//! - `Order`, `LineItem`, and the status transition graph
//! - `OrderManager`, the service that creates orders and reconciles payment
//!   outcomes from the verify and webhook paths
//! - `PaymentGateway` and `Notifier` traits for the external collaborators
//! - `ShopError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{OrderManager, OrderItemRequest, ShippingAddress, PriceBreakdown};
//!
//! let order = manager
//!     .create_order("u-ada", &items, ShippingAddress::default(), "card", pricing)
//!     .await?;
//!
//! // Redirect the customer to the provider checkout page
//! let session = manager.begin_checkout(&order.id, &user, success_url, cancel_url).await?;
//! ```

pub mod error;
pub mod gateway;
pub mod manager;
pub mod notify;
pub mod order;
pub mod product;
pub mod store;
pub mod user;

// Re-exports for convenience
pub use error::{ShopError, ShopResult};
pub use gateway::{
    CheckoutSession, PaymentGateway, SessionDetails, SharedGateway, WebhookEvent, WebhookEventType,
};
pub use manager::{OrderItemRequest, OrderManager, OrderPage, PaymentStatusReport};
pub use notify::{LogNotifier, Notifier, SharedNotifier};
pub use order::{
    LineItem, Order, OrderStatus, PaymentReceipt, PriceBreakdown, ShippingAddress,
};
pub use product::{CatalogSeed, Category, Currency, Price, Product};
pub use store::{
    CatalogStore, InMemoryCatalog, InMemoryDirectory, InMemoryOrders, OrderFilter, OrderStore,
    StockRequest, UserDirectory,
};
pub use user::{DirectorySeed, Role, User};
