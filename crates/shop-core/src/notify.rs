//! # Notification Sender
//!
//! Order-confirmation notifications. Delivery is an external collaborator;
//! the manager fires it best-effort exactly once per order becoming paid
//! and never fails the payment transition on a send error.

use crate::error::ShopResult;
use crate::order::Order;
use crate::user::User;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Sender of order-confirmation notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Called once when an order's payment is first confirmed
    async fn order_confirmed(&self, order: &Order, user: Option<&User>) -> ShopResult<()>;
}

/// Type alias for a shared notifier
pub type SharedNotifier = Arc<dyn Notifier>;

/// Default notifier: logs the confirmation instead of sending email
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn order_confirmed(&self, order: &Order, user: Option<&User>) -> ShopResult<()> {
        info!(
            order_id = %order.id,
            total = %order.pricing.total_price.display(),
            recipient = user.map(|u| u.email.as_str()).unwrap_or("unknown"),
            "order confirmed"
        );
        Ok(())
    }
}
