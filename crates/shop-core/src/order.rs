//! # Order Types
//!
//! The order entity and its lifecycle.
//!
//! An order is an immutable record of what was sold at what price: line
//! items carry name/price/image snapshots taken from the catalog at
//! creation time and are never touched by later catalog edits. Status
//! follows an explicit transition graph, and payment confirmation is
//! convergent so the two reconciliation paths (synchronous verify and
//! provider webhook) can arrive in either order, repeatedly, or not at all.

use crate::error::{ShopError, ShopResult};
use crate::product::{Currency, Price, Product};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A line item in an order: a product reference plus snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Product ID
    pub product_id: String,

    /// Product name at creation time
    pub name: String,

    /// Unit price at creation time
    pub unit_price: Price,

    /// Quantity (>= 1)
    pub quantity: u32,

    /// Image URL at creation time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl LineItem {
    /// Snapshot a product into a line item
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            unit_price: product.price,
            quantity,
            image_url: product.image_url.clone(),
        }
    }

    /// Total price for this line
    pub fn total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// Shipping address; missing fields fall back to defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "USA".to_string()
}

impl Default for ShippingAddress {
    fn default() -> Self {
        Self {
            street: String::new(),
            city: String::new(),
            state: String::new(),
            zip: String::new(),
            country: default_country(),
        }
    }
}

/// Price breakdown supplied at order creation.
///
/// Invariant: `total == items + shipping + tax`, all non-negative, one
/// currency throughout. Checked by [`validate`](PriceBreakdown::validate)
/// before an order is persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub items_price: Price,
    pub shipping_price: Price,
    pub tax_price: Price,
    pub total_price: Price,
}

impl PriceBreakdown {
    pub fn validate(&self) -> ShopResult<()> {
        let parts = [
            self.items_price,
            self.shipping_price,
            self.tax_price,
            self.total_price,
        ];
        if parts.iter().any(|p| p.amount < 0) {
            return Err(ShopError::Validation("prices must be non-negative".into()));
        }
        if parts.iter().any(|p| p.currency != self.total_price.currency) {
            return Err(ShopError::Validation(
                "price breakdown mixes currencies".into(),
            ));
        }
        let sum = self.items_price.amount + self.shipping_price.amount + self.tax_price.amount;
        if sum != self.total_price.amount {
            return Err(ShopError::Validation(format!(
                "total price {} does not equal items + shipping + tax ({})",
                self.total_price.amount, sum
            )));
        }
        Ok(())
    }

    pub fn currency(&self) -> Currency {
        self.total_price.currency
    }
}

/// Order status lifecycle.
///
/// ```text
/// pending -> processing -> shipped -> delivered
///    \           \            \
///     `-----------`------------`---> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Whether `next` is a legal transition from this state
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Processing) => true,
            (Processing, Shipped) => true,
            (Shipped, Delivered) => true,
            (from, Cancelled) if !from.is_terminal() => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-reported payment outcome, stored verbatim on the order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    /// Provider transaction id (payment intent / charge)
    pub id: String,

    /// Provider-reported status (e.g., "paid", "succeeded")
    pub status: String,

    /// Provider-reported update timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,

    /// Payer email as reported by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

/// An order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID (generated)
    pub id: String,

    /// Owning user
    pub user_id: String,

    /// Line items (snapshots, immutable after creation)
    pub items: Vec<LineItem>,

    /// Shipping address
    pub shipping_address: ShippingAddress,

    /// Payment method tag (e.g., "card")
    pub payment_method: String,

    /// Price breakdown
    pub pricing: PriceBreakdown,

    /// Lifecycle status
    pub status: OrderStatus,

    /// Whether payment has been confirmed
    pub is_paid: bool,

    /// Set iff `is_paid`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,

    /// Provider payment outcome, set when paid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_receipt: Option<PaymentReceipt>,

    /// Whether the order has been delivered
    pub is_delivered: bool,

    /// Set iff `is_delivered`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,

    /// Payment-provider correlation key, set when a checkout session is bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_session_id: Option<String>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new pending, unpaid order with a generated id
    pub fn new(
        user_id: impl Into<String>,
        items: Vec<LineItem>,
        shipping_address: ShippingAddress,
        payment_method: impl Into<String>,
        pricing: PriceBreakdown,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            items,
            shipping_address,
            payment_method: payment_method.into(),
            pricing,
            status: OrderStatus::Pending,
            is_paid: false,
            paid_at: None,
            payment_receipt: None,
            is_delivered: false,
            delivered_at: None,
            external_session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sum of line-item totals, in the breakdown currency
    pub fn items_total(&self) -> Price {
        let amount: i64 = self.items.iter().map(|i| i.total().amount).sum();
        Price::from_cents(amount, self.pricing.currency())
    }

    /// Apply an admin-driven status change, enforcing the transition graph.
    ///
    /// Becoming `delivered` also sets `is_delivered`/`delivered_at`.
    pub fn set_status(&mut self, next: OrderStatus) -> ShopResult<()> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(ShopError::Validation(format!(
                "illegal status transition: {} -> {}",
                self.status, next
            )));
        }
        self.status = next;
        if next == OrderStatus::Delivered {
            self.is_delivered = true;
            self.delivered_at = Some(Utc::now());
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record a confirmed payment.
    ///
    /// Convergent: on an already-paid order this is a no-op that preserves
    /// the original `paid_at` and receipt. Returns true iff the order
    /// transitioned from unpaid to paid on this call.
    pub fn apply_payment(&mut self, receipt: PaymentReceipt) -> bool {
        if self.is_paid {
            return false;
        }
        self.is_paid = true;
        self.paid_at = Some(Utc::now());
        self.payment_receipt = Some(receipt);
        if self.status == OrderStatus::Pending {
            self.status = OrderStatus::Processing;
        }
        self.updated_at = Utc::now();
        true
    }

    /// Bind the payment-provider session used to pay this order
    pub fn bind_session(&mut self, session_id: impl Into<String>) {
        self.external_session_id = Some(session_id.into());
        self.updated_at = Utc::now();
    }
}
