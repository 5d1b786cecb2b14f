//! # Payment Gateway Trait
//!
//! Seam between the order manager and a third-party payment processor.
//! The adapter owns provider wire formats and signature primitives; the
//! manager only sees normalized sessions and events.

use crate::error::ShopResult;
use crate::order::Order;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A checkout session created by the payment provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session ID (the correlation key kept on the order)
    pub session_id: String,

    /// Our order ID, carried in provider metadata
    pub order_id: String,

    /// Provider name (e.g., "stripe")
    pub provider: String,

    /// URL to redirect the customer to for payment
    pub checkout_url: String,

    /// When the session expires, if the provider reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

/// Authoritative session state fetched from the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetails {
    pub session_id: String,

    /// Provider-reported payment status (e.g., "paid", "unpaid")
    pub payment_status: String,

    /// Provider transaction reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,

    /// Payer email as reported by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_email: Option<String>,

    /// Our order ID, read back from provider metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,

    /// Amount paid in smallest currency unit
    pub amount_total: i64,
}

impl SessionDetails {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

/// Webhook event types the order manager reacts to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// Checkout session completed
    CheckoutCompleted,
    /// Payment failed
    PaymentFailed,
    /// Anything else (acknowledged, not acted on)
    Unknown(String),
}

/// A signature-verified, normalized webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event ID from the provider
    pub event_id: String,

    /// Event type
    pub event_type: WebhookEventType,

    /// Provider name
    pub provider: String,

    /// Related session ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Our order ID, extracted from event metadata by the adapter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,

    /// Provider-reported payment status for the related object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,

    /// Related payment intent ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,

    /// Payer email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_email: Option<String>,

    /// Amount paid (smallest unit)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_paid: Option<i64>,

    /// Raw event object (for debugging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,

    /// Provider timestamp
    pub timestamp: DateTime<Utc>,
}

impl WebhookEvent {
    /// Whether this event reports a successfully paid checkout
    pub fn reports_paid_checkout(&self) -> bool {
        self.event_type == WebhookEventType::CheckoutCompleted
            && self.payment_status.as_deref() == Some("paid")
    }
}

/// Payment provider adapter.
///
/// Implementations wrap one provider's session and webhook APIs.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a checkout session for an order, embedding the order id as
    /// the correlation key.
    async fn create_checkout(
        &self,
        order: &Order,
        success_url: &str,
        cancel_url: &str,
    ) -> ShopResult<CheckoutSession>;

    /// Retrieve the authoritative state of a session from the provider.
    async fn retrieve_session(&self, session_id: &str) -> ShopResult<SessionDetails>;

    /// Verify a webhook signature and normalize the event.
    ///
    /// Must reject before interpreting any payload content when the
    /// signature does not match.
    async fn verify_webhook(&self, payload: &[u8], signature: &str) -> ShopResult<WebhookEvent>;

    /// Provider name (for logging and routing)
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared gateway (dynamic dispatch)
pub type SharedGateway = Arc<dyn PaymentGateway>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_paid_flag() {
        let mut details = SessionDetails {
            session_id: "cs_1".into(),
            payment_status: "unpaid".into(),
            payment_intent_id: None,
            payer_email: None,
            order_id: None,
            amount_total: 0,
        };
        assert!(!details.is_paid());
        details.payment_status = "paid".into();
        assert!(details.is_paid());
    }

    #[test]
    fn test_event_paid_checkout() {
        let mut event = WebhookEvent {
            event_id: "evt_1".into(),
            event_type: WebhookEventType::CheckoutCompleted,
            provider: "stripe".into(),
            session_id: Some("cs_1".into()),
            order_id: Some("ord_1".into()),
            payment_status: Some("paid".into()),
            payment_intent_id: None,
            payer_email: None,
            amount_paid: Some(1000),
            raw_data: None,
            timestamp: Utc::now(),
        };
        assert!(event.reports_paid_checkout());

        event.payment_status = Some("unpaid".into());
        assert!(!event.reports_paid_checkout());

        event.payment_status = Some("paid".into());
        event.event_type = WebhookEventType::Unknown("invoice.paid".into());
        assert!(!event.reports_paid_checkout());
    }
}
