//! # Stripe Checkout Gateway
//!
//! `PaymentGateway` implementation backed by the Stripe Checkout Sessions
//! API: session creation, authoritative session retrieval for the
//! synchronous verify path, and webhook signature verification for the
//! asynchronous path.

use crate::config::StripeConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use shop_core::{
    CheckoutSession, Order, PaymentGateway, SessionDetails, ShopError, ShopResult, WebhookEvent,
    WebhookEventType,
};
use tracing::{debug, error, info, instrument};

/// Stripe Checkout Sessions gateway.
///
/// Uses Stripe's hosted checkout page; the local order id travels in
/// session metadata as the correlation key.
pub struct StripeGateway {
    config: StripeConfig,
    client: Client,
}

impl StripeGateway {
    /// Create a new Stripe gateway
    pub fn new(config: StripeConfig) -> ShopResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ShopError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> ShopResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    /// Build the form body for the Checkout Sessions API
    fn checkout_form(order: &Order, success_url: &str, cancel_url: &str) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), success_url.to_string()),
            ("cancel_url".to_string(), cancel_url.to_string()),
            ("metadata[order_id]".to_string(), order.id.clone()),
        ];

        for (i, item) in order.items.iter().enumerate() {
            form.push((
                format!("line_items[{i}][price_data][currency]"),
                item.unit_price.currency.as_str().to_string(),
            ));
            form.push((
                format!("line_items[{i}][price_data][unit_amount]"),
                item.unit_price.amount.to_string(),
            ));
            form.push((
                format!("line_items[{i}][price_data][product_data][name]"),
                item.name.clone(),
            ));
            if let Some(ref image) = item.image_url {
                form.push((
                    format!("line_items[{i}][price_data][product_data][images][0]"),
                    image.clone(),
                ));
            }
            form.push((format!("line_items[{i}][quantity]"), item.quantity.to_string()));
        }

        form
    }

    async fn read_body(response: reqwest::Response) -> ShopResult<(reqwest::StatusCode, String)> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ShopError::Network(e.to_string()))?;
        Ok((status, body))
    }

    fn provider_failure(status: reqwest::StatusCode, body: &str) -> ShopError {
        error!("Stripe API error: status={status}, body={body}");
        if let Ok(parsed) = serde_json::from_str::<StripeErrorResponse>(body) {
            return ShopError::Provider {
                provider: "stripe".to_string(),
                message: parsed.error.message,
            };
        }
        ShopError::Provider {
            provider: "stripe".to_string(),
            message: format!("HTTP {status}: {body}"),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    async fn create_checkout(
        &self,
        order: &Order,
        success_url: &str,
        cancel_url: &str,
    ) -> ShopResult<CheckoutSession> {
        if order.items.is_empty() {
            return Err(ShopError::Validation("order has no items".to_string()));
        }

        let form = Self::checkout_form(order, success_url, cancel_url);
        debug!("Creating Stripe checkout session: {} lines", order.items.len());

        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .header("Idempotency-Key", &order.id)
            .form(&form)
            .send()
            .await
            .map_err(|e| ShopError::Network(e.to_string()))?;

        let (status, body) = Self::read_body(response).await?;
        if !status.is_success() {
            return Err(Self::provider_failure(status, &body));
        }

        let session: StripeSession = serde_json::from_str(&body)
            .map_err(|e| ShopError::Serialization(format!("Stripe session response: {e}")))?;

        info!(session_id = %session.id, "created Stripe checkout session");

        Ok(CheckoutSession {
            session_id: session.id,
            order_id: order.id.clone(),
            provider: "stripe".to_string(),
            checkout_url: session.url.unwrap_or_default(),
            expires_at: session
                .expires_at
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            created_at: Utc::now(),
        })
    }

    #[instrument(skip(self))]
    async fn retrieve_session(&self, session_id: &str) -> ShopResult<SessionDetails> {
        let url = format!(
            "{}/v1/checkout/sessions/{}",
            self.config.api_base_url, session_id
        );
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .send()
            .await
            .map_err(|e| ShopError::Network(e.to_string()))?;

        let (status, body) = Self::read_body(response).await?;
        if !status.is_success() {
            return Err(Self::provider_failure(status, &body));
        }

        let session: StripeSession = serde_json::from_str(&body)
            .map_err(|e| ShopError::Serialization(format!("Stripe session response: {e}")))?;

        debug!(status = %session.payment_status, "retrieved Stripe session");

        Ok(SessionDetails {
            session_id: session.id,
            payment_status: session.payment_status,
            payment_intent_id: session.payment_intent,
            payer_email: session.customer_details.and_then(|cd| cd.email),
            order_id: session.metadata.and_then(|m| m.order_id),
            amount_total: session.amount_total.unwrap_or(0),
        })
    }

    #[instrument(skip(self, payload, signature))]
    async fn verify_webhook(&self, payload: &[u8], signature: &str) -> ShopResult<WebhookEvent> {
        let sig_parts = parse_signature_header(signature)?;

        // Timestamp must be within tolerance (5 minutes)
        let now = Utc::now().timestamp();
        if (now - sig_parts.timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
            return Err(ShopError::SignatureVerification(
                "Timestamp outside tolerance".to_string(),
            ));
        }

        let signed_payload = format!(
            "{}.{}",
            sig_parts.timestamp,
            String::from_utf8_lossy(payload)
        );
        let expected_sig = compute_hmac_sha256(&self.config.webhook_secret, &signed_payload);

        let valid = sig_parts
            .signatures
            .iter()
            .any(|sig| constant_time_compare(sig, &expected_sig));

        if !valid {
            return Err(ShopError::SignatureVerification(
                "Signature mismatch".to_string(),
            ));
        }

        // Signature is good; only now interpret the payload
        let event: StripeWebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| ShopError::WebhookParse(format!("Failed to parse webhook: {e}")))?;

        debug!("Verified Stripe webhook: type={}", event.event_type);

        let event_type = match event.event_type.as_str() {
            "checkout.session.completed" => WebhookEventType::CheckoutCompleted,
            "payment_intent.payment_failed" => WebhookEventType::PaymentFailed,
            other => WebhookEventType::Unknown(other.to_string()),
        };

        let object = &event.data.object;
        let session_id = object.get("id").and_then(|v| v.as_str()).map(String::from);
        let payment_intent_id = object
            .get("payment_intent")
            .and_then(|v| v.as_str())
            .map(String::from);
        let payment_status = object
            .get("payment_status")
            .and_then(|v| v.as_str())
            .map(String::from);
        let order_id = object
            .get("metadata")
            .and_then(|m| m.get("order_id"))
            .and_then(|v| v.as_str())
            .map(String::from);
        let payer_email = object
            .get("customer_details")
            .and_then(|cd| cd.get("email"))
            .and_then(|v| v.as_str())
            .map(String::from);
        let amount_paid = object.get("amount_total").and_then(|v| v.as_i64());

        Ok(WebhookEvent {
            event_id: event.id,
            event_type,
            provider: "stripe".to_string(),
            session_id,
            order_id,
            payment_status,
            payment_intent_id,
            payer_email,
            amount_paid,
            raw_data: Some(serde_json::Value::Object(event.data.object)),
            timestamp: DateTime::from_timestamp(event.created, 0).unwrap_or_else(Utc::now),
        })
    }

    fn provider_name(&self) -> &'static str {
        "stripe"
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    payment_status: String,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    customer_details: Option<StripeCustomerDetails>,
    #[serde(default)]
    metadata: Option<StripeSessionMetadata>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeCustomerDetails {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeSessionMetadata {
    #[serde(default)]
    order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeApiError,
}

#[derive(Debug, Deserialize)]
struct StripeApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Map<String, serde_json::Value>,
}

// =============================================================================
// Webhook Signature Verification
// =============================================================================

const SIGNATURE_TOLERANCE_SECS: i64 = 300;

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_signature_header(header: &str) -> ShopResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let kv: Vec<&str> = part.split('=').collect();
        if kv.len() != 2 {
            continue;
        }
        match kv[0] {
            "t" => {
                timestamp = kv[1].parse().ok();
            }
            "v1" => {
                signatures.push(kv[1].to_string());
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        ShopError::SignatureVerification("Missing timestamp in signature".to_string())
    })?;

    if signatures.is_empty() {
        return Err(ShopError::SignatureVerification(
            "No v1 signature found".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn compute_hmac_sha256(secret: &str, message: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shop_core::{
        Category, Currency, LineItem, Price, PriceBreakdown, Product, ShippingAddress,
    };
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_order() -> Order {
        let product = Product::new(
            "kb-87",
            "Mechanical Keyboard",
            Price::new(89.0, Currency::USD),
            5,
            Category::Electronics,
        );
        let item = LineItem::from_product(&product, 2);
        let items_price = item.total();
        Order::new(
            "u-ada",
            vec![item],
            ShippingAddress::default(),
            "card",
            PriceBreakdown {
                items_price,
                shipping_price: Price::zero(Currency::USD),
                tax_price: Price::zero(Currency::USD),
                total_price: items_price,
            },
        )
    }

    fn gateway_for(server: &MockServer) -> StripeGateway {
        let config =
            StripeConfig::new("sk_test_abc", "whsec_secret").with_api_base_url(server.uri());
        StripeGateway::new(config).unwrap()
    }

    #[test]
    fn test_checkout_form_shape() {
        let order = sample_order();
        let form = StripeGateway::checkout_form(&order, "https://s.test/ok", "https://s.test/no");

        let lookup = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(lookup("mode"), Some("payment"));
        assert_eq!(lookup("metadata[order_id]"), Some(order.id.as_str()));
        assert_eq!(
            lookup("line_items[0][price_data][unit_amount]"),
            Some("8900")
        );
        assert_eq!(lookup("line_items[0][quantity]"), Some("2"));
    }

    #[test]
    fn test_parse_signature_header() {
        let header = "t=1234567890,v1=abc123,v1=def456";
        let parsed = parse_signature_header(header).unwrap();

        assert_eq!(parsed.timestamp, 1234567890);
        assert_eq!(parsed.signatures.len(), 2);
        assert_eq!(parsed.signatures[0], "abc123");

        assert!(parse_signature_header("v1=abc").is_err());
        assert!(parse_signature_header("t=123").is_err());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc123", "abc123"));
        assert!(!constant_time_compare("abc123", "abc124"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    fn signed_event(secret: &str, body: &str) -> String {
        let ts = Utc::now().timestamp();
        let sig = compute_hmac_sha256(secret, &format!("{ts}.{body}"));
        format!("t={ts},v1={sig}")
    }

    fn completed_event_body() -> String {
        json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "created": Utc::now().timestamp(),
            "data": {
                "object": {
                    "id": "cs_test_123",
                    "payment_intent": "pi_test_456",
                    "payment_status": "paid",
                    "amount_total": 17800,
                    "customer_details": { "email": "ada@example.com" },
                    "metadata": { "order_id": "ord_abc" }
                }
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_verify_webhook_roundtrip() {
        let config = StripeConfig::new("sk_test_abc", "whsec_secret");
        let gateway = StripeGateway::new(config).unwrap();

        let body = completed_event_body();
        let header = signed_event("whsec_secret", &body);

        let event = gateway
            .verify_webhook(body.as_bytes(), &header)
            .await
            .unwrap();
        assert_eq!(event.event_type, WebhookEventType::CheckoutCompleted);
        assert_eq!(event.session_id.as_deref(), Some("cs_test_123"));
        assert_eq!(event.order_id.as_deref(), Some("ord_abc"));
        assert_eq!(event.payment_status.as_deref(), Some("paid"));
        assert_eq!(event.payer_email.as_deref(), Some("ada@example.com"));
        assert!(event.reports_paid_checkout());
    }

    #[tokio::test]
    async fn test_verify_webhook_rejects_forged_signature() {
        let config = StripeConfig::new("sk_test_abc", "whsec_secret");
        let gateway = StripeGateway::new(config).unwrap();

        let body = completed_event_body();
        let header = signed_event("whsec_wrong", &body);

        let err = gateway
            .verify_webhook(body.as_bytes(), &header)
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::SignatureVerification(_)));
    }

    #[tokio::test]
    async fn test_verify_webhook_rejects_stale_timestamp() {
        let config = StripeConfig::new("sk_test_abc", "whsec_secret");
        let gateway = StripeGateway::new(config).unwrap();

        let body = completed_event_body();
        let ts = Utc::now().timestamp() - 3600;
        let sig = compute_hmac_sha256("whsec_secret", &format!("{ts}.{body}"));
        let header = format!("t={ts},v1={sig}");

        let err = gateway
            .verify_webhook(body.as_bytes(), &header)
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::SignatureVerification(_)));
    }

    #[tokio::test]
    async fn test_create_checkout_against_mock() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_123",
                "url": "https://checkout.stripe.com/c/pay/cs_test_123",
                "payment_status": "unpaid"
            })))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let order = sample_order();
        let session = gateway
            .create_checkout(&order, "https://s.test/ok", "https://s.test/no")
            .await
            .unwrap();

        assert_eq!(session.session_id, "cs_test_123");
        assert_eq!(session.order_id, order.id);
        assert!(session.checkout_url.contains("cs_test_123"));
    }

    #[tokio::test]
    async fn test_create_checkout_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "Invalid currency" }
            })))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let err = gateway
            .create_checkout(&sample_order(), "https://s.test/ok", "https://s.test/no")
            .await
            .unwrap_err();

        match err {
            ShopError::Provider { provider, message } => {
                assert_eq!(provider, "stripe");
                assert_eq!(message, "Invalid currency");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_retrieve_session_against_mock() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_test_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_123",
                "payment_status": "paid",
                "payment_intent": "pi_test_456",
                "amount_total": 17800,
                "customer_details": { "email": "ada@example.com" },
                "metadata": { "order_id": "ord_abc" }
            })))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let details = gateway.retrieve_session("cs_test_123").await.unwrap();

        assert!(details.is_paid());
        assert_eq!(details.order_id.as_deref(), Some("ord_abc"));
        assert_eq!(details.payment_intent_id.as_deref(), Some("pi_test_456"));
        assert_eq!(details.amount_total, 17800);
    }
}
