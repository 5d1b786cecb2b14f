//! # Order Manager
//!
//! The service at the center of the storefront: creates orders with atomic
//! stock reservation, answers order queries with ownership checks, applies
//! status transitions, and reconciles payment outcomes arriving from the
//! synchronous verify path and the provider webhook path.
//!
//! All collaborators are injected as trait objects so tests substitute
//! in-memory stores and a fake gateway.

use crate::error::{ShopError, ShopResult};
use crate::gateway::{CheckoutSession, SessionDetails, SharedGateway, WebhookEvent, WebhookEventType};
use crate::notify::SharedNotifier;
use crate::order::{LineItem, Order, OrderStatus, PaymentReceipt, PriceBreakdown, ShippingAddress};
use crate::product::Product;
use crate::store::{CatalogStore, OrderFilter, OrderStore, StockRequest, UserDirectory};
use crate::user::User;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A requested line in an incoming order
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// One page of the admin order listing
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: u64,
    pub page: u32,
    pub pages: u32,
}

/// Outcome of a synchronous session verification
#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusReport {
    pub session_id: String,
    pub payment_status: String,
    pub paid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
}

/// The order manager service
pub struct OrderManager {
    catalog: Arc<dyn CatalogStore>,
    orders: Arc<dyn OrderStore>,
    users: Arc<dyn UserDirectory>,
    gateway: SharedGateway,
    notifier: SharedNotifier,
}

impl OrderManager {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        orders: Arc<dyn OrderStore>,
        users: Arc<dyn UserDirectory>,
        gateway: SharedGateway,
        notifier: SharedNotifier,
    ) -> Self {
        Self {
            catalog,
            orders,
            users,
            gateway,
            notifier,
        }
    }

    // =========================================================================
    // Catalog and directory passthroughs
    // =========================================================================

    pub async fn products(&self) -> ShopResult<Vec<Product>> {
        self.catalog.list_active().await
    }

    pub async fn product(&self, product_id: &str) -> ShopResult<Product> {
        self.catalog
            .get(product_id)
            .await?
            .ok_or_else(|| ShopError::ProductNotFound {
                product_id: product_id.to_string(),
            })
    }

    pub async fn lookup_user(&self, user_id: &str) -> ShopResult<Option<User>> {
        self.users.get(user_id).await
    }

    // =========================================================================
    // Order creation
    // =========================================================================

    /// Create an order: validate every line, atomically reserve stock, and
    /// persist a pending, unpaid order carrying catalog snapshots.
    #[instrument(skip(self, items, shipping_address, pricing), fields(user_id = %user_id, lines = items.len()))]
    pub async fn create_order(
        &self,
        user_id: &str,
        items: &[OrderItemRequest],
        shipping_address: ShippingAddress,
        payment_method: &str,
        pricing: PriceBreakdown,
    ) -> ShopResult<Order> {
        if items.is_empty() {
            return Err(ShopError::Validation("order has no items".into()));
        }
        if items.iter().any(|i| i.quantity == 0) {
            return Err(ShopError::Validation(
                "line item quantity must be at least 1".into(),
            ));
        }
        pricing.validate()?;

        let requests: Vec<StockRequest> = items
            .iter()
            .map(|i| StockRequest {
                product_id: i.product_id.clone(),
                quantity: i.quantity,
            })
            .collect();

        // Validates every line before any counter moves; all-or-nothing
        let snapshots = self.catalog.reserve(&requests).await?;

        let line_items: Vec<LineItem> = snapshots
            .iter()
            .zip(items)
            .map(|(product, request)| LineItem::from_product(product, request.quantity))
            .collect();

        if line_items
            .iter()
            .any(|li| li.unit_price.currency != pricing.currency())
        {
            self.catalog.release(&requests).await?;
            return Err(ShopError::Validation(
                "line item currency does not match price breakdown".into(),
            ));
        }

        let order = Order::new(
            user_id,
            line_items,
            shipping_address,
            payment_method,
            pricing,
        );

        match self.orders.create(order).await {
            Ok(order) => {
                info!(order_id = %order.id, total = %order.pricing.total_price.display(), "order created");
                Ok(order)
            }
            Err(err) => {
                // Persisting failed after reservation: put the stock back
                if let Err(release_err) = self.catalog.release(&requests).await {
                    warn!(error = %release_err, "failed to release reserved stock");
                }
                Err(err)
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// All orders owned by the caller, newest first
    pub async fn my_orders(&self, user_id: &str) -> ShopResult<Vec<Order>> {
        self.orders.list_for_user(user_id).await
    }

    /// Fetch one order with an ownership check.
    ///
    /// Admins see any order and get a 404 for missing ids. Other callers
    /// get `Forbidden` both for orders they do not own and for missing
    /// ids, so the response never reveals whether an order exists.
    pub async fn order_for(&self, order_id: &str, requester: &User) -> ShopResult<Order> {
        match self.orders.get(order_id).await? {
            Some(order) if order.user_id == requester.id || requester.is_admin() => Ok(order),
            Some(_) => Err(ShopError::Forbidden(
                "order belongs to another user".into(),
            )),
            None if requester.is_admin() => Err(ShopError::OrderNotFound {
                order_id: order_id.to_string(),
            }),
            None => Err(ShopError::Forbidden(
                "order belongs to another user".into(),
            )),
        }
    }

    /// Filtered, paginated order listing (admin surface)
    pub async fn list_orders(
        &self,
        filter: OrderFilter,
        page: u32,
        limit: u32,
    ) -> ShopResult<OrderPage> {
        let page = page.max(1);
        let limit = limit.max(1);
        let (orders, total) = self.orders.list(filter, page, limit).await?;
        let pages = total.div_ceil(limit as u64) as u32;
        Ok(OrderPage {
            orders,
            total,
            page,
            pages,
        })
    }

    // =========================================================================
    // Status lifecycle
    // =========================================================================

    /// Admin-driven status change; the entity's transition graph decides
    /// legality, and `delivered` sets the delivery flags.
    #[instrument(skip(self), fields(order_id = %order_id, next = %next))]
    pub async fn update_status(&self, order_id: &str, next: OrderStatus) -> ShopResult<Order> {
        let order = self.orders.apply_status(order_id, next).await?;
        info!(status = %order.status, "order status updated");
        Ok(order)
    }

    // =========================================================================
    // Payment confirmation and reconciliation
    // =========================================================================

    /// User-initiated payment confirmation (owner or admin only). The
    /// webhook path enters through [`ingest_webhook`](Self::ingest_webhook)
    /// instead; this entry never trusts unauthenticated callers.
    pub async fn pay_order(
        &self,
        order_id: &str,
        requester: &User,
        receipt: PaymentReceipt,
    ) -> ShopResult<Order> {
        self.order_for(order_id, requester).await?;
        let (order, _) = self.confirm_payment(order_id, receipt).await?;
        Ok(order)
    }

    /// Create a provider checkout session for an order and bind its id as
    /// the correlation key.
    #[instrument(skip(self, requester), fields(order_id = %order_id))]
    pub async fn begin_checkout(
        &self,
        order_id: &str,
        requester: &User,
        success_url: &str,
        cancel_url: &str,
    ) -> ShopResult<CheckoutSession> {
        let order = self.order_for(order_id, requester).await?;
        if order.is_paid {
            return Err(ShopError::Validation("order is already paid".into()));
        }

        let session = self
            .gateway
            .create_checkout(&order, success_url, cancel_url)
            .await?;
        self.orders.bind_session(order_id, &session.session_id).await?;

        info!(session_id = %session.session_id, "checkout session created");
        Ok(session)
    }

    /// Synchronous reconciliation path: ask the provider for the
    /// authoritative session state; apply the payment iff paid, otherwise
    /// report without mutating anything.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn verify_session(&self, session_id: &str) -> ShopResult<PaymentStatusReport> {
        let details = self.gateway.retrieve_session(session_id).await?;

        if !details.is_paid() {
            debug!(status = %details.payment_status, "session not paid yet");
            return Ok(PaymentStatusReport {
                session_id: details.session_id,
                payment_status: details.payment_status,
                paid: false,
                order: None,
            });
        }

        let order_id = self.correlate(details.order_id.as_deref(), session_id).await?;
        let order_id = order_id.ok_or_else(|| ShopError::OrderNotFound {
            order_id: format!("(session {session_id})"),
        })?;

        let receipt = receipt_from_session(&details);
        let (order, _) = self.confirm_payment(&order_id, receipt).await?;

        Ok(PaymentStatusReport {
            session_id: details.session_id,
            payment_status: details.payment_status,
            paid: true,
            order: Some(order),
        })
    }

    /// Webhook entry: verify the signature (rejecting before any payload
    /// interpretation), then apply the event.
    pub async fn ingest_webhook(&self, payload: &[u8], signature: &str) -> ShopResult<()> {
        let event = self.gateway.verify_webhook(payload, signature).await?;
        self.handle_event(event).await
    }

    /// Asynchronous reconciliation path. Tolerates duplicate delivery and
    /// events for orders already paid by the verify path; failed-payment
    /// events are observed but never mutate order state.
    #[instrument(skip(self, event), fields(event_id = %event.event_id, event_type = ?event.event_type))]
    pub async fn handle_event(&self, event: WebhookEvent) -> ShopResult<()> {
        match &event.event_type {
            WebhookEventType::CheckoutCompleted => {
                if !event.reports_paid_checkout() {
                    info!("checkout completed but not paid; ignoring");
                    return Ok(());
                }
                let order_id = self
                    .correlate(event.order_id.as_deref(), event.session_id.as_deref().unwrap_or(""))
                    .await?;
                let Some(order_id) = order_id else {
                    warn!("paid checkout event with no resolvable order; acknowledged");
                    return Ok(());
                };

                let receipt = PaymentReceipt {
                    id: event
                        .payment_intent_id
                        .clone()
                        .or_else(|| event.session_id.clone())
                        .unwrap_or_else(|| event.event_id.clone()),
                    status: event.payment_status.clone().unwrap_or_else(|| "paid".into()),
                    update_time: Some(event.timestamp.to_rfc3339()),
                    email_address: event.payer_email.clone(),
                };

                match self.confirm_payment(&order_id, receipt).await {
                    Ok((_, newly_paid)) => {
                        if newly_paid {
                            info!(order_id = %order_id, "order paid via webhook");
                        } else {
                            debug!(order_id = %order_id, "webhook for already-paid order; no-op");
                        }
                        Ok(())
                    }
                    Err(ShopError::OrderNotFound { .. }) => {
                        warn!(order_id = %order_id, "webhook references unknown order; acknowledged");
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            }
            WebhookEventType::PaymentFailed => {
                warn!(
                    payment_intent = ?event.payment_intent_id,
                    "payment failed; order state left unchanged"
                );
                Ok(())
            }
            WebhookEventType::Unknown(kind) => {
                debug!(kind = %kind, "unhandled webhook event");
                Ok(())
            }
        }
    }

    /// Conditional, convergent payment application. Fires the notifier
    /// best-effort only on the unpaid -> paid transition.
    async fn confirm_payment(
        &self,
        order_id: &str,
        receipt: PaymentReceipt,
    ) -> ShopResult<(Order, bool)> {
        let (order, newly_paid) = self.orders.apply_payment(order_id, receipt).await?;

        if newly_paid {
            let user = self.users.get(&order.user_id).await.unwrap_or(None);
            if let Err(err) = self.notifier.order_confirmed(&order, user.as_ref()).await {
                warn!(order_id = %order.id, error = %err, "confirmation notification failed");
            }
        }

        Ok((order, newly_paid))
    }

    /// Map a provider signal back to a local order: prefer the metadata
    /// correlation key, fall back to the bound session id.
    async fn correlate(
        &self,
        metadata_order_id: Option<&str>,
        session_id: &str,
    ) -> ShopResult<Option<String>> {
        if let Some(order_id) = metadata_order_id {
            return Ok(Some(order_id.to_string()));
        }
        Ok(self
            .orders
            .find_by_session(session_id)
            .await?
            .map(|o| o.id))
    }
}

fn receipt_from_session(details: &SessionDetails) -> PaymentReceipt {
    PaymentReceipt {
        id: details
            .payment_intent_id
            .clone()
            .unwrap_or_else(|| details.session_id.clone()),
        status: details.payment_status.clone(),
        update_time: None,
        email_address: details.payer_email.clone(),
    }
}
