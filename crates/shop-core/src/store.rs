//! # Stores
//!
//! Async store traits for the catalog, orders, and the account directory,
//! with in-memory implementations. The traits are the seams the order
//! manager is built against; tests and alternative backends substitute
//! their own implementations.
//!
//! Stock reservation is the one operation with a real concurrency
//! contract: validation and decrement happen inside a single critical
//! section, all-or-nothing across every requested line, so two racing
//! orders can never drive a stock counter negative.

use crate::error::{ShopError, ShopResult};
use crate::order::{Order, OrderStatus, PaymentReceipt};
use crate::product::{CatalogSeed, Product};
use crate::user::{DirectorySeed, User};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// A requested quantity of one product
#[derive(Debug, Clone)]
pub struct StockRequest {
    pub product_id: String,
    pub quantity: u32,
}

/// Equality filters for the admin order listing
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub is_paid: Option<bool>,
}

impl OrderFilter {
    fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| order.status == s)
            && self.is_paid.map_or(true, |p| order.is_paid == p)
    }
}

/// Product catalog store
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fetch one product
    async fn get(&self, product_id: &str) -> ShopResult<Option<Product>>;

    /// All products listed for purchase
    async fn list_active(&self) -> ShopResult<Vec<Product>>;

    /// Atomically reserve stock for every request, or none of them.
    ///
    /// Validates all lines before decrementing any; lines repeating a
    /// product id count against that product's stock as their summed
    /// quantity. On success returns the product snapshots as they were at
    /// reservation time (for line-item snapshots). Fails with
    /// `ProductNotFound` or `InsufficientStock` leaving every counter
    /// untouched.
    async fn reserve(&self, requests: &[StockRequest]) -> ShopResult<Vec<Product>>;

    /// Return previously reserved stock (rollback when persisting the
    /// order fails after reservation)
    async fn release(&self, requests: &[StockRequest]) -> ShopResult<()>;
}

/// Order store
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order
    async fn create(&self, order: Order) -> ShopResult<Order>;

    /// Fetch one order
    async fn get(&self, order_id: &str) -> ShopResult<Option<Order>>;

    /// All orders owned by a user, newest first
    async fn list_for_user(&self, user_id: &str) -> ShopResult<Vec<Order>>;

    /// Filtered page of orders plus the total match count, newest first.
    /// `page` is 1-based.
    async fn list(
        &self,
        filter: OrderFilter,
        page: u32,
        limit: u32,
    ) -> ShopResult<(Vec<Order>, u64)>;

    /// Apply a status transition under the store lock; the entity enforces
    /// the transition graph
    async fn apply_status(&self, order_id: &str, next: OrderStatus) -> ShopResult<Order>;

    /// Apply a payment outcome under the store lock. Returns the order and
    /// whether it became paid on this call (false when already paid).
    async fn apply_payment(
        &self,
        order_id: &str,
        receipt: PaymentReceipt,
    ) -> ShopResult<(Order, bool)>;

    /// Bind a provider checkout session to an order
    async fn bind_session(&self, order_id: &str, session_id: &str) -> ShopResult<Order>;

    /// Look an order up by its bound provider session
    async fn find_by_session(&self, session_id: &str) -> ShopResult<Option<Order>>;
}

/// Account directory (read-only from this service's point of view)
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get(&self, user_id: &str) -> ShopResult<Option<User>>;
}

// =============================================================================
// In-memory implementations
// =============================================================================

/// In-memory catalog backed by a single mutex; the lock is the atomicity
/// guard for reserve/release
#[derive(Default)]
pub struct InMemoryCatalog {
    products: Mutex<HashMap<String, Product>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let map = products.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            products: Mutex::new(map),
        }
    }

    pub fn from_seed(seed: CatalogSeed) -> Self {
        Self::with_products(seed.products)
    }

    fn lock(&self) -> ShopResult<std::sync::MutexGuard<'_, HashMap<String, Product>>> {
        self.products
            .lock()
            .map_err(|_| ShopError::Internal("catalog lock poisoned".into()))
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn get(&self, product_id: &str) -> ShopResult<Option<Product>> {
        Ok(self.lock()?.get(product_id).cloned())
    }

    async fn list_active(&self) -> ShopResult<Vec<Product>> {
        let mut products: Vec<Product> =
            self.lock()?.values().filter(|p| p.active).cloned().collect();
        products.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(products)
    }

    async fn reserve(&self, requests: &[StockRequest]) -> ShopResult<Vec<Product>> {
        let mut products = self.lock()?;

        // Lines may repeat a product id; demand is validated per product
        // against the summed quantity, not line by line
        let mut demand: HashMap<&str, u32> = HashMap::new();
        for request in requests {
            let summed = demand.entry(request.product_id.as_str()).or_insert(0);
            *summed = summed.saturating_add(request.quantity);
        }

        for (product_id, quantity) in &demand {
            let product = products.get(*product_id).ok_or_else(|| {
                ShopError::ProductNotFound {
                    product_id: (*product_id).to_string(),
                }
            })?;
            if !product.has_stock(*quantity) {
                return Err(ShopError::InsufficientStock {
                    name: product.name.clone(),
                    available: product.stock,
                });
            }
        }

        // Snapshots reflect the pre-decrement state, one per requested line
        let mut snapshots = Vec::with_capacity(requests.len());
        for request in requests {
            if let Some(product) = products.get(&request.product_id) {
                snapshots.push(product.clone());
            }
        }

        // Decrement once per product, still under the same lock
        for (product_id, quantity) in demand {
            if let Some(product) = products.get_mut(product_id) {
                let remaining = product.stock.saturating_sub(quantity);
                product.set_stock(remaining);
            }
        }

        Ok(snapshots)
    }

    async fn release(&self, requests: &[StockRequest]) -> ShopResult<()> {
        let mut products = self.lock()?;
        for request in requests {
            if let Some(product) = products.get_mut(&request.product_id) {
                let restored = product.stock.saturating_add(request.quantity);
                product.set_stock(restored);
            }
        }
        Ok(())
    }
}

/// In-memory order store
#[derive(Default)]
pub struct InMemoryOrders {
    orders: Mutex<HashMap<String, Order>>,
}

impl InMemoryOrders {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ShopResult<std::sync::MutexGuard<'_, HashMap<String, Order>>> {
        self.orders
            .lock()
            .map_err(|_| ShopError::Internal("order lock poisoned".into()))
    }

    fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        orders
    }
}

#[async_trait]
impl OrderStore for InMemoryOrders {
    async fn create(&self, order: Order) -> ShopResult<Order> {
        self.lock()?.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn get(&self, order_id: &str) -> ShopResult<Option<Order>> {
        Ok(self.lock()?.get(order_id).cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> ShopResult<Vec<Order>> {
        let orders = self
            .lock()?
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        Ok(Self::newest_first(orders))
    }

    async fn list(
        &self,
        filter: OrderFilter,
        page: u32,
        limit: u32,
    ) -> ShopResult<(Vec<Order>, u64)> {
        let matched: Vec<Order> = self
            .lock()?
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        let matched = Self::newest_first(matched);
        let total = matched.len() as u64;

        let limit = limit.max(1) as usize;
        let page = page.max(1) as usize;
        let start = (page - 1).saturating_mul(limit);
        let page_items = matched.into_iter().skip(start).take(limit).collect();

        Ok((page_items, total))
    }

    async fn apply_status(&self, order_id: &str, next: OrderStatus) -> ShopResult<Order> {
        let mut orders = self.lock()?;
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| ShopError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;
        order.set_status(next)?;
        Ok(order.clone())
    }

    async fn apply_payment(
        &self,
        order_id: &str,
        receipt: PaymentReceipt,
    ) -> ShopResult<(Order, bool)> {
        let mut orders = self.lock()?;
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| ShopError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;
        let newly_paid = order.apply_payment(receipt);
        Ok((order.clone(), newly_paid))
    }

    async fn bind_session(&self, order_id: &str, session_id: &str) -> ShopResult<Order> {
        let mut orders = self.lock()?;
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| ShopError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;
        order.bind_session(session_id);
        Ok(order.clone())
    }

    async fn find_by_session(&self, session_id: &str) -> ShopResult<Option<Order>> {
        Ok(self
            .lock()?
            .values()
            .find(|o| o.external_session_id.as_deref() == Some(session_id))
            .cloned())
    }
}

/// In-memory account directory
#[derive(Default)]
pub struct InMemoryDirectory {
    users: Mutex<HashMap<String, User>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let map = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        Self {
            users: Mutex::new(map),
        }
    }

    pub fn from_seed(seed: DirectorySeed) -> Self {
        Self::with_users(seed.users)
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn get(&self, user_id: &str) -> ShopResult<Option<User>> {
        let users = self
            .users
            .lock()
            .map_err(|_| ShopError::Internal("directory lock poisoned".into()))?;
        Ok(users.get(user_id).cloned())
    }
}
