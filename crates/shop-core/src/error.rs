//! # Error Types
//!
//! Typed error handling for the storefront order engine.
//! All fallible operations return `Result<T, ShopError>`.

use thiserror::Error;

/// Core error type for all storefront operations
#[derive(Debug, Error)]
pub enum ShopError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed or empty input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing credentials or unknown caller identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but not allowed to act on the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Product not found in catalog
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: String },

    /// Order not found
    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: String },

    /// User not found in the account directory
    #[error("User not found: {user_id}")]
    UserNotFound { user_id: String },

    /// Requested quantity exceeds what the catalog has on hand
    #[error("Insufficient stock for {name}: available {available}")]
    InsufficientStock { name: String, available: u32 },

    /// Payment provider API error
    #[error("Provider error [{provider}]: {message}")]
    Provider { provider: String, message: String },

    /// Network/HTTP error communicating with provider
    #[error("Network error: {0}")]
    Network(String),

    /// Webhook signature verification failed
    #[error("Webhook verification failed: {0}")]
    SignatureVerification(String),

    /// Webhook payload parsing error
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShopError {
    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ShopError::Configuration(_) => 500,
            ShopError::Validation(_) => 400,
            ShopError::Unauthorized(_) => 401,
            ShopError::Forbidden(_) => 403,
            ShopError::ProductNotFound { .. } => 404,
            ShopError::OrderNotFound { .. } => 404,
            ShopError::UserNotFound { .. } => 404,
            ShopError::InsufficientStock { .. } => 400,
            ShopError::Provider { .. } => 500,
            ShopError::Network(_) => 503,
            ShopError::SignatureVerification(_) => 400,
            ShopError::WebhookParse(_) => 400,
            ShopError::Serialization(_) => 500,
            ShopError::Internal(_) => 500,
        }
    }

    /// Returns true for errors the caller can fix by changing the request
    pub fn is_client_error(&self) -> bool {
        let code = self.status_code();
        (400..500).contains(&code)
    }
}

/// Result type alias for storefront operations
pub type ShopResult<T> = Result<T, ShopError>;
