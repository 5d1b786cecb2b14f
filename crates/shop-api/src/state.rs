//! # Application State
//!
//! Shared state for the Axum application: the order manager (with its
//! injected stores, gateway, and notifier) plus server configuration.

use anyhow::Context;
use shop_core::{
    CatalogSeed, DirectorySeed, InMemoryCatalog, InMemoryDirectory, InMemoryOrders, LogNotifier,
    OrderManager, SharedGateway,
};
use shop_stripe::StripeGateway;
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Base URL for payment redirect callbacks
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .context("invalid HOST/PORT")
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Redirect target after a successful payment; the provider fills in
    /// the session id placeholder
    pub fn success_url(&self) -> String {
        format!(
            "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}",
            self.base_url
        )
    }

    /// Redirect target when the customer cancels
    pub fn cancel_url(&self) -> String {
        format!("{}/checkout/cancel", self.base_url)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The order manager service
    pub manager: Arc<OrderManager>,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Create the production state: seeded in-memory stores, the Stripe
    /// gateway from env, and a logging notifier.
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();

        let catalog = load_catalog()?;
        let directory = load_directory()?;

        let gateway: SharedGateway = Arc::new(
            StripeGateway::from_env().map_err(|e| anyhow::anyhow!("Stripe init: {e}"))?,
        );

        let manager = OrderManager::new(
            Arc::new(catalog),
            Arc::new(InMemoryOrders::new()),
            Arc::new(directory),
            gateway,
            Arc::new(LogNotifier),
        );

        Ok(Self {
            manager: Arc::new(manager),
            config,
        })
    }

    /// Assemble state from parts (used by tests to substitute fakes)
    pub fn with_parts(manager: OrderManager, config: AppConfig) -> Self {
        Self {
            manager: Arc::new(manager),
            config,
        }
    }
}

/// Load the product catalog from `config/products.toml`
fn load_catalog() -> anyhow::Result<InMemoryCatalog> {
    let paths = [
        "config/products.toml",
        "../config/products.toml",
        "../../config/products.toml",
    ];

    for path in paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let seed = CatalogSeed::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {path}: {e}"))?;
            tracing::info!("Loaded {} products from {}", seed.products.len(), path);
            return Ok(InMemoryCatalog::from_seed(seed));
        }
    }

    tracing::warn!("No product catalog found, using empty catalog");
    Ok(InMemoryCatalog::new())
}

/// Load the account directory from `config/users.toml`
fn load_directory() -> anyhow::Result<InMemoryDirectory> {
    let paths = [
        "config/users.toml",
        "../config/users.toml",
        "../../config/users.toml",
    ];

    for path in paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let seed = DirectorySeed::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {path}: {e}"))?;
            tracing::info!("Loaded {} users from {}", seed.users.len(), path);
            return Ok(InMemoryDirectory::from_seed(seed));
        }
    }

    tracing::warn!("No user directory found, using empty directory");
    Ok(InMemoryDirectory::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_defaults() {
        std::env::remove_var("HOST");
        std::env::remove_var("PORT");
        std::env::remove_var("BASE_URL");

        let config = AppConfig::from_env();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert!(!config.is_production());
    }

    #[test]
    fn test_redirect_urls() {
        let config = AppConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            base_url: "https://shop.example.com".to_string(),
            environment: "test".to_string(),
        };

        assert_eq!(
            config.success_url(),
            "https://shop.example.com/checkout/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(config.cancel_url(), "https://shop.example.com/checkout/cancel");
        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:3000");
    }
}
