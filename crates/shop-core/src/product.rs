//! # Product Types
//!
//! Product catalog types for storefront-rs.
//! Products are seeded from `config/products.toml`.

use serde::{Deserialize, Serialize};

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    CAD,
}

impl Currency {
    /// Returns the ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "usd",
            Currency::EUR => "eur",
            Currency::GBP => "gbp",
            Currency::CAD => "cad",
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::USD
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

/// Price with amount in smallest currency unit (cents)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in cents
    pub amount: i64,
    /// Currency
    #[serde(default)]
    pub currency: Currency,
}

impl Price {
    /// Create a price from a decimal amount (e.g., 10.99 -> 1099 cents)
    pub fn new(amount: f64, currency: Currency) -> Self {
        Self {
            amount: (amount * 100.0).round() as i64,
            currency,
        }
    }

    /// Create a price from cents
    pub fn from_cents(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Zero in the given currency
    pub fn zero(currency: Currency) -> Self {
        Self { amount: 0, currency }
    }

    /// Get the decimal amount
    pub fn as_decimal(&self) -> f64 {
        self.amount as f64 / 100.0
    }

    /// Format for display (e.g., "$10.00")
    pub fn display(&self) -> String {
        let symbol = match self.currency {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::CAD => "C$",
        };
        format!("{}{:.2}", symbol, self.as_decimal())
    }

    /// Multiply by a quantity
    pub fn times(&self, quantity: u32) -> Price {
        Price {
            amount: self.amount * quantity as i64,
            currency: self.currency,
        }
    }
}

/// Closed set of product categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Electronics,
    Clothing,
    Books,
    Home,
    Sports,
    Other,
}

impl Default for Category {
    fn default() -> Self {
        Category::Other
    }
}

/// A product in the catalog.
///
/// `in_stock` is derived from `stock` and must be re-established whenever
/// the stock count changes; callers mutate stock only through
/// [`set_stock`](Product::set_stock) or the catalog store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier (e.g., "mech-keyboard-87")
    pub id: String,

    /// Display name
    pub name: String,

    /// Short description
    #[serde(default)]
    pub description: String,

    /// Unit price
    pub price: Price,

    /// Units on hand
    #[serde(default)]
    pub stock: u32,

    /// Derived availability flag, kept in sync with `stock`
    #[serde(default)]
    pub in_stock: bool,

    /// Category
    #[serde(default)]
    pub category: Category,

    /// Optional image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Whether this product is listed for purchase
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl Product {
    /// Create a new product
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price: Price,
        stock: u32,
        category: Category,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            price,
            stock,
            in_stock: stock > 0,
            category,
            image_url: None,
            active: true,
        }
    }

    /// Builder: set description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Builder: set image URL
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Set the stock count, re-deriving `in_stock`
    pub fn set_stock(&mut self, stock: u32) {
        self.stock = stock;
        self.in_stock = stock > 0;
    }

    /// Whether `quantity` units can be sold right now
    pub fn has_stock(&self, quantity: u32) -> bool {
        self.stock >= quantity
    }
}

/// Seed file shape for `config/products.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub products: Vec<Product>,
}

impl CatalogSeed {
    /// Parse a seed from TOML, normalizing the derived `in_stock` flag
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let mut seed: CatalogSeed = toml::from_str(toml_str)?;
        for product in &mut seed.products {
            product.in_stock = product.stock > 0;
        }
        Ok(seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_conversion() {
        let price = Price::new(10.99, Currency::USD);
        assert_eq!(price.amount, 1099);
        assert_eq!(price.as_decimal(), 10.99);
        assert_eq!(price.display(), "$10.99");
        assert_eq!(price.times(3).amount, 3297);
    }

    #[test]
    fn test_stock_derives_in_stock() {
        let mut product = Product::new(
            "kb-87",
            "Mechanical Keyboard",
            Price::new(89.0, Currency::USD),
            5,
            Category::Electronics,
        );
        assert!(product.in_stock);

        product.set_stock(0);
        assert!(!product.in_stock);

        product.set_stock(2);
        assert!(product.in_stock);
        assert!(product.has_stock(2));
        assert!(!product.has_stock(3));
    }

    #[test]
    fn test_catalog_seed_normalizes_in_stock() {
        let toml_str = r#"
            [[products]]
            id = "tee-basic"
            name = "Basic Tee"
            stock = 12
            category = "clothing"

            [products.price]
            amount = 1999
            currency = "usd"
        "#;

        let seed = CatalogSeed::from_toml(toml_str).unwrap();
        assert_eq!(seed.products.len(), 1);
        assert!(seed.products[0].in_stock);
        assert_eq!(seed.products[0].price.amount, 1999);
    }
}
