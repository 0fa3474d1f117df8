//! Storefront Engine
//!
//! Catalog search and cart consistency for a multi-variant storefront.
//!
//! ## Features
//! - Unified search across book, mobile, shoes and clothes catalogs
//! - Typeahead suggestions, popular searches and per-user search history
//! - Customer carts with live stock validation
//! - Checkout with stock reservation and cart rollover

use thiserror::Error;
use uuid::Uuid;

pub mod cart;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod http;
pub mod notify;
pub mod search;
pub mod store;

use crate::domain::aggregates::{CartError, ProductKind};
use crate::store::StoreError;

pub use crate::cart::{CartManager, Checkout};
pub use crate::catalog::ProductCatalog;
pub use crate::config::{EngineConfig, ServerConfig};
pub use crate::search::{SearchIndex, SearchOutcome, SearchQuery};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    InvalidQuery(String),

    #[error("Quantity must be a positive integer")]
    InvalidQuantity,

    #[error("Cart is not active")]
    CartInactive,

    #[error("Cart {0} not found")]
    CartNotFound(Uuid),

    #[error("Cart item {0} not found")]
    ItemNotFound(Uuid),

    #[error("Product {product_type}/{product_id} not found")]
    ProductNotFound { product_type: ProductKind, product_id: String },

    #[error("Unsupported product type: {0}")]
    UnsupportedProductType(String),

    #[error("Insufficient stock for {product_type}/{product_id}: requested {requested}, available {available}")]
    InsufficientStock { product_type: ProductKind, product_id: String, requested: u32, available: u32 },

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Cart {0} was modified concurrently, please retry")]
    Conflict(Uuid),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Storage error: {0}")]
    Store(String),
}

impl EngineError {
    /// Stable machine-readable identifier.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidQuery(_) => "invalid_query",
            Self::InvalidQuantity => "invalid_quantity",
            Self::CartInactive => "cart_inactive",
            Self::CartNotFound(_) => "cart_not_found",
            Self::ItemNotFound(_) => "item_not_found",
            Self::ProductNotFound { .. } => "product_not_found",
            Self::UnsupportedProductType(_) => "unsupported_product_type",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::EmptyCart => "empty_cart",
            Self::Conflict(_) => "conflict",
            Self::Timeout(_) => "timeout",
            Self::Store(_) => "storage_error",
        }
    }

    /// Whether the caller can fix the request; infrastructure failures are not.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Conflict(_) | Self::Timeout(_) | Self::Store(_))
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConcurrentWrite { id, .. } => Self::Conflict(id),
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<CartError> for EngineError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::Inactive => Self::CartInactive,
            CartError::Empty => Self::EmptyCart,
            CartError::ItemNotFound(id) => Self::ItemNotFound(id),
            CartError::QuantityOverflow => Self::InvalidQuantity,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
