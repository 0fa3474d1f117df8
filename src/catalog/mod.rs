//! Product Availability Lookup
//!
//! Every product variant is served by its own [`ProductStore`]. The engine
//! never assumes the stores are co-located: each call goes through the
//! [`ProductCatalog`], which owns the kind → store binding and applies the
//! lookup deadline.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::aggregates::{Product, ProductKind};
use crate::domain::value_objects::Quantity;
use crate::store::{StoreError, StoreResult};
use crate::{EngineError, Result};

pub mod memory;

pub use memory::InMemoryProductStore;

/// Predicates a variant store applies to its own collection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductFilter {
    pub term: String,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock_only: bool,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        let price = product.price().amount();
        product.matches_text(&self.term)
            && self.min_price.map_or(true, |min| price >= min)
            && self.max_price.map_or(true, |max| price <= max)
            && (!self.in_stock_only || product.stock() > 0)
    }
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    fn kind(&self) -> ProductKind;

    async fn get(&self, id: &str) -> StoreResult<Option<Product>>;

    /// Matching products in the store's natural order.
    async fn search(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>>;

    /// Display names of up to `limit` products whose suggestion fields contain `partial`.
    async fn suggest(&self, partial: &str, limit: usize) -> StoreResult<Vec<String>>;

    /// Conditionally lowers stock; fails with `InsufficientStock` instead of going negative.
    async fn decrement_stock(&self, id: &str, qty: Quantity) -> StoreResult<u32>;

    async fn restock(&self, id: &str, qty: Quantity) -> StoreResult<u32>;
}

pub struct ProductCatalog {
    stores: BTreeMap<ProductKind, Arc<dyn ProductStore>>,
    lookup_timeout: Duration,
}

impl fmt::Debug for ProductCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProductCatalog")
            .field("kinds", &self.stores.keys().collect::<Vec<_>>())
            .field("lookup_timeout", &self.lookup_timeout)
            .finish()
    }
}

#[derive(Default)]
pub struct CatalogBuilder {
    stores: BTreeMap<ProductKind, Arc<dyn ProductStore>>,
    lookup_timeout: Option<Duration>,
}

impl CatalogBuilder {
    pub fn bind(mut self, kind: ProductKind, store: Arc<dyn ProductStore>) -> Self {
        self.stores.insert(kind, store);
        self
    }

    pub fn lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> ProductCatalog {
        ProductCatalog {
            stores: self.stores,
            lookup_timeout: self.lookup_timeout.unwrap_or(Duration::from_secs(5)),
        }
    }
}

impl ProductCatalog {
    pub fn builder() -> CatalogBuilder { CatalogBuilder::default() }

    /// Bound kinds in fan-out order.
    pub fn kinds(&self) -> impl Iterator<Item = ProductKind> + '_ { self.stores.keys().copied() }

    pub fn store(&self, kind: ProductKind) -> Option<&Arc<dyn ProductStore>> { self.stores.get(&kind) }

    pub fn lookup_timeout(&self) -> Duration { self.lookup_timeout }

    /// Parses a caller-supplied type tag and checks a store is bound for it.
    pub fn resolve_kind(&self, product_type: &str) -> Result<ProductKind> {
        product_type
            .parse::<ProductKind>()
            .ok()
            .filter(|kind| self.stores.contains_key(kind))
            .ok_or_else(|| EngineError::UnsupportedProductType(product_type.to_string()))
    }

    fn bound(&self, kind: ProductKind) -> Result<&Arc<dyn ProductStore>> {
        self.stores.get(&kind).ok_or_else(|| EngineError::UnsupportedProductType(kind.to_string()))
    }

    /// `get(product_type, product_id)` as seen by callers holding raw tags.
    pub async fn get(&self, product_type: &str, product_id: &str) -> Result<Product> {
        let kind = self.resolve_kind(product_type)?;
        self.lookup(kind, product_id).await
    }

    /// Live product state. Fails closed: an unreachable store is an error, never "available".
    pub async fn lookup(&self, kind: ProductKind, product_id: &str) -> Result<Product> {
        let store = self.bound(kind)?;
        match tokio::time::timeout(self.lookup_timeout, store.get(product_id)).await {
            Ok(Ok(Some(product))) => Ok(product),
            Ok(Ok(None)) | Ok(Err(StoreError::NotFound(_))) => Err(EngineError::ProductNotFound {
                product_type: kind, product_id: product_id.to_string(),
            }),
            Ok(Err(e)) => {
                warn!(%kind, product_id, error = %e, "product lookup failed");
                Err(e.into())
            }
            Err(_) => Err(EngineError::Timeout(format!("{kind} lookup"))),
        }
    }

    pub async fn reserve(&self, kind: ProductKind, product_id: &str, qty: Quantity) -> Result<u32> {
        let store = self.bound(kind)?;
        match tokio::time::timeout(self.lookup_timeout, store.decrement_stock(product_id, qty)).await {
            Ok(Ok(remaining)) => {
                debug!(%kind, product_id, quantity = qty.value(), remaining, "stock reserved");
                Ok(remaining)
            }
            Ok(Err(StoreError::InsufficientStock { available })) => Err(EngineError::InsufficientStock {
                product_type: kind, product_id: product_id.to_string(), requested: qty.value(), available,
            }),
            Ok(Err(StoreError::NotFound(_))) => Err(EngineError::ProductNotFound {
                product_type: kind, product_id: product_id.to_string(),
            }),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(EngineError::Timeout(format!("{kind} stock decrement"))),
        }
    }

    pub async fn release(&self, kind: ProductKind, product_id: &str, qty: Quantity) -> Result<u32> {
        let store = self.bound(kind)?;
        match tokio::time::timeout(self.lookup_timeout, store.restock(product_id, qty)).await {
            Ok(Ok(stock)) => Ok(stock),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(EngineError::Timeout(format!("{kind} restock"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::fixtures::*;
    use rust_decimal_macros::dec;

    fn catalog() -> ProductCatalog {
        let books = InMemoryProductStore::with_products(ProductKind::Book, [book("B1", "Dune", dec!(10), 4)]).unwrap();
        ProductCatalog::builder().bind(ProductKind::Book, Arc::new(books)).build()
    }

    #[test]
    fn test_filter_price_and_stock_gates() {
        let p = mobile("m1", "iPhone", dec!(600), 0);
        let mut f = ProductFilter { term: "iphone".into(), ..Default::default() };
        assert!(f.matches(&p));
        f.min_price = Some(dec!(700));
        assert!(!f.matches(&p));
        f.min_price = Some(dec!(600));
        f.max_price = Some(dec!(600));
        assert!(f.matches(&p));
        f.in_stock_only = true;
        assert!(!f.matches(&p));
    }

    #[tokio::test]
    async fn test_get_resolves_bound_kinds_only() {
        let catalog = catalog();
        assert_eq!(catalog.get("book", "B1").await.unwrap().stock(), 4);
        assert!(matches!(catalog.get("mobile", "B1").await, Err(EngineError::UnsupportedProductType(t)) if t == "mobile"));
        assert!(matches!(catalog.get("vinyl", "B1").await, Err(EngineError::UnsupportedProductType(_))));
        assert!(matches!(catalog.get("book", "nope").await, Err(EngineError::ProductNotFound { .. })));
    }

    #[tokio::test]
    async fn test_reserve_maps_insufficient_stock() {
        let catalog = catalog();
        let err = catalog.reserve(ProductKind::Book, "B1", Quantity::requested(5).unwrap()).await.unwrap_err();
        assert!(matches!(err, EngineError::InsufficientStock { available: 4, requested: 5, .. }));
        assert_eq!(catalog.reserve(ProductKind::Book, "B1", Quantity::requested(3).unwrap()).await.unwrap(), 1);
        assert_eq!(catalog.release(ProductKind::Book, "B1", Quantity::requested(3).unwrap()).await.unwrap(), 4);
    }
}
