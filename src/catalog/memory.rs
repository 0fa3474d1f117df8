//! In-memory variant stores

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::{ProductCatalog, ProductFilter, ProductStore};
use crate::domain::aggregates::{Product, ProductError, ProductKind};
use crate::domain::value_objects::{Price, Quantity};
use crate::store::{StoreError, StoreResult};

/// One variant's collection, kept newest first.
pub struct InMemoryProductStore {
    kind: ProductKind,
    products: RwLock<Vec<Product>>,
}

impl InMemoryProductStore {
    pub fn new(kind: ProductKind) -> Self {
        InMemoryProductStore { kind, products: RwLock::new(Vec::new()) }
    }

    pub fn with_products(kind: ProductKind, products: impl IntoIterator<Item = Product>) -> StoreResult<Self> {
        let store = Self::new(kind);
        for product in products {
            store.insert(product)?;
        }
        Ok(store)
    }

    /// Inserts or replaces by id.
    pub fn insert(&self, product: Product) -> StoreResult<()> {
        if product.kind() != self.kind {
            return Err(StoreError::InvalidRecord(format!(
                "{} product {} does not belong in the {} store", product.kind(), product.id(), self.kind
            )));
        }
        let mut products = self.products.write().map_err(|_| StoreError::LockPoisoned("insert"))?;
        products.retain(|p| p.id() != product.id());
        products.push(product);
        products.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(())
    }

    /// Catalog-side price change; carts keep their snapshot.
    pub fn reprice(&self, id: &str, price: Price) -> StoreResult<()> {
        let mut products = self.products.write().map_err(|_| StoreError::LockPoisoned("reprice"))?;
        let product = products.iter_mut().find(|p| p.id() == id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        product.set_price(price);
        Ok(())
    }

    pub fn len(&self) -> usize { self.products.read().map(|p| p.len()).unwrap_or(0) }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    fn kind(&self) -> ProductKind { self.kind }

    async fn get(&self, id: &str) -> StoreResult<Option<Product>> {
        let products = self.products.read().map_err(|_| StoreError::LockPoisoned("get"))?;
        Ok(products.iter().find(|p| p.id() == id).cloned())
    }

    async fn search(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let products = self.products.read().map_err(|_| StoreError::LockPoisoned("search"))?;
        Ok(products.iter().filter(|p| filter.matches(p)).cloned().collect())
    }

    async fn suggest(&self, partial: &str, limit: usize) -> StoreResult<Vec<String>> {
        let products = self.products.read().map_err(|_| StoreError::LockPoisoned("suggest"))?;
        Ok(products
            .iter()
            .filter(|p| p.matches_suggestion(partial))
            .take(limit)
            .map(|p| p.name().to_string())
            .collect())
    }

    async fn decrement_stock(&self, id: &str, qty: Quantity) -> StoreResult<u32> {
        let mut products = self.products.write().map_err(|_| StoreError::LockPoisoned("decrement"))?;
        let product = products.iter_mut().find(|p| p.id() == id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        product.take_stock(qty).map_err(|e| match e {
            ProductError::InsufficientStock { available } => StoreError::InsufficientStock { available },
        })
    }

    async fn restock(&self, id: &str, qty: Quantity) -> StoreResult<u32> {
        let mut products = self.products.write().map_err(|_| StoreError::LockPoisoned("restock"))?;
        let product = products.iter_mut().find(|p| p.id() == id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(product.return_stock(qty))
    }
}

/// Builds a catalog with an in-memory store bound for every variant.
pub fn in_memory_catalog(products: impl IntoIterator<Item = Product>, lookup_timeout: Duration) -> StoreResult<ProductCatalog> {
    let mut by_kind: BTreeMap<ProductKind, Vec<Product>> = ProductKind::ALL.iter().map(|k| (*k, Vec::new())).collect();
    for product in products {
        by_kind.entry(product.kind()).or_default().push(product);
    }
    let mut builder = ProductCatalog::builder().lookup_timeout(lookup_timeout);
    for (kind, products) in by_kind {
        builder = builder.bind(kind, Arc::new(InMemoryProductStore::with_products(kind, products)?));
    }
    Ok(builder.build())
}

/// Reads a JSON array of tagged products.
pub async fn load_seed(path: impl AsRef<Path>) -> StoreResult<Vec<Product>> {
    let raw = tokio::fs::read(path.as_ref())
        .await
        .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.as_ref().display())))?;
    serde_json::from_slice(&raw).map_err(|e| StoreError::InvalidRecord(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::fixtures::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rejects_foreign_kind() {
        let store = InMemoryProductStore::new(ProductKind::Book);
        assert!(matches!(store.insert(mobile("m1", "X", dec!(1), 1)), Err(StoreError::InvalidRecord(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_insert_replaces_by_id() {
        let store = InMemoryProductStore::new(ProductKind::Book);
        store.insert(book("b1", "First", dec!(1), 1)).unwrap();
        store.insert(book("b1", "Second", dec!(1), 1)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("b1").await.unwrap().unwrap().name(), "Second");
    }

    #[tokio::test]
    async fn test_suggest_limits_and_matches_brand() {
        let store = InMemoryProductStore::with_products(
            ProductKind::Shoes,
            (0..8).map(|i| shoes(&format!("s{i}"), &format!("Runner {i}"), dec!(50), 1)),
        ).unwrap();
        assert_eq!(store.suggest("nike", 5).await.unwrap().len(), 5);
        assert!(store.suggest("adidas", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decrement_never_goes_negative() {
        let store = InMemoryProductStore::with_products(ProductKind::Book, [book("b1", "T", dec!(5), 2)]).unwrap();
        let two = Quantity::requested(2).unwrap();
        assert_eq!(store.decrement_stock("b1", two).await.unwrap(), 0);
        assert!(matches!(store.decrement_stock("b1", two).await, Err(StoreError::InsufficientStock { available: 0 })));
        assert!(matches!(store.decrement_stock("zz", two).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_in_memory_catalog_binds_every_kind() {
        let catalog = in_memory_catalog([book("b1", "T", dec!(5), 2)], Duration::from_secs(1)).unwrap();
        assert_eq!(catalog.kinds().collect::<Vec<_>>(), ProductKind::ALL.to_vec());
    }
}
