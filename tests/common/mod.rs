#![allow(dead_code)]

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use storefront_engine::cart::{CartManager, InMemoryCartStore};
use storefront_engine::catalog::memory::in_memory_catalog;
use storefront_engine::domain::aggregates::Product;
use storefront_engine::notify::RecordingPublisher;
use storefront_engine::search::{InMemorySearchLedger, SearchIndex};
use storefront_engine::{EngineConfig, ProductCatalog};

fn product(value: serde_json::Value) -> Product {
    serde_json::from_value(value).expect("fixture product")
}

pub fn book(id: &str, title: &str, price: &str, stock: u32) -> Product {
    product(json!({
        "type": "book", "id": id, "price": price, "stock": stock,
        "title": title, "author": "Frank Herbert", "isbn": "9780441013593", "published_date": "1965-08-01"
    }))
}

pub fn mobile(id: &str, name: &str, price: &str, stock: u32) -> Product {
    product(json!({
        "type": "mobile", "id": id, "price": price, "stock": stock,
        "name": name, "brand": "Apple", "model_number": format!("A-{id}"), "screen_size": "6.1",
        "ram": 6, "storage": 128, "processor": "A16 Bionic", "operating_system": "iOS"
    }))
}

pub fn shoes(id: &str, name: &str, price: &str, stock: u32) -> Product {
    product(json!({
        "type": "shoes", "id": id, "price": price, "stock": stock,
        "name": name, "brand": "Nike", "sku": format!("S-{id}"), "category": "Running", "gender": "Unisex"
    }))
}

pub fn clothes(id: &str, name: &str, price: &str, stock: u32) -> Product {
    product(json!({
        "type": "clothes", "id": id, "price": price, "stock": stock,
        "name": name, "brand": "Uniqlo", "sku": format!("C-{id}"), "category": "Outerwear", "gender": "Women"
    }))
}

pub fn catalog(products: Vec<Product>) -> Arc<ProductCatalog> {
    Arc::new(in_memory_catalog(products, Duration::from_secs(1)).expect("catalog"))
}

pub struct Engine {
    pub catalog: Arc<ProductCatalog>,
    pub carts: Arc<CartManager>,
    pub search: Arc<SearchIndex>,
    pub ledger: Arc<InMemorySearchLedger>,
    pub events: Arc<RecordingPublisher>,
}

pub fn engine(products: Vec<Product>) -> Engine {
    let catalog = catalog(products);
    let ledger = Arc::new(InMemorySearchLedger::new());
    let events = Arc::new(RecordingPublisher::default());
    let config = EngineConfig::default();
    Engine {
        carts: Arc::new(CartManager::new(Arc::new(InMemoryCartStore::new()), catalog.clone(), events.clone(), config.clone())),
        search: Arc::new(SearchIndex::new(catalog.clone(), ledger.clone(), config)),
        catalog,
        ledger,
        events,
    }
}
