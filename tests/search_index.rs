mod common;

use async_trait::async_trait;
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use storefront_engine::catalog::{InMemoryProductStore, ProductFilter, ProductStore};
use chrono::{DateTime, Utc};
use storefront_engine::domain::aggregates::{PopularSearch, Product, ProductKind, SearchHistory};
use storefront_engine::domain::value_objects::{CustomerId, Quantity, SortPolicy};
use storefront_engine::search::{InMemorySearchLedger, SearchIndex, SearchLedger, SearchQuery};
use storefront_engine::store::{StoreError, StoreResult};
use storefront_engine::{EngineConfig, EngineError, ProductCatalog};

fn prices(results: &[storefront_engine::domain::aggregates::SearchResult]) -> Vec<Decimal> {
    results.iter().map(|r| r.price.amount()).collect()
}

#[tokio::test]
async fn test_iphone_price_window_ascending() {
    let e = engine(vec![
        mobile("m1", "iPhone 15 Pro Max", "1500.00", 3),
        mobile("m2", "iPhone 14", "600.00", 3),
        mobile("m3", "iPhone 15", "900.00", 3),
        book("b1", "The iPhone Book", "20.00", 3),
    ]);
    let query = SearchQuery {
        kind: Some(ProductKind::Mobile),
        min_price: Some(dec!(500)),
        max_price: Some(dec!(1000)),
        sort_by: SortPolicy::PriceAsc,
        ..SearchQuery::new("iphone")
    };
    let out = e.search.search(query).await.unwrap();
    assert_eq!(out.total_results, 2);
    assert_eq!(prices(&out.results), vec![dec!(600.00), dec!(900.00)]);
}

#[tokio::test]
async fn test_price_sorts_are_monotonic_across_variants() {
    let e = engine(vec![
        book("b1", "Trail Guide", "25.00", 1),
        shoes("s1", "Trail Runner", "140.00", 1),
        clothes("c1", "Trail Jacket", "90.00", 0),
        mobile("m1", "Trail Phone", "25.00", 1),
    ]);
    let asc = e.search.search(SearchQuery { sort_by: SortPolicy::PriceAsc, ..SearchQuery::new("trail") }).await.unwrap();
    assert!(prices(&asc.results).windows(2).all(|w| w[0] <= w[1]));
    // Stable: the book precedes the equally priced phone.
    assert_eq!(asc.results[0].kind, ProductKind::Book);

    let desc = e.search.search(SearchQuery { sort_by: SortPolicy::PriceDesc, ..SearchQuery::new("trail") }).await.unwrap();
    assert!(prices(&desc.results).windows(2).all(|w| w[0] >= w[1]));

    let stocked = e.search.search(SearchQuery { in_stock_only: true, ..SearchQuery::new("trail") }).await.unwrap();
    assert_eq!(stocked.total_results, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_searches_count_exactly() {
    let e = engine(vec![shoes("s1", "Air Max", "130.00", 4)]);
    let runs = (0..3).map(|_| {
        let search = e.search.clone();
        tokio::spawn(async move { search.search(SearchQuery::new("nike")).await })
    });
    for r in join_all(runs).await {
        assert_eq!(r.unwrap().unwrap().total_results, 1);
    }
    let popular = e.search.popular(None).await.unwrap();
    assert_eq!(popular.len(), 1);
    assert_eq!((popular[0].query.as_str(), popular[0].count), ("nike", 3));
}

#[tokio::test]
async fn test_suggestions_merge_products_and_popular_queries() {
    let e = engine(vec![
        shoes("s1", "Pegasus 40", "120.00", 4),
        book("b1", "Pegasus Bridge", "15.00", 2),
    ]);
    e.ledger.record_search("pegasus trail", chrono::Utc::now()).await.unwrap();
    e.ledger.record_search("Pegasus 40", chrono::Utc::now()).await.unwrap();

    let got = e.search.suggestions("peg").await.unwrap();
    assert_eq!(got, vec!["Pegasus 40", "Pegasus Bridge", "pegasus trail"]);
    assert!(matches!(e.search.suggestions("p").await, Err(EngineError::InvalidQuery(_))));
}

#[tokio::test]
async fn test_history_records_filters_and_counts() {
    let e = engine(vec![mobile("m1", "Galaxy S24", "799.00", 2)]);
    let user = CustomerId::new("carol").unwrap();
    let query = SearchQuery { user: Some(user.clone()), min_price: Some(dec!(700)), ..SearchQuery::new("galaxy") };
    e.search.search(query).await.unwrap();

    // History is written off the request path.
    let mut history = Vec::new();
    for _ in 0..50 {
        history = e.search.history(&user, None).await.unwrap();
        if !history.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].results_count, 1);
    assert_eq!(history[0].filters.min_price, Some(dec!(700)));
}

/// Never answers within any sane deadline.
struct StalledStore(ProductKind);

#[async_trait]
impl ProductStore for StalledStore {
    fn kind(&self) -> ProductKind { self.0 }
    async fn get(&self, _id: &str) -> StoreResult<Option<Product>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(None)
    }
    async fn search(&self, _filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }
    async fn suggest(&self, _partial: &str, _limit: usize) -> StoreResult<Vec<String>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }
    async fn decrement_stock(&self, _id: &str, _qty: Quantity) -> StoreResult<u32> {
        Err(StoreError::Unavailable("stalled".into()))
    }
    async fn restock(&self, _id: &str, _qty: Quantity) -> StoreResult<u32> {
        Err(StoreError::Unavailable("stalled".into()))
    }
}

/// Fails every call.
struct BrokenStore(ProductKind);

#[async_trait]
impl ProductStore for BrokenStore {
    fn kind(&self) -> ProductKind { self.0 }
    async fn get(&self, _id: &str) -> StoreResult<Option<Product>> { Err(StoreError::Unavailable("down".into())) }
    async fn search(&self, _filter: &ProductFilter) -> StoreResult<Vec<Product>> { Err(StoreError::Unavailable("down".into())) }
    async fn suggest(&self, _partial: &str, _limit: usize) -> StoreResult<Vec<String>> { Err(StoreError::Unavailable("down".into())) }
    async fn decrement_stock(&self, _id: &str, _qty: Quantity) -> StoreResult<u32> { Err(StoreError::Unavailable("down".into())) }
    async fn restock(&self, _id: &str, _qty: Quantity) -> StoreResult<u32> { Err(StoreError::Unavailable("down".into())) }
}

#[tokio::test]
async fn test_slow_and_failing_variants_degrade_to_empty() {
    let books = InMemoryProductStore::with_products(ProductKind::Book, [book("b1", "Running Man", "12.00", 1)]).unwrap();
    let catalog = Arc::new(
        ProductCatalog::builder()
            .bind(ProductKind::Book, Arc::new(books))
            .bind(ProductKind::Mobile, Arc::new(StalledStore(ProductKind::Mobile)))
            .bind(ProductKind::Shoes, Arc::new(BrokenStore(ProductKind::Shoes)))
            .lookup_timeout(Duration::from_millis(50))
            .build(),
    );
    let config = EngineConfig { variant_timeout: Duration::from_millis(50), ..EngineConfig::default() };
    let search = SearchIndex::new(catalog.clone(), Arc::new(InMemorySearchLedger::new()), config);

    let out = search.search(SearchQuery::new("running")).await.unwrap();
    assert_eq!(out.total_results, 1);
    assert_eq!(out.results[0].kind, ProductKind::Book);
    assert_eq!(search.suggestions("run").await.unwrap(), vec!["Running Man", "running"]);

    // Critical lookups fail closed instead.
    assert!(matches!(catalog.lookup(ProductKind::Mobile, "m1").await, Err(EngineError::Timeout(_))));
    assert!(matches!(catalog.lookup(ProductKind::Shoes, "s1").await, Err(EngineError::Store(_))));
}

/// Ledger whose backing database is down.
struct FailingLedger;

#[async_trait]
impl SearchLedger for FailingLedger {
    async fn record_search(&self, _query: &str, _at: DateTime<Utc>) -> StoreResult<PopularSearch> { Err(StoreError::Unavailable("down".into())) }
    async fn popular(&self, _limit: usize) -> StoreResult<Vec<PopularSearch>> { Err(StoreError::Unavailable("down".into())) }
    async fn matching(&self, _partial: &str, _limit: usize) -> StoreResult<Vec<String>> { Err(StoreError::Unavailable("down".into())) }
    async fn append_history(&self, _entry: SearchHistory) -> StoreResult<()> { Err(StoreError::Unavailable("down".into())) }
    async fn history(&self, _user: &CustomerId, _limit: usize) -> StoreResult<Vec<SearchHistory>> { Err(StoreError::Unavailable("down".into())) }
}

#[tokio::test]
async fn test_ledger_outage_does_not_fail_searches() {
    let catalog = catalog(vec![book("b1", "Dune", "10.00", 3), book("b2", "Emma", "8.00", 1)]);
    let search = SearchIndex::new(catalog, Arc::new(FailingLedger), EngineConfig::default());

    let query = SearchQuery { user: CustomerId::new("carol"), ..SearchQuery::new("dune") };
    let out = search.search(query).await.unwrap();
    assert_eq!(out.total_results, 1);
    assert_eq!(out.results[0].id, "b1");
    assert_eq!(search.suggestions("du").await.unwrap(), vec!["Dune"]);

    // Reads of the ledger itself still report the outage.
    assert!(matches!(search.popular(None).await, Err(EngineError::Store(_))));
}
