//! Aggregated Search Index
//!
//! Fans a query out to every bound variant store, merges the per-variant
//! results into [`SearchResult`]s and applies the requested ordering. Each
//! variant runs under its own deadline; a slow or failing variant contributes
//! an empty set instead of failing the search.

use chrono::Utc;
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::catalog::{ProductCatalog, ProductFilter};
use crate::config::EngineConfig;
use crate::domain::aggregates::{AppliedFilters, PopularSearch, ProductKind, SearchHistory, SearchResult};
use crate::domain::value_objects::{CustomerId, SortPolicy};
use crate::{EngineError, Result};

pub mod ledger;

pub use ledger::{InMemorySearchLedger, SearchLedger};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchQuery {
    pub term: String,
    /// `None` searches every variant.
    pub kind: Option<ProductKind>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort_by: SortPolicy,
    pub in_stock_only: bool,
    pub user: Option<CustomerId>,
}

impl SearchQuery {
    pub fn new(term: impl Into<String>) -> Self {
        Self { term: term.into(), ..Default::default() }
    }

    fn applied_filters(&self) -> AppliedFilters {
        AppliedFilters {
            kind: self.kind, min_price: self.min_price, max_price: self.max_price,
            sort_by: self.sort_by, in_stock: self.in_stock_only,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    pub total_results: usize,
    pub results: Vec<SearchResult>,
}

pub struct SearchIndex {
    catalog: Arc<ProductCatalog>,
    ledger: Arc<dyn SearchLedger>,
    config: EngineConfig,
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex").field("catalog", &self.catalog).field("config", &self.config).finish()
    }
}

impl SearchIndex {
    pub fn new(catalog: Arc<ProductCatalog>, ledger: Arc<dyn SearchLedger>, config: EngineConfig) -> Self {
        Self { catalog, ledger, config }
    }

    #[instrument(skip(self, query), fields(term = %query.term, kind = ?query.kind, sort = query.sort_by.as_str()))]
    pub async fn search(&self, query: SearchQuery) -> Result<SearchOutcome> {
        let term = query.term.trim().to_string();
        if term.is_empty() {
            return Err(EngineError::InvalidQuery("Search query is required".into()));
        }

        if term.chars().count() >= self.config.popular_min_len {
            self.track_popular(&term).await;
        }

        let filter = ProductFilter {
            term: term.clone(), min_price: query.min_price, max_price: query.max_price, in_stock_only: query.in_stock_only,
        };
        let kinds: Vec<ProductKind> = self.catalog.kinds().filter(|k| query.kind.map_or(true, |only| only == *k)).collect();
        let per_variant = join_all(kinds.iter().map(|kind| self.search_variant(*kind, &filter))).await;

        let mut results: Vec<SearchResult> = per_variant.into_iter().flatten().collect();
        match query.sort_by {
            SortPolicy::Relevance => {}
            SortPolicy::PriceAsc => results.sort_by(|a, b| a.price.cmp(&b.price)),
            SortPolicy::PriceDesc => results.sort_by(|a, b| b.price.cmp(&a.price)),
        }

        self.log_history(SearchHistory::record(query.user.clone(), term.clone(), query.applied_filters(), results.len()));
        debug!(results = results.len(), "search complete");

        Ok(SearchOutcome { query: term, total_results: results.len(), results })
    }

    async fn search_variant(&self, kind: ProductKind, filter: &ProductFilter) -> Vec<SearchResult> {
        let Some(store) = self.catalog.store(kind) else { return Vec::new() };
        match tokio::time::timeout(self.config.variant_timeout, store.search(filter)).await {
            Ok(Ok(products)) => products.iter().map(|p| p.to_search_result()).collect(),
            Ok(Err(e)) => {
                warn!(%kind, error = %e, "variant search failed, omitting variant");
                Vec::new()
            }
            Err(_) => {
                warn!(%kind, timeout_ms = self.config.variant_timeout.as_millis() as u64, "variant search timed out, omitting variant");
                Vec::new()
            }
        }
    }

    async fn track_popular(&self, term: &str) {
        match tokio::time::timeout(self.config.ledger_timeout, self.ledger.record_search(term, Utc::now())).await {
            Ok(Ok(entry)) => debug!(query = %entry.query, count = entry.count, "popular search recorded"),
            Ok(Err(e)) => warn!(error = %e, "failed to record popular search"),
            Err(_) => warn!("recording popular search timed out"),
        }
    }

    /// Fire-and-forget; a failed append never reaches the caller.
    fn log_history(&self, entry: SearchHistory) {
        let ledger = self.ledger.clone();
        let limit = self.config.ledger_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(limit, ledger.append_history(entry)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "failed to append search history"),
                Err(_) => warn!("appending search history timed out"),
            }
        });
    }

    /// Alphabetical, de-duplicated typeahead drawn from product names and past searches.
    #[instrument(skip(self))]
    pub async fn suggestions(&self, partial: &str) -> Result<Vec<String>> {
        let partial = partial.trim();
        if partial.chars().count() < self.config.suggestion_min_len {
            return Err(EngineError::InvalidQuery(format!(
                "Suggestions need at least {} characters", self.config.suggestion_min_len
            )));
        }

        let per_source = self.config.suggestions_per_source;
        let from_products = join_all(self.catalog.kinds().map(|kind| async move {
            let Some(store) = self.catalog.store(kind) else { return Vec::new() };
            match tokio::time::timeout(self.config.variant_timeout, store.suggest(partial, per_source)).await {
                Ok(Ok(names)) => names,
                Ok(Err(e)) => {
                    warn!(%kind, error = %e, "variant suggestions failed");
                    Vec::new()
                }
                Err(_) => {
                    warn!(%kind, "variant suggestions timed out");
                    Vec::new()
                }
            }
        }));
        let from_ledger = async {
            match tokio::time::timeout(self.config.ledger_timeout, self.ledger.matching(partial, per_source)).await {
                Ok(Ok(queries)) => queries,
                Ok(Err(e)) => {
                    warn!(error = %e, "popular search suggestions failed");
                    Vec::new()
                }
                Err(_) => Vec::new(),
            }
        };
        let (products, popular) = futures::join!(from_products, from_ledger);

        let unique: BTreeSet<String> = products.into_iter().flatten().chain(popular).collect();
        Ok(unique.into_iter().take(self.config.suggestion_cap).collect())
    }

    pub async fn popular(&self, limit: Option<usize>) -> Result<Vec<PopularSearch>> {
        let limit = limit.unwrap_or(self.config.popular_limit);
        Ok(self.ledger.popular(limit).await?)
    }

    pub async fn history(&self, user: &CustomerId, limit: Option<usize>) -> Result<Vec<SearchHistory>> {
        let limit = limit.unwrap_or(self.config.history_limit);
        Ok(self.ledger.history(user, limit).await?)
    }
}
