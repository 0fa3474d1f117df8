//! Popularity counters and search history

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::aggregates::product::contains_ci;
use crate::domain::aggregates::{PopularSearch, SearchHistory};
use crate::domain::value_objects::CustomerId;
use crate::store::{StoreError, StoreResult};

#[async_trait]
pub trait SearchLedger: Send + Sync {
    /// Increment-or-insert in one atomic step.
    async fn record_search(&self, query: &str, at: DateTime<Utc>) -> StoreResult<PopularSearch>;

    /// Most searched first.
    async fn popular(&self, limit: usize) -> StoreResult<Vec<PopularSearch>>;

    /// Stored queries containing `partial`, case-insensitively, most searched first.
    async fn matching(&self, partial: &str, limit: usize) -> StoreResult<Vec<String>>;

    async fn append_history(&self, entry: SearchHistory) -> StoreResult<()>;

    /// Newest first.
    async fn history(&self, user: &CustomerId, limit: usize) -> StoreResult<Vec<SearchHistory>>;
}

fn by_popularity(a: &PopularSearch, b: &PopularSearch) -> std::cmp::Ordering {
    b.count.cmp(&a.count).then_with(|| a.query.cmp(&b.query))
}

#[derive(Default)]
pub struct InMemorySearchLedger {
    popular: Mutex<HashMap<String, PopularSearch>>,
    history: Mutex<Vec<SearchHistory>>,
}

impl InMemorySearchLedger {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl SearchLedger for InMemorySearchLedger {
    async fn record_search(&self, query: &str, at: DateTime<Utc>) -> StoreResult<PopularSearch> {
        let mut popular = self.popular.lock().map_err(|_| StoreError::LockPoisoned("record_search"))?;
        let entry = popular
            .entry(query.to_string())
            .and_modify(|p| p.bump(at))
            .or_insert_with(|| PopularSearch::first(query, at));
        Ok(entry.clone())
    }

    async fn popular(&self, limit: usize) -> StoreResult<Vec<PopularSearch>> {
        let popular = self.popular.lock().map_err(|_| StoreError::LockPoisoned("popular"))?;
        let mut all: Vec<PopularSearch> = popular.values().cloned().collect();
        all.sort_by(by_popularity);
        all.truncate(limit);
        Ok(all)
    }

    async fn matching(&self, partial: &str, limit: usize) -> StoreResult<Vec<String>> {
        let needle = partial.to_lowercase();
        let popular = self.popular.lock().map_err(|_| StoreError::LockPoisoned("matching"))?;
        let mut hits: Vec<&PopularSearch> = popular.values().filter(|p| contains_ci(&p.query, &needle)).collect();
        hits.sort_by(|a, b| by_popularity(a, b));
        Ok(hits.into_iter().take(limit).map(|p| p.query.clone()).collect())
    }

    async fn append_history(&self, entry: SearchHistory) -> StoreResult<()> {
        self.history.lock().map_err(|_| StoreError::LockPoisoned("append_history"))?.push(entry);
        Ok(())
    }

    async fn history(&self, user: &CustomerId, limit: usize) -> StoreResult<Vec<SearchHistory>> {
        let history = self.history.lock().map_err(|_| StoreError::LockPoisoned("history"))?;
        Ok(history.iter().rev().filter(|h| h.user.as_ref() == Some(user)).take(limit).cloned().collect())
    }
}
