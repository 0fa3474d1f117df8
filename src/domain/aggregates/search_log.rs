//! Search popularity and history records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::product::ProductKind;
use crate::domain::value_objects::{CustomerId, SortPolicy};

/// Cumulative counter for one exact query text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PopularSearch {
    pub query: String,
    pub count: u64,
    pub last_searched: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PopularSearch {
    pub fn first(query: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self { query: query.into(), count: 1, last_searched: at, created_at: at }
    }
    pub fn bump(&mut self, at: DateTime<Utc>) {
        self.count += 1;
        if at > self.last_searched { self.last_searched = at; }
    }
}

/// Filters as resolved for one search invocation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AppliedFilters {
    #[serde(rename = "type")]
    pub kind: Option<ProductKind>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort_by: SortPolicy,
    pub in_stock: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHistory {
    pub id: Uuid,
    pub user: Option<CustomerId>,
    pub query: String,
    pub filters: AppliedFilters,
    pub results_count: u64,
    pub created_at: DateTime<Utc>,
}

impl SearchHistory {
    pub fn record(user: Option<CustomerId>, query: impl Into<String>, filters: AppliedFilters, results_count: usize) -> Self {
        Self {
            id: Uuid::now_v7(), user, query: query.into(), filters,
            results_count: results_count as u64, created_at: Utc::now(),
        }
    }
}
