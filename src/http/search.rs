//! Search handlers

use axum::extract::State;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::aggregates::{PopularSearch, ProductKind, SearchHistory};
use crate::domain::value_objects::SortPolicy;
use crate::http::{ApiError, ApiQuery, AppState, Customer};
use crate::search::{SearchOutcome, SearchQuery};
use crate::EngineError;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub sort_by: Option<String>,
    pub in_stock: Option<String>,
}

fn price_bound(raw: Option<&str>) -> Option<Decimal> {
    raw.and_then(|v| v.trim().parse::<Decimal>().ok())
}

impl SearchParams {
    /// Unparseable price bounds are dropped; an unknown type is rejected.
    pub fn into_query(self, customer: Option<Customer>) -> Result<SearchQuery, EngineError> {
        let kind = match self.kind.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(tag) => Some(tag.parse::<ProductKind>().map_err(|_| EngineError::InvalidQuery(format!("Unknown product type: {tag}")))?),
        };
        Ok(SearchQuery {
            term: self.q.unwrap_or_default(),
            kind,
            min_price: price_bound(self.min_price.as_deref()),
            max_price: price_bound(self.max_price.as_deref()),
            sort_by: self.sort_by.as_deref().map(SortPolicy::parse).unwrap_or_default(),
            in_stock_only: self.in_stock.as_deref().is_some_and(|v| v.eq_ignore_ascii_case("true")),
            user: customer.map(|c| c.0),
        })
    }
}

pub async fn search(State(s): State<AppState>, customer: Option<Customer>, ApiQuery(p): ApiQuery<SearchParams>) -> Result<Json<SearchOutcome>, ApiError> {
    let query = p.into_query(customer)?;
    Ok(Json(s.search.search(query).await?))
}

#[derive(Debug, Deserialize)]
pub struct SuggestionParams {
    pub q: Option<String>,
}

pub async fn suggestions(State(s): State<AppState>, ApiQuery(p): ApiQuery<SuggestionParams>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(s.search.suggestions(p.q.as_deref().unwrap_or_default()).await?))
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

pub async fn popular(State(s): State<AppState>, ApiQuery(p): ApiQuery<LimitParams>) -> Result<Json<Vec<PopularSearch>>, ApiError> {
    Ok(Json(s.search.popular(p.limit).await?))
}

pub async fn history(State(s): State<AppState>, Customer(customer): Customer, ApiQuery(p): ApiQuery<LimitParams>) -> Result<Json<Vec<SearchHistory>>, ApiError> {
    Ok(Json(s.search.history(&customer, p.limit).await?))
}
