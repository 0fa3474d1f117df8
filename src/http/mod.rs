//! HTTP surface (axum)

use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cart::{CartManager, CartStore};
use crate::catalog::ProductCatalog;
use crate::config::EngineConfig;
use crate::domain::value_objects::CustomerId;
use crate::notify::EventPublisher;
use crate::search::{SearchIndex, SearchLedger};

pub mod carts;
pub mod error;
pub mod search;

pub use error::ApiError;

/// Header carrying the caller's identity, set by the identity service in front of us.
pub const CUSTOMER_HEADER: &str = "x-customer-id";

#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SearchIndex>,
    pub carts: Arc<CartManager>,
}

impl AppState {
    pub fn new(
        catalog: Arc<ProductCatalog>,
        cart_store: Arc<dyn CartStore>,
        ledger: Arc<dyn SearchLedger>,
        publisher: Arc<dyn EventPublisher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            search: Arc::new(SearchIndex::new(catalog.clone(), ledger, config.clone())),
            carts: Arc::new(CartManager::new(cart_store, catalog, publisher, config)),
        }
    }
}

/// Authenticated customer taken from [`CUSTOMER_HEADER`].
#[derive(Clone, Debug)]
pub struct Customer(pub CustomerId);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Customer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(CUSTOMER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(CustomerId::new)
            .map(Customer)
            .ok_or(ApiError::MissingCustomer)
    }
}

/// `Json` whose rejection is an [`ApiError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront-engine"})) }))
        .route("/api/v1/search", get(search::search))
        .route("/api/v1/search/suggestions", get(search::suggestions))
        .route("/api/v1/search/popular", get(search::popular))
        .route("/api/v1/search/history", get(search::history))
        .route("/api/v1/carts", get(carts::list_carts))
        .route("/api/v1/carts/active", get(carts::active_cart))
        .route("/api/v1/carts/:id", get(carts::get_cart))
        .route("/api/v1/carts/:id/add_item", post(carts::add_item))
        .route("/api/v1/carts/:id/remove_item", post(carts::remove_item))
        .route("/api/v1/carts/:id/update_quantity", post(carts::update_quantity))
        .route("/api/v1/carts/:id/clear", post(carts::clear))
        .route("/api/v1/carts/:id/checkout", post(carts::checkout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
