//! Cart handlers

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::cart::Checkout;
use crate::domain::aggregates::{Cart, CartItem, CartStatus};
use crate::http::{ApiError, ApiJson, ApiPath, AppState, Customer};

#[derive(Debug, Serialize)]
pub struct CartView {
    pub id: Uuid,
    pub customer_id: String,
    pub status: CartStatus,
    pub is_active: bool,
    pub items: Vec<CartItem>,
    pub total_price: Decimal,
    pub item_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            id: cart.id(),
            customer_id: cart.customer_id().to_string(),
            status: cart.status(),
            is_active: cart.is_active(),
            items: cart.items().to_vec(),
            total_price: cart.total_price(),
            item_count: cart.item_count(),
            created_at: cart.created_at(),
            updated_at: cart.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutView {
    pub message: &'static str,
    pub old_cart: CartView,
    pub new_cart: CartView,
}

impl From<Checkout> for CheckoutView {
    fn from(c: Checkout) -> Self {
        Self { message: "Checkout successful", old_cart: CartView::from(&c.old_cart), new_cart: CartView::from(&c.new_cart) }
    }
}

fn one() -> i64 { 1 }

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    #[validate(length(min = 1, max = 32))]
    pub product_type: String,
    #[validate(length(min = 1, max = 64))]
    pub product_id: String,
    #[serde(default = "one")]
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct RemoveItemRequest {
    pub item_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub item_id: Uuid,
    #[serde(default = "one")]
    pub quantity: i64,
}

pub async fn list_carts(State(s): State<AppState>, Customer(c): Customer) -> Result<Json<Vec<CartView>>, ApiError> {
    let carts = s.carts.carts(&c).await?;
    Ok(Json(carts.iter().map(CartView::from).collect()))
}

pub async fn active_cart(State(s): State<AppState>, Customer(c): Customer) -> Result<Json<CartView>, ApiError> {
    Ok(Json(CartView::from(&s.carts.get_or_create_active_cart(&c).await?)))
}

pub async fn get_cart(State(s): State<AppState>, Customer(c): Customer, ApiPath(id): ApiPath<Uuid>) -> Result<Json<CartView>, ApiError> {
    Ok(Json(CartView::from(&s.carts.get_cart(&c, id).await?)))
}

pub async fn add_item(State(s): State<AppState>, Customer(c): Customer, ApiPath(id): ApiPath<Uuid>, ApiJson(r): ApiJson<AddItemRequest>) -> Result<Json<CartView>, ApiError> {
    r.validate()?;
    let cart = s.carts.add_item(&c, id, r.product_type.trim(), r.product_id.trim(), r.quantity).await?;
    Ok(Json(CartView::from(&cart)))
}

pub async fn remove_item(State(s): State<AppState>, Customer(c): Customer, ApiPath(id): ApiPath<Uuid>, ApiJson(r): ApiJson<RemoveItemRequest>) -> Result<Json<CartView>, ApiError> {
    Ok(Json(CartView::from(&s.carts.remove_item(&c, id, r.item_id).await?)))
}

pub async fn update_quantity(State(s): State<AppState>, Customer(c): Customer, ApiPath(id): ApiPath<Uuid>, ApiJson(r): ApiJson<UpdateQuantityRequest>) -> Result<Json<CartView>, ApiError> {
    Ok(Json(CartView::from(&s.carts.update_quantity(&c, id, r.item_id, r.quantity).await?)))
}

pub async fn clear(State(s): State<AppState>, Customer(c): Customer, ApiPath(id): ApiPath<Uuid>) -> Result<Json<CartView>, ApiError> {
    Ok(Json(CartView::from(&s.carts.clear(&c, id).await?)))
}

pub async fn checkout(State(s): State<AppState>, Customer(c): Customer, ApiPath(id): ApiPath<Uuid>) -> Result<Json<CheckoutView>, ApiError> {
    Ok(Json(CheckoutView::from(s.carts.checkout(&c, id).await?)))
}
