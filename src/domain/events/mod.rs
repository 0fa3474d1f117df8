//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::ProductKind;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Cart(CartEvent),
    Stock(StockEvent),
}

impl DomainEvent {
    /// Subject suffix used when publishing.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Cart(CartEvent::CheckedOut { .. }) => "cart.checked_out",
            Self::Stock(StockEvent::Reserved { .. }) => "stock.reserved",
            Self::Stock(StockEvent::Released { .. }) => "stock.released",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CartEvent {
    CheckedOut { cart_id: Uuid, customer_id: String, total: Decimal, item_count: u64 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StockEvent {
    Reserved { product_type: ProductKind, product_id: String, quantity: u32, remaining: u32 },
    Released { product_type: ProductKind, product_id: String, quantity: u32 },
}
