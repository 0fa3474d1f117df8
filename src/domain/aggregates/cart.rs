//! Cart Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::product::ProductKind;
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::{CustomerId, Price, Quantity};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus { Active, CheckedOut }

#[derive(Clone, Debug)]
pub struct Cart {
    id: Uuid,
    customer_id: CustomerId,
    status: CartStatus,
    items: Vec<CartItem>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

/// A line in a cart. Price and name are snapshots taken when the line was first added.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub product_type: ProductKind,
    pub product_id: String,
    pub product_name: String,
    pub quantity: Quantity,
    pub price: Price,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal { self.price.times(self.quantity) }
    pub fn is_for(&self, kind: ProductKind, product_id: &str) -> bool { self.product_type == kind && self.product_id == product_id }
}

/// Persisted form of a cart, used by stores to rebuild the aggregate.
#[derive(Clone, Debug)]
pub struct CartRecord {
    pub id: Uuid,
    pub customer_id: CustomerId,
    pub is_active: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn open(customer_id: CustomerId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), customer_id, status: CartStatus::Active, items: vec![], version: 0,
            created_at: now, updated_at: now, events: vec![],
        }
    }

    pub fn restore(record: CartRecord) -> Self {
        Self {
            id: record.id, customer_id: record.customer_id,
            status: if record.is_active { CartStatus::Active } else { CartStatus::CheckedOut },
            items: record.items, version: record.version,
            created_at: record.created_at, updated_at: record.updated_at, events: vec![],
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn customer_id(&self) -> &CustomerId { &self.customer_id }
    pub fn status(&self) -> CartStatus { self.status }
    pub fn is_active(&self) -> bool { self.status == CartStatus::Active }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn version(&self) -> u64 { self.version }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn total_price(&self) -> Decimal { self.items.iter().map(CartItem::line_total).sum() }
    pub fn item_count(&self) -> u64 { self.items.iter().map(|i| u64::from(i.quantity.value())).sum() }

    pub fn item(&self, item_id: Uuid) -> Option<&CartItem> { self.items.iter().find(|i| i.id == item_id) }
    pub fn line_for(&self, kind: ProductKind, product_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.is_for(kind, product_id))
    }

    pub fn ensure_active(&self) -> Result<(), CartError> {
        if self.is_active() { Ok(()) } else { Err(CartError::Inactive) }
    }

    /// Merges into an existing line for the same product, or inserts a new one.
    pub fn add_line(&mut self, kind: ProductKind, product_id: &str, product_name: &str, qty: Quantity, price: Price) -> Result<&CartItem, CartError> {
        self.ensure_active()?;
        let now = Utc::now();
        let index = match self.items.iter().position(|i| i.is_for(kind, product_id)) {
            Some(index) => {
                let line = &mut self.items[index];
                line.quantity = line.quantity.add(qty).ok_or(CartError::QuantityOverflow)?;
                line.updated_at = now;
                index
            }
            None => {
                self.items.push(CartItem {
                    id: Uuid::now_v7(), product_type: kind, product_id: product_id.to_string(),
                    product_name: product_name.to_string(), quantity: qty, price, added_at: now, updated_at: now,
                });
                self.items.len() - 1
            }
        };
        self.touch();
        Ok(&self.items[index])
    }

    pub fn set_quantity(&mut self, item_id: Uuid, qty: Quantity) -> Result<(), CartError> {
        self.ensure_active()?;
        let item = self.items.iter_mut().find(|i| i.id == item_id).ok_or(CartError::ItemNotFound(item_id))?;
        item.quantity = qty;
        item.updated_at = Utc::now();
        self.touch();
        Ok(())
    }

    pub fn remove_item(&mut self, item_id: Uuid) -> Result<CartItem, CartError> {
        self.ensure_active()?;
        let index = self.items.iter().position(|i| i.id == item_id).ok_or(CartError::ItemNotFound(item_id))?;
        let removed = self.items.remove(index);
        self.touch();
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<(), CartError> {
        self.ensure_active()?;
        self.items.clear();
        self.touch();
        Ok(())
    }

    /// Terminal transition; the cart accepts no further mutation afterwards.
    pub fn check_out(&mut self) -> Result<(), CartError> {
        self.ensure_active()?;
        if self.items.is_empty() { return Err(CartError::Empty); }
        self.status = CartStatus::CheckedOut;
        self.touch();
        self.raise_event(DomainEvent::Cart(CartEvent::CheckedOut {
            cart_id: self.id, customer_id: self.customer_id.to_string(), total: self.total_price(), item_count: self.item_count(),
        }));
        Ok(())
    }

    pub(crate) fn mark_saved(&mut self, version: u64) { self.version = version; }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { Inactive, Empty, ItemNotFound(Uuid), QuantityOverflow }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inactive => write!(f, "Cannot modify an inactive cart"),
            Self::Empty => write!(f, "Cannot checkout empty cart"),
            Self::ItemNotFound(id) => write!(f, "Item {id} not found in cart"),
            Self::QuantityOverflow => write!(f, "Quantity too large"),
        }
    }
}
