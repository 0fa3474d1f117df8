//! Cart persistence
//!
//! Writes are version-checked: a save only lands if the stored cart still has
//! the version the caller loaded, which serialises mutations per cart.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::aggregates::Cart;
use crate::domain::value_objects::CustomerId;
use crate::store::{StoreError, StoreResult};

#[async_trait]
pub trait CartStore: Send + Sync {
    /// The customer's active cart, created in the same step if none exists.
    async fn active_for(&self, customer: &CustomerId) -> StoreResult<Cart>;

    async fn load(&self, id: Uuid) -> StoreResult<Option<Cart>>;

    /// Every cart the customer owns, oldest first.
    async fn carts_for(&self, customer: &CustomerId) -> StoreResult<Vec<Cart>>;

    /// Persists `cart` if its version is current and returns the new version.
    async fn save(&self, cart: &Cart) -> StoreResult<u64>;

    /// Saves the checked-out cart and inserts its successor as one unit.
    async fn roll_over(&self, closed: &Cart, next: &Cart) -> StoreResult<u64>;
}

#[derive(Default)]
pub struct InMemoryCartStore {
    carts: Mutex<HashMap<Uuid, Cart>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self { Self::default() }
}

fn check_version(stored: &Cart, incoming: &Cart) -> StoreResult<()> {
    if stored.version() != incoming.version() {
        return Err(StoreError::ConcurrentWrite { id: incoming.id(), expected: incoming.version(), actual: stored.version() });
    }
    Ok(())
}

fn stamped(cart: &Cart, version: u64) -> Cart {
    let mut stored = cart.clone();
    stored.take_events();
    stored.mark_saved(version);
    stored
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn active_for(&self, customer: &CustomerId) -> StoreResult<Cart> {
        let mut carts = self.carts.lock().map_err(|_| StoreError::LockPoisoned("active_for"))?;
        if let Some(cart) = carts.values().find(|c| c.customer_id() == customer && c.is_active()) {
            return Ok(cart.clone());
        }
        let cart = Cart::open(customer.clone());
        carts.insert(cart.id(), cart.clone());
        Ok(cart)
    }

    async fn load(&self, id: Uuid) -> StoreResult<Option<Cart>> {
        let carts = self.carts.lock().map_err(|_| StoreError::LockPoisoned("load"))?;
        Ok(carts.get(&id).cloned())
    }

    async fn carts_for(&self, customer: &CustomerId) -> StoreResult<Vec<Cart>> {
        let carts = self.carts.lock().map_err(|_| StoreError::LockPoisoned("carts_for"))?;
        let mut owned: Vec<Cart> = carts.values().filter(|c| c.customer_id() == customer).cloned().collect();
        owned.sort_by_key(|c| (c.created_at(), c.id()));
        Ok(owned)
    }

    async fn save(&self, cart: &Cart) -> StoreResult<u64> {
        let mut carts = self.carts.lock().map_err(|_| StoreError::LockPoisoned("save"))?;
        let stored = carts.get(&cart.id()).ok_or_else(|| StoreError::NotFound(cart.id().to_string()))?;
        check_version(stored, cart)?;
        let version = cart.version() + 1;
        carts.insert(cart.id(), stamped(cart, version));
        Ok(version)
    }

    async fn roll_over(&self, closed: &Cart, next: &Cart) -> StoreResult<u64> {
        let mut carts = self.carts.lock().map_err(|_| StoreError::LockPoisoned("roll_over"))?;
        let stored = carts.get(&closed.id()).ok_or_else(|| StoreError::NotFound(closed.id().to_string()))?;
        check_version(stored, closed)?;
        if next.is_active() && carts.values().any(|c| c.id() != closed.id() && c.customer_id() == next.customer_id() && c.is_active()) {
            return Err(StoreError::InvalidRecord(format!("customer {} already has an active cart", next.customer_id())));
        }
        let version = closed.version() + 1;
        carts.insert(closed.id(), stamped(closed, version));
        carts.insert(next.id(), stamped(next, next.version()));
        Ok(version)
    }
}
