//! Cart Consistency Manager
//!
//! Every mutation follows the same shape: load the cart, validate against
//! live product state, apply the change to the aggregate, then save with a
//! version check. A save that loses a race is retried from a fresh load, so
//! concurrent calls on one cart behave as if they ran one after another.
//!
//! Checkout crosses into the product stores, which may live elsewhere. Stock
//! is reserved item by item and released again if any later step fails.

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::ProductCatalog;
use crate::config::EngineConfig;
use crate::domain::aggregates::{Cart, ProductKind};
use crate::domain::events::{DomainEvent, StockEvent};
use crate::domain::value_objects::{CustomerId, Quantity};
use crate::notify::EventPublisher;
use crate::store::StoreError;
use crate::{EngineError, Result};

pub mod store;

pub use store::{CartStore, InMemoryCartStore};

#[derive(Clone, Debug)]
pub struct Checkout {
    pub old_cart: Cart,
    pub new_cart: Cart,
}

#[derive(Clone, Debug)]
struct Reservation {
    kind: ProductKind,
    product_id: String,
    quantity: Quantity,
    remaining: u32,
}

pub struct CartManager {
    store: Arc<dyn CartStore>,
    catalog: Arc<ProductCatalog>,
    publisher: Arc<dyn EventPublisher>,
    config: EngineConfig,
}

impl std::fmt::Debug for CartManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartManager").field("catalog", &self.catalog).field("config", &self.config).finish()
    }
}

impl CartManager {
    pub fn new(store: Arc<dyn CartStore>, catalog: Arc<ProductCatalog>, publisher: Arc<dyn EventPublisher>, config: EngineConfig) -> Self {
        Self { store, catalog, publisher, config }
    }

    pub async fn get_or_create_active_cart(&self, customer: &CustomerId) -> Result<Cart> {
        Ok(self.store.active_for(customer).await?)
    }

    pub async fn get_cart(&self, customer: &CustomerId, cart_id: Uuid) -> Result<Cart> {
        self.owned(customer, cart_id).await
    }

    pub async fn carts(&self, customer: &CustomerId) -> Result<Vec<Cart>> {
        Ok(self.store.carts_for(customer).await?)
    }

    async fn owned(&self, customer: &CustomerId, cart_id: Uuid) -> Result<Cart> {
        match self.store.load(cart_id).await? {
            Some(cart) if cart.customer_id() == customer => Ok(cart),
            _ => Err(EngineError::CartNotFound(cart_id)),
        }
    }

    /// `Ok(false)` when another writer got there first.
    async fn commit(&self, cart: &mut Cart) -> Result<bool> {
        match self.store.save(cart).await {
            Ok(version) => {
                cart.mark_saved(version);
                Ok(true)
            }
            Err(StoreError::ConcurrentWrite { id, expected, actual }) => {
                debug!(cart_id = %id, expected, actual, "stale cart version");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(customer = %customer))]
    pub async fn add_item(&self, customer: &CustomerId, cart_id: Uuid, product_type: &str, product_id: &str, quantity: i64) -> Result<Cart> {
        for attempt in 1..=self.config.max_cart_retries {
            let mut cart = self.owned(customer, cart_id).await?;
            cart.ensure_active()?;
            let qty = Quantity::requested(quantity).ok_or(EngineError::InvalidQuantity)?;
            let kind = self.catalog.resolve_kind(product_type)?;
            let product = self.catalog.lookup(kind, product_id).await?;

            let available = product.stock();
            let insufficient = |requested: u32| EngineError::InsufficientStock {
                product_type: kind, product_id: product_id.to_string(), requested, available,
            };
            if !qty.fits_within(available) {
                return Err(insufficient(qty.value()));
            }
            if let Some(line) = cart.line_for(kind, product_id) {
                let merged = line.quantity.add(qty).ok_or(EngineError::InvalidQuantity)?;
                if !merged.fits_within(available) {
                    return Err(insufficient(merged.value()));
                }
            }

            cart.add_line(kind, product_id, product.name(), qty, product.price())?;
            if self.commit(&mut cart).await? {
                info!(%cart_id, %kind, product_id, quantity = qty.value(), "item added to cart");
                return Ok(cart);
            }
            debug!(attempt, "retrying add_item");
        }
        Err(EngineError::Conflict(cart_id))
    }

    #[instrument(skip(self), fields(customer = %customer))]
    pub async fn remove_item(&self, customer: &CustomerId, cart_id: Uuid, item_id: Uuid) -> Result<Cart> {
        for attempt in 1..=self.config.max_cart_retries {
            let mut cart = self.owned(customer, cart_id).await?;
            cart.remove_item(item_id)?;
            if self.commit(&mut cart).await? {
                return Ok(cart);
            }
            debug!(attempt, "retrying remove_item");
        }
        Err(EngineError::Conflict(cart_id))
    }

    #[instrument(skip(self), fields(customer = %customer))]
    pub async fn update_quantity(&self, customer: &CustomerId, cart_id: Uuid, item_id: Uuid, quantity: i64) -> Result<Cart> {
        for attempt in 1..=self.config.max_cart_retries {
            let mut cart = self.owned(customer, cart_id).await?;
            cart.ensure_active()?;
            let qty = Quantity::requested(quantity).ok_or(EngineError::InvalidQuantity)?;
            let (kind, product_id) = match cart.item(item_id) {
                Some(item) => (item.product_type, item.product_id.clone()),
                None => return Err(EngineError::ItemNotFound(item_id)),
            };
            let product = self.catalog.lookup(kind, &product_id).await?;
            if !qty.fits_within(product.stock()) {
                return Err(EngineError::InsufficientStock {
                    product_type: kind, product_id, requested: qty.value(), available: product.stock(),
                });
            }

            cart.set_quantity(item_id, qty)?;
            if self.commit(&mut cart).await? {
                return Ok(cart);
            }
            debug!(attempt, "retrying update_quantity");
        }
        Err(EngineError::Conflict(cart_id))
    }

    #[instrument(skip(self), fields(customer = %customer))]
    pub async fn clear(&self, customer: &CustomerId, cart_id: Uuid) -> Result<Cart> {
        for attempt in 1..=self.config.max_cart_retries {
            let mut cart = self.owned(customer, cart_id).await?;
            cart.clear()?;
            if self.commit(&mut cart).await? {
                return Ok(cart);
            }
            debug!(attempt, "retrying clear");
        }
        Err(EngineError::Conflict(cart_id))
    }

    /// Reserves stock for every line, closes the cart and opens its successor.
    #[instrument(skip(self), fields(customer = %customer))]
    pub async fn checkout(&self, customer: &CustomerId, cart_id: Uuid) -> Result<Checkout> {
        for attempt in 1..=self.config.max_cart_retries {
            let mut cart = self.owned(customer, cart_id).await?;
            cart.ensure_active()?;
            if cart.is_empty() {
                return Err(EngineError::EmptyCart);
            }

            for item in cart.items() {
                let product = self.catalog.lookup(item.product_type, &item.product_id).await?;
                if !item.quantity.fits_within(product.stock()) {
                    return Err(EngineError::InsufficientStock {
                        product_type: item.product_type, product_id: item.product_id.clone(),
                        requested: item.quantity.value(), available: product.stock(),
                    });
                }
            }

            let reserved = self.reserve_all(&cart).await?;
            cart.check_out()?;
            let next = Cart::open(customer.clone());

            match self.store.roll_over(&cart, &next).await {
                Ok(version) => {
                    cart.mark_saved(version);
                    let mut events: Vec<DomainEvent> = reserved
                        .iter()
                        .map(|r| DomainEvent::Stock(StockEvent::Reserved {
                            product_type: r.kind, product_id: r.product_id.clone(), quantity: r.quantity.value(), remaining: r.remaining,
                        }))
                        .collect();
                    events.extend(cart.take_events());
                    self.publish(events).await;
                    info!(%cart_id, new_cart_id = %next.id(), total = %cart.total_price(), "checkout complete");
                    return Ok(Checkout { old_cart: cart, new_cart: next });
                }
                Err(StoreError::ConcurrentWrite { .. }) => {
                    self.release_all(&reserved).await;
                    debug!(attempt, "cart changed during checkout, retrying");
                }
                Err(e) => {
                    self.release_all(&reserved).await;
                    return Err(e.into());
                }
            }
        }
        Err(EngineError::Conflict(cart_id))
    }

    /// All-or-nothing: a failed reservation releases the ones taken before it.
    async fn reserve_all(&self, cart: &Cart) -> Result<Vec<Reservation>> {
        let mut reserved = Vec::with_capacity(cart.items().len());
        for item in cart.items() {
            match self.catalog.reserve(item.product_type, &item.product_id, item.quantity).await {
                Ok(remaining) => reserved.push(Reservation {
                    kind: item.product_type, product_id: item.product_id.clone(), quantity: item.quantity, remaining,
                }),
                Err(e) => {
                    warn!(product_type = %item.product_type, product_id = %item.product_id, error = %e, "stock reservation failed, releasing");
                    self.release_all(&reserved).await;
                    return Err(e);
                }
            }
        }
        Ok(reserved)
    }

    async fn release_all(&self, reserved: &[Reservation]) {
        for r in reserved {
            match self.catalog.release(r.kind, &r.product_id, r.quantity).await {
                Ok(_) => {
                    let event = DomainEvent::Stock(StockEvent::Released {
                        product_type: r.kind, product_id: r.product_id.clone(), quantity: r.quantity.value(),
                    });
                    self.publish(vec![event]).await;
                }
                Err(e) => error!(product_type = %r.kind, product_id = %r.product_id, quantity = r.quantity.value(), error = %e, "stock release failed"),
            }
        }
    }

    async fn publish(&self, events: Vec<DomainEvent>) {
        for event in &events {
            if let Err(e) = self.publisher.publish(event).await {
                warn!(subject = event.subject(), error = %e, "event publish failed");
            }
        }
    }
}
