//! Postgres-backed cart store and search ledger
//!
//! Schema lives in `migrations/`. The single-active-cart rule is enforced by
//! a partial unique index on `carts(customer_id) WHERE is_active`, and cart
//! writes are guarded by the `version` column.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, Row, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use crate::cart::CartStore;
use crate::domain::aggregates::{AppliedFilters, Cart, CartItem, CartRecord, PopularSearch, ProductKind, SearchHistory};
use crate::domain::value_objects::{CustomerId, Price, Quantity};
use crate::search::SearchLedger;
use crate::store::{StoreError, StoreResult};

const CART_COLUMNS: &str = "id, customer_id, is_active, version, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, cart_id, product_type, product_id, product_name, quantity, price, added_at, updated_at";

const UNIQUE_VIOLATION: &str = "23505";

fn decode_err(col: &str, msg: impl Into<String>) -> sqlx::Error {
    let msg: String = msg.into();
    sqlx::Error::ColumnDecode { index: col.to_string(), source: msg.into() }
}

fn version_to_db(version: u64) -> StoreResult<i64> {
    i64::try_from(version).map_err(|_| StoreError::InvalidRecord(format!("version {version} out of range")))
}

fn version_from_db(version: i64) -> StoreResult<u64> {
    u64::try_from(version).map_err(|_| StoreError::InvalidRecord(format!("negative version {version}")))
}

fn cart_record(row: &PgRow) -> sqlx::Result<CartRecord> {
    let customer: String = row.try_get("customer_id")?;
    let version: i64 = row.try_get("version")?;
    Ok(CartRecord {
        id: row.try_get("id")?,
        customer_id: CustomerId::new(customer).ok_or_else(|| decode_err("customer_id", "empty customer id"))?,
        is_active: row.try_get("is_active")?,
        version: u64::try_from(version).map_err(|e| decode_err("version", e.to_string()))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        items: Vec::new(),
    })
}

fn cart_item(row: &PgRow) -> sqlx::Result<CartItem> {
    let kind: String = row.try_get("product_type")?;
    let quantity: i32 = row.try_get("quantity")?;
    let price: Decimal = row.try_get("price")?;
    Ok(CartItem {
        id: row.try_get("id")?,
        product_type: kind.parse::<ProductKind>().map_err(|e| decode_err("product_type", e.to_string()))?,
        product_id: row.try_get("product_id")?,
        product_name: row.try_get("product_name")?,
        quantity: Quantity::requested(i64::from(quantity)).ok_or_else(|| decode_err("quantity", "non-positive quantity"))?,
        price: Price::new(price).map_err(|_| decode_err("price", "negative price"))?,
        added_at: row.try_get("added_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Clone, Debug)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    async fn assemble(&self, rows: Vec<PgRow>) -> StoreResult<Vec<Cart>> {
        let mut records = rows.iter().map(cart_record).collect::<sqlx::Result<Vec<_>>>()?;
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let item_rows = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM cart_items WHERE cart_id = ANY($1) ORDER BY added_at, id"))
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

        let mut by_cart: HashMap<Uuid, Vec<CartItem>> = HashMap::new();
        for row in &item_rows {
            let cart_id: Uuid = row.try_get("cart_id")?;
            by_cart.entry(cart_id).or_default().push(cart_item(row)?);
        }
        for record in &mut records {
            record.items = by_cart.remove(&record.id).unwrap_or_default();
        }
        Ok(records.into_iter().map(Cart::restore).collect())
    }

    /// Version-checked header update plus item rewrite, inside `tx`.
    async fn write(tx: &mut Transaction<'_, Postgres>, cart: &Cart) -> StoreResult<u64> {
        let expected = version_to_db(cart.version())?;
        let updated: Option<i64> = sqlx::query_scalar(
            "UPDATE carts SET version = version + 1, is_active = $3, updated_at = $4 \
             WHERE id = $1 AND version = $2 RETURNING version",
        )
        .bind(cart.id())
        .bind(expected)
        .bind(cart.is_active())
        .bind(cart.updated_at())
        .fetch_optional(&mut **tx)
        .await?;

        let Some(version) = updated else {
            let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM carts WHERE id = $1")
                .bind(cart.id())
                .fetch_optional(&mut **tx)
                .await?;
            return match actual {
                Some(actual) => Err(StoreError::ConcurrentWrite { id: cart.id(), expected: cart.version(), actual: version_from_db(actual)? }),
                None => Err(StoreError::NotFound(cart.id().to_string())),
            };
        };

        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1").bind(cart.id()).execute(&mut **tx).await?;
        for item in cart.items() {
            Self::insert_item(tx, cart.id(), item).await?;
        }
        version_from_db(version)
    }

    async fn insert_item(tx: &mut Transaction<'_, Postgres>, cart_id: Uuid, item: &CartItem) -> StoreResult<()> {
        let quantity = i32::try_from(item.quantity.value())
            .map_err(|_| StoreError::InvalidRecord(format!("quantity {} out of range", item.quantity.value())))?;
        sqlx::query(&format!("INSERT INTO cart_items ({ITEM_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"))
            .bind(item.id)
            .bind(cart_id)
            .bind(item.product_type.as_str())
            .bind(&item.product_id)
            .bind(&item.product_name)
            .bind(quantity)
            .bind(item.price.amount())
            .bind(item.added_at)
            .bind(item.updated_at)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn active_for(&self, customer: &CustomerId) -> StoreResult<Cart> {
        let fresh = Cart::open(customer.clone());
        sqlx::query(&format!(
            "INSERT INTO carts ({CART_COLUMNS}) VALUES ($1, $2, TRUE, 0, $3, $3) \
             ON CONFLICT (customer_id) WHERE is_active DO NOTHING"
        ))
        .bind(fresh.id())
        .bind(customer.as_str())
        .bind(fresh.created_at())
        .execute(&self.pool)
        .await?;

        let rows = sqlx::query(&format!("SELECT {CART_COLUMNS} FROM carts WHERE customer_id = $1 AND is_active"))
            .bind(customer.as_str())
            .fetch_all(&self.pool)
            .await?;
        self.assemble(rows)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("active cart for {customer}")))
    }

    async fn load(&self, id: Uuid) -> StoreResult<Option<Cart>> {
        let rows = sqlx::query(&format!("SELECT {CART_COLUMNS} FROM carts WHERE id = $1"))
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        Ok(self.assemble(rows).await?.into_iter().next())
    }

    async fn carts_for(&self, customer: &CustomerId) -> StoreResult<Vec<Cart>> {
        let rows = sqlx::query(&format!("SELECT {CART_COLUMNS} FROM carts WHERE customer_id = $1 ORDER BY created_at, id"))
            .bind(customer.as_str())
            .fetch_all(&self.pool)
            .await?;
        self.assemble(rows).await
    }

    async fn save(&self, cart: &Cart) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;
        let version = Self::write(&mut tx, cart).await?;
        tx.commit().await?;
        Ok(version)
    }

    async fn roll_over(&self, closed: &Cart, next: &Cart) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;
        let version = Self::write(&mut tx, closed).await?;
        let inserted = sqlx::query(&format!("INSERT INTO carts ({CART_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"))
            .bind(next.id())
            .bind(next.customer_id().as_str())
            .bind(next.is_active())
            .bind(version_to_db(next.version())?)
            .bind(next.created_at())
            .bind(next.updated_at())
            .execute(&mut *tx)
            .await;
        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                return Err(StoreError::InvalidRecord(format!("customer {} already has an active cart", next.customer_id())));
            }
            Err(e) => return Err(e.into()),
        }
        for item in next.items() {
            Self::insert_item(&mut tx, next.id(), item).await?;
        }
        tx.commit().await?;
        Ok(version)
    }
}

/// Escapes LIKE metacharacters so user input only ever matches literally.
fn like_pattern(partial: &str) -> String {
    let mut escaped = String::with_capacity(partial.len() + 2);
    escaped.push('%');
    for c in partial.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn popular_search(row: &PgRow) -> sqlx::Result<PopularSearch> {
    let count: i64 = row.try_get("count")?;
    Ok(PopularSearch {
        query: row.try_get("query")?,
        count: u64::try_from(count).map_err(|e| decode_err("count", e.to_string()))?,
        last_searched: row.try_get("last_searched")?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Clone, Debug)]
pub struct PgSearchLedger {
    pool: PgPool,
}

impl PgSearchLedger {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl SearchLedger for PgSearchLedger {
    async fn record_search(&self, query: &str, at: DateTime<Utc>) -> StoreResult<PopularSearch> {
        let row = sqlx::query(
            "INSERT INTO popular_searches (query, count, last_searched, created_at) VALUES ($1, 1, $2, $2) \
             ON CONFLICT (query) DO UPDATE SET count = popular_searches.count + 1, \
             last_searched = GREATEST(popular_searches.last_searched, EXCLUDED.last_searched) \
             RETURNING query, count, last_searched, created_at",
        )
        .bind(query)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;
        Ok(popular_search(&row)?)
    }

    async fn popular(&self, limit: usize) -> StoreResult<Vec<PopularSearch>> {
        let rows = sqlx::query(
            "SELECT query, count, last_searched, created_at FROM popular_searches ORDER BY count DESC, query ASC LIMIT $1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(popular_search).collect::<sqlx::Result<Vec<_>>>()?)
    }

    async fn matching(&self, partial: &str, limit: usize) -> StoreResult<Vec<String>> {
        let queries = sqlx::query_scalar(
            "SELECT query FROM popular_searches WHERE query ILIKE $1 ESCAPE '\\' ORDER BY count DESC, query ASC LIMIT $2",
        )
        .bind(like_pattern(partial))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(queries)
    }

    async fn append_history(&self, entry: SearchHistory) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO search_history (id, user_id, query, filters, results_count, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.id)
        .bind(entry.user.as_ref().map(CustomerId::as_str))
        .bind(&entry.query)
        .bind(Json(&entry.filters))
        .bind(i64::try_from(entry.results_count).unwrap_or(i64::MAX))
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn history(&self, user: &CustomerId, limit: usize) -> StoreResult<Vec<SearchHistory>> {
        let rows = sqlx::query(
            "SELECT id, query, filters, results_count, created_at FROM search_history \
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(user.as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .iter()
            .map(|row| {
                let count: i64 = row.try_get("results_count")?;
                Ok(SearchHistory {
                    id: row.try_get("id")?,
                    user: Some(user.clone()),
                    query: row.try_get("query")?,
                    filters: row.try_get::<Json<AppliedFilters>, _>("filters")?.0,
                    results_count: u64::try_from(count).map_err(|e| decode_err("results_count", e.to_string()))?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect::<sqlx::Result<Vec<_>>>()?;
        Ok(entries)
    }
}
