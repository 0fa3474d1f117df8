//! Storage backends shared by the catalog, cart and search components

use thiserror::Error;
use uuid::Uuid;

pub mod postgres;

pub use postgres::{PgCartStore, PgSearchLedger};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store lock poisoned during {0}")]
    LockPoisoned(&'static str),

    #[error("concurrent write detected for cart {id} (expected version {expected}, got {actual})")]
    ConcurrentWrite { id: Uuid, expected: u64, actual: u64 },

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("insufficient stock, available: {available}")]
    InsufficientStock { available: u32 },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
