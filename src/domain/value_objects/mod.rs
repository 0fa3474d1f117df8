//! Value Objects for the catalog and cart engine

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-negative price with two decimal places
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    pub const ZERO: Price = Price(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() { return Err(PriceError::Negative); }
        let mut amount = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        amount.rescale(2);
        Ok(Self(amount))
    }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn times(&self, qty: Quantity) -> Decimal { self.0 * Decimal::from(qty.value()) }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;
    fn try_from(value: Decimal) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self { price.0 }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum PriceError { Negative }
impl std::error::Error for PriceError {}
impl fmt::Display for PriceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "price must not be negative") }
}

/// Positive line quantity
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// Accepts a caller-supplied amount, rejecting zero, negatives and overflow.
    pub fn requested(value: i64) -> Option<Self> {
        u32::try_from(value).ok().filter(|v| *v > 0).map(Self)
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: Quantity) -> Option<Self> { self.0.checked_add(other.0).map(Self) }
    pub fn fits_within(&self, stock: u32) -> bool { self.0 <= stock }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value == 0 { Err(QuantityError::Zero) } else { Ok(Self(value)) }
    }
}

impl From<Quantity> for u32 {
    fn from(qty: Quantity) -> Self { qty.0 }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum QuantityError { Zero }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "quantity must be positive") }
}

/// Opaque customer identifier issued by the identity service
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CustomerId(String);

impl CustomerId {
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into().trim().to_string();
        if value.is_empty() { None } else { Some(Self(value)) }
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Ordering applied to merged search results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortPolicy {
    #[default]
    Relevance,
    PriceAsc,
    PriceDesc,
}

impl SortPolicy {
    /// Unknown values fall back to relevance.
    pub fn parse(value: &str) -> Self {
        match value {
            "price_asc" => Self::PriceAsc,
            "price_desc" => Self::PriceDesc,
            _ => Self::Relevance,
        }
    }
    pub fn as_str(&self) -> &'static str {
        match self { Self::Relevance => "relevance", Self::PriceAsc => "price_asc", Self::PriceDesc => "price_desc" }
    }
}
