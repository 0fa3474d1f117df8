//! Product Aggregate
//!
//! Catalog entries come in four variants sharing one search and cart contract.
//! Each variant implements [`Listing`], which supplies its searchable text,
//! its suggestion text and the details it contributes to a [`SearchResult`].

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::{fmt, str::FromStr};
use crate::domain::value_objects::{Price, Quantity};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind { Book, Mobile, Shoes, Clothes }

impl ProductKind {
    /// Fan-out order used by search.
    pub const ALL: [ProductKind; 4] = [Self::Book, Self::Mobile, Self::Shoes, Self::Clothes];

    pub fn as_str(&self) -> &'static str {
        match self { Self::Book => "book", Self::Mobile => "mobile", Self::Shoes => "shoes", Self::Clothes => "clothes" }
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ProductKind {
    type Err = UnknownKind;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "book" => Ok(Self::Book),
            "mobile" => Ok(Self::Mobile),
            "shoes" => Ok(Self::Shoes),
            "clothes" => Ok(Self::Clothes),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct UnknownKind(pub String);
impl std::error::Error for UnknownKind {}
impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "unknown product type: {}", self.0) }
}

/// Attributes every variant carries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductCore {
    pub id: String,
    pub price: Price,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Book {
    #[serde(flatten)]
    pub core: ProductCore,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub published_date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mobile {
    #[serde(flatten)]
    pub core: ProductCore,
    pub name: String,
    pub brand: String,
    pub model_number: String,
    pub screen_size: Decimal,
    pub ram: u32,
    pub storage: u32,
    pub processor: String,
    pub operating_system: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShoeSize { pub us: Decimal, pub uk: Decimal, pub eu: u32 }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shoes {
    #[serde(flatten)]
    pub core: ProductCore,
    pub name: String,
    pub brand: String,
    pub sku: String,
    pub category: String,
    pub gender: String,
    #[serde(default)]
    pub available_sizes: Vec<ShoeSize>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clothes {
    #[serde(flatten)]
    pub core: ProductCore,
    pub name: String,
    pub brand: String,
    pub sku: String,
    pub category: String,
    pub gender: String,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub material: Option<String>,
}

/// Capability shared by every product variant.
pub trait Listing {
    fn kind(&self) -> ProductKind;
    fn core(&self) -> &ProductCore;
    fn display_name(&self) -> &str;
    fn brand(&self) -> Option<&str> { None }
    fn category(&self) -> Option<&str> { None }
    /// Fields matched by free-text search.
    fn search_fields(&self) -> Vec<&str>;
    /// Fields matched by typeahead suggestions.
    fn suggestion_fields(&self) -> Vec<&str>;
    fn details(&self) -> Map<String, Value>;

    fn id(&self) -> &str { &self.core().id }
    fn price(&self) -> Price { self.core().price }
    fn stock(&self) -> u32 { self.core().stock }

    fn to_search_result(&self) -> SearchResult {
        let core = self.core();
        SearchResult {
            kind: self.kind(),
            id: core.id.clone(),
            name: self.display_name().to_string(),
            brand: self.brand().map(str::to_string),
            price: core.price,
            description: core.description.clone(),
            category: self.category().map(str::to_string),
            stock: core.stock,
            details: self.details(),
        }
    }
}

fn with_description<'a>(mut fields: Vec<&'a str>, core: &'a ProductCore) -> Vec<&'a str> {
    if let Some(d) = core.description.as_deref() { fields.push(d); }
    fields
}

impl Listing for Book {
    fn kind(&self) -> ProductKind { ProductKind::Book }
    fn core(&self) -> &ProductCore { &self.core }
    fn display_name(&self) -> &str { &self.title }
    fn search_fields(&self) -> Vec<&str> { with_description(vec![self.title.as_str(), self.author.as_str()], &self.core) }
    fn suggestion_fields(&self) -> Vec<&str> { vec![self.title.as_str(), self.author.as_str()] }
    fn details(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("author".into(), json!(self.author));
        m.insert("isbn".into(), json!(self.isbn));
        m.insert("published_date".into(), json!(self.published_date));
        m
    }
}

impl Listing for Mobile {
    fn kind(&self) -> ProductKind { ProductKind::Mobile }
    fn core(&self) -> &ProductCore { &self.core }
    fn display_name(&self) -> &str { &self.name }
    fn brand(&self) -> Option<&str> { Some(&self.brand) }
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = with_description(vec![self.name.as_str(), self.brand.as_str()], &self.core);
        fields.push(self.processor.as_str());
        fields
    }
    fn suggestion_fields(&self) -> Vec<&str> { vec![self.name.as_str(), self.brand.as_str()] }
    fn details(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("model_number".into(), json!(self.model_number));
        m.insert("screen_size".into(), json!(self.screen_size));
        m.insert("ram".into(), json!(self.ram));
        m.insert("storage".into(), json!(self.storage));
        m.insert("processor".into(), json!(self.processor));
        m.insert("operating_system".into(), json!(self.operating_system));
        m
    }
}

impl Listing for Shoes {
    fn kind(&self) -> ProductKind { ProductKind::Shoes }
    fn core(&self) -> &ProductCore { &self.core }
    fn display_name(&self) -> &str { &self.name }
    fn brand(&self) -> Option<&str> { Some(&self.brand) }
    fn category(&self) -> Option<&str> { Some(&self.category) }
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = with_description(vec![self.name.as_str(), self.brand.as_str()], &self.core);
        fields.push(self.category.as_str());
        fields
    }
    fn suggestion_fields(&self) -> Vec<&str> { vec![self.name.as_str(), self.brand.as_str()] }
    fn details(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("gender".into(), json!(self.gender));
        m.insert("available_sizes".into(), json!(self.available_sizes));
        m.insert("colors".into(), json!(self.colors));
        m.insert("style".into(), json!(self.style));
        m
    }
}

impl Listing for Clothes {
    fn kind(&self) -> ProductKind { ProductKind::Clothes }
    fn core(&self) -> &ProductCore { &self.core }
    fn display_name(&self) -> &str { &self.name }
    fn brand(&self) -> Option<&str> { Some(&self.brand) }
    fn category(&self) -> Option<&str> { Some(&self.category) }
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = with_description(vec![self.name.as_str(), self.brand.as_str()], &self.core);
        fields.push(self.category.as_str());
        fields
    }
    fn suggestion_fields(&self) -> Vec<&str> { vec![self.name.as_str(), self.brand.as_str()] }
    fn details(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("gender".into(), json!(self.gender));
        m.insert("sizes".into(), json!(self.sizes));
        m.insert("colors".into(), json!(self.colors));
        m.insert("material".into(), json!(self.material));
        m
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Product {
    Book(Book),
    Mobile(Mobile),
    Shoes(Shoes),
    Clothes(Clothes),
}

impl Product {
    pub fn listing(&self) -> &dyn Listing {
        match self {
            Self::Book(p) => p as &dyn Listing,
            Self::Mobile(p) => p as &dyn Listing,
            Self::Shoes(p) => p as &dyn Listing,
            Self::Clothes(p) => p as &dyn Listing,
        }
    }

    fn core_mut(&mut self) -> &mut ProductCore {
        match self {
            Self::Book(p) => &mut p.core,
            Self::Mobile(p) => &mut p.core,
            Self::Shoes(p) => &mut p.core,
            Self::Clothes(p) => &mut p.core,
        }
    }

    pub fn kind(&self) -> ProductKind { self.listing().kind() }
    pub fn id(&self) -> &str { self.listing().id() }
    pub fn name(&self) -> &str { self.listing().display_name() }
    pub fn price(&self) -> Price { self.listing().price() }
    pub fn stock(&self) -> u32 { self.listing().stock() }
    pub fn created_at(&self) -> DateTime<Utc> { self.listing().core().created_at }
    pub fn to_search_result(&self) -> SearchResult { self.listing().to_search_result() }

    /// Case-insensitive substring match over the variant's search fields.
    pub fn matches_text(&self, term: &str) -> bool { contains_any(&self.listing().search_fields(), term) }
    pub fn matches_suggestion(&self, partial: &str) -> bool { contains_any(&self.listing().suggestion_fields(), partial) }

    pub fn take_stock(&mut self, qty: Quantity) -> Result<u32, ProductError> {
        let core = self.core_mut();
        if !qty.fits_within(core.stock) { return Err(ProductError::InsufficientStock { available: core.stock }); }
        core.stock -= qty.value();
        core.updated_at = Utc::now();
        Ok(core.stock)
    }

    pub fn return_stock(&mut self, qty: Quantity) -> u32 {
        let core = self.core_mut();
        core.stock = core.stock.saturating_add(qty.value());
        core.updated_at = Utc::now();
        core.stock
    }

    pub fn set_price(&mut self, price: Price) {
        let core = self.core_mut();
        core.price = price;
        core.updated_at = Utc::now();
    }
}

pub(crate) fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn contains_any(fields: &[&str], term: &str) -> bool {
    let needle = term.to_lowercase();
    fields.iter().any(|f| contains_ci(f, &needle))
}

/// Uniform projection of any variant returned by search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(rename = "type")]
    pub kind: ProductKind,
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    pub price: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub stock: u32,
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum ProductError { InsufficientStock { available: u32 } }
impl std::error::Error for ProductError {}
impl fmt::Display for ProductError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::InsufficientStock { available } => write!(f, "insufficient stock, available: {available}") }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kind_parse() {
        assert_eq!("Mobile".parse::<ProductKind>().unwrap(), ProductKind::Mobile);
        assert!("furniture".parse::<ProductKind>().is_err());
    }

    #[test]
    fn test_text_match_per_variant() {
        let m = mobile("m1", "iPhone 15", dec!(999), 3);
        assert!(m.matches_text("bionic"));
        assert!(m.matches_text("IPHONE"));
        assert!(!m.matches_text("android"));
        let b = book("b1", "Rust in Action", dec!(40), 1);
        assert!(b.matches_text("doe"));
        assert!(!b.matches_text("bionic"));
        let c = clothes("c1", "501 Original", dec!(60), 1);
        assert!(c.matches_text("jeans"));
    }

    #[test]
    fn test_search_result_projection() {
        let r = shoes("s1", "Air Max", dec!(120), 4).to_search_result();
        assert_eq!(r.kind, ProductKind::Shoes);
        assert_eq!(r.brand.as_deref(), Some("Nike"));
        assert_eq!(r.category.as_deref(), Some("Sneakers"));
        assert_eq!(r.details["gender"], json!("Unisex"));
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["type"], json!("shoes"));
        assert_eq!(v["price"], json!("120.00"));
    }

    #[test]
    fn test_take_stock() {
        let mut p = book("b1", "T", dec!(10), 3);
        assert_eq!(p.take_stock(Quantity::requested(2).unwrap()), Ok(1));
        assert_eq!(p.take_stock(Quantity::requested(2).unwrap()), Err(ProductError::InsufficientStock { available: 1 }));
        assert_eq!(p.return_stock(Quantity::requested(2).unwrap()), 3);
    }

    #[test]
    fn test_product_json_is_tagged() {
        let raw = json!({
            "type": "mobile", "id": "m9", "price": "599.99", "stock": 2, "name": "Pixel 8", "brand": "Google",
            "model_number": "GP8", "screen_size": "6.2", "ram": 8, "storage": 128, "processor": "Tensor G3",
            "operating_system": "Android"
        });
        let p: Product = serde_json::from_value(raw).unwrap();
        assert_eq!(p.kind(), ProductKind::Mobile);
        assert_eq!(p.price().amount(), dec!(599.99));
        assert_eq!(p.stock(), 2);
    }
}
