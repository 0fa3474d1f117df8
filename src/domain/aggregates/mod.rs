//! Aggregates module
pub mod product;
pub mod cart;
pub mod search_log;

pub use product::{Book, Clothes, Listing, Mobile, Product, ProductCore, ProductError, ProductKind, SearchResult, ShoeSize, Shoes, UnknownKind};
pub use cart::{Cart, CartError, CartItem, CartRecord, CartStatus};
pub use search_log::{AppliedFilters, PopularSearch, SearchHistory};
