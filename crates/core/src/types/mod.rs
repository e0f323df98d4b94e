//! Core types for Cartwright.
//!
//! This module provides type-safe wrappers for cart domain concepts.

pub mod id;
pub mod line;
pub mod price;
pub mod product;

pub use id::ProductKey;
pub use line::{CartLine, item_count, total};
pub use price::{CurrencyCode, Price};
pub use product::ProductRef;
