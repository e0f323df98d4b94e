//! Product references and identity resolution.
//!
//! Product records come from two sources that disagree on naming: the
//! catalog hands out `id`, while the Cart Service issues `_id`. When both
//! fields are present they hold the same value. Every place that matches a
//! cart line to a product goes through [`ProductRef::canonical_key`] and
//! [`ProductRef::matches`] instead of comparing fields directly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductKey;

/// A product record as carried by a cart line.
///
/// Only the identifiers and the price matter to the cart. Display fields
/// are carried through untouched so views can render the line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    /// Catalog identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Server-issued identifier (`_id` on the wire).
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Unit price. Missing on malformed records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    /// Image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl ProductRef {
    /// Create a product carrying only the catalog `id`.
    #[must_use]
    pub fn new(id: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: Some(id.into()),
            price: Some(price),
            ..Self::default()
        }
    }

    /// Create a product carrying only the server-issued `_id`.
    #[must_use]
    pub fn with_server_id(server_id: impl Into<String>, price: Decimal) -> Self {
        Self {
            server_id: Some(server_id.into()),
            price: Some(price),
            ..Self::default()
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Resolve the canonical key for this product.
    ///
    /// Prefers the server-issued `_id`, falling back to `id`. Empty strings
    /// count as absent. Returns `None` when neither field carries a value;
    /// such a product must never be persisted into the cart.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use cartwright_core::{ProductKey, ProductRef};
    /// # use rust_decimal::Decimal;
    /// let product = ProductRef::new("p1", Decimal::TEN);
    /// assert_eq!(product.canonical_key(), Some(ProductKey::new("p1")));
    ///
    /// let anonymous = ProductRef::default();
    /// assert_eq!(anonymous.canonical_key(), None);
    /// ```
    #[must_use]
    pub fn canonical_key(&self) -> Option<ProductKey> {
        non_empty(self.server_id.as_deref())
            .or_else(|| non_empty(self.id.as_deref()))
            .map(ProductKey::from)
    }

    /// Whether either identifier field equals `key`.
    ///
    /// The empty key never matches.
    #[must_use]
    pub fn matches(&self, key: &ProductKey) -> bool {
        if key.is_empty() {
            return false;
        }
        [self.server_id.as_deref(), self.id.as_deref()]
            .into_iter()
            .flatten()
            .any(|candidate| candidate == key.as_str())
    }

    /// Return the record with both identifier fields populated from
    /// whichever one is present.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        match (
            non_empty(self.id.as_deref()).map(str::to_owned),
            non_empty(self.server_id.as_deref()).map(str::to_owned),
        ) {
            (Some(id), None) => self.server_id = Some(id),
            (None, Some(server_id)) => self.id = Some(server_id),
            _ => {}
        }
        self
    }

    /// Unit price, with a missing price counting as zero.
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        self.price.unwrap_or(Decimal::ZERO)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_key_prefers_server_id() {
        let product = ProductRef {
            id: Some("catalog".to_string()),
            server_id: Some("server".to_string()),
            ..ProductRef::default()
        };
        assert_eq!(product.canonical_key(), Some(ProductKey::new("server")));
    }

    #[test]
    fn test_canonical_key_falls_back_to_id() {
        let product = ProductRef {
            id: Some("p1".to_string()),
            server_id: Some(String::new()),
            ..ProductRef::default()
        };
        assert_eq!(product.canonical_key(), Some(ProductKey::new("p1")));
    }

    #[test]
    fn test_canonical_key_missing() {
        let product = ProductRef {
            id: Some(String::new()),
            ..ProductRef::default()
        };
        assert!(product.canonical_key().is_none());
    }

    #[test]
    fn test_matches_either_field() {
        let product = ProductRef::new("p1", Decimal::ONE).normalized();
        assert!(product.matches(&ProductKey::new("p1")));
        assert!(!product.matches(&ProductKey::new("p2")));
        assert!(!product.matches(&ProductKey::new("")));

        let server_only = ProductRef::with_server_id("p1", Decimal::ONE);
        assert!(server_only.matches(&ProductKey::new("p1")));
    }

    #[test]
    fn test_normalized_fills_both_fields() {
        let product = ProductRef::with_server_id("abc", Decimal::ONE).normalized();
        assert_eq!(product.id.as_deref(), Some("abc"));
        assert_eq!(product.server_id.as_deref(), Some("abc"));

        let empty = ProductRef::default().normalized();
        assert_eq!(empty, ProductRef::default());
    }

    #[test]
    fn test_deserialize_wire_names() {
        let product: ProductRef =
            serde_json::from_str(r#"{"_id":"x9","name":"Mug","price":"12.50"}"#).unwrap();
        assert_eq!(product.server_id.as_deref(), Some("x9"));
        assert_eq!(product.unit_price(), Decimal::new(1250, 2));
    }

    #[test]
    fn test_missing_price_is_zero() {
        let product: ProductRef = serde_json::from_str(r#"{"id":"p1"}"#).unwrap();
        assert_eq!(product.unit_price(), Decimal::ZERO);
    }
}
