//! Canonical product keys.
//!
//! Product records reach the cart with either of two identifier fields.
//! Once resolved (see [`crate::ProductRef::canonical_key`]), the identifier
//! travels as a [`ProductKey`] so it can't be confused with any other string.

use serde::{Deserialize, Serialize};

/// The resolved, de-duplicated identifier used to match cart lines.
///
/// # Example
///
/// ```rust
/// # use cartwright_core::ProductKey;
/// let key = ProductKey::new("sku-42");
/// assert_eq!(key.as_str(), "sku-42");
/// assert_eq!(key.to_string(), "sku-42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductKey(String);

impl ProductKey {
    /// Create a new key from any string-like value.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Whether the key is the empty sentinel.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ::core::fmt::Display for ProductKey {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for ProductKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<ProductKey> for String {
    fn from(key: ProductKey) -> Self {
        key.0
    }
}

impl AsRef<str> for ProductKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
