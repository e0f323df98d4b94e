//! Cart lines and quantity arithmetic.
//!
//! `total` and `item_count` are always derived from the line sequence.
//! Nothing stores them as independently mutated counters.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductKey;
use super::product::ProductRef;

/// One product and quantity pair in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// The product on this line.
    pub product: ProductRef,
    /// Number of units. Zero only on malformed records, which the cart drops.
    #[serde(default)]
    pub quantity: u32,
}

impl CartLine {
    /// Create a line.
    #[must_use]
    pub const fn new(product: ProductRef, quantity: u32) -> Self {
        Self { product, quantity }
    }

    /// Canonical key of this line's product.
    #[must_use]
    pub fn key(&self) -> Option<ProductKey> {
        self.product.canonical_key()
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product
            .unit_price()
            .saturating_mul(Decimal::from(self.quantity))
    }
}

/// Sum of `price * quantity` over all lines.
///
/// Missing prices count as zero. Saturates instead of overflowing.
///
/// # Example
///
/// ```rust
/// # use cartwright_core::{CartLine, ProductRef, total};
/// # use rust_decimal::Decimal;
/// let lines = vec![
///     CartLine::new(ProductRef::new("p1", Decimal::TEN), 2),
///     CartLine::new(ProductRef::new("p2", Decimal::new(5, 0)), 1),
/// ];
/// assert_eq!(total(&lines), Decimal::new(25, 0));
/// ```
#[must_use]
pub fn total(lines: &[CartLine]) -> Decimal {
    lines
        .iter()
        .fold(Decimal::ZERO, |acc, line| acc.saturating_add(line.line_total()))
}

/// Sum of quantities over all lines.
#[must_use]
pub fn item_count(lines: &[CartLine]) -> u64 {
    lines
        .iter()
        .fold(0_u64, |acc, line| acc.saturating_add(u64::from(line.quantity)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_lines() {
        assert_eq!(total(&[]), Decimal::ZERO);
        assert_eq!(item_count(&[]), 0);
    }

    #[test]
    fn test_missing_price_and_quantity() {
        let line: CartLine = serde_json::from_str(r#"{"product":{"id":"p1"}}"#).unwrap();
        assert_eq!(line.quantity, 0);
        assert_eq!(line.line_total(), Decimal::ZERO);

        let lines = vec![
            line,
            CartLine::new(ProductRef::new("p2", Decimal::new(350, 2)), 2),
        ];
        assert_eq!(total(&lines), Decimal::new(700, 2));
        assert_eq!(item_count(&lines), 2);
    }

    #[test]
    fn test_fractional_prices_are_exact() {
        let lines = vec![CartLine::new(ProductRef::new("p1", Decimal::new(10, 2)), 3)];
        assert_eq!(total(&lines), Decimal::new(30, 2));
    }
}
