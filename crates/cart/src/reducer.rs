//! Cart snapshot and the pure state-transition function.
//!
//! [`reduce`] is the only way a [`CartSnapshot`] changes. It is synchronous
//! and side-effect free; the controller decides *when* to apply an action,
//! never *how*. After every transition:
//!
//! - `total` equals the sum of `price * quantity` over all lines
//! - `item_count` equals the sum of quantities
//! - no two lines share a canonical key
//! - every quantity is positive and every product has an identifier

use cartwright_core::{CartLine, ProductKey, ProductRef, item_count, total};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::service::CartPayload;

/// The complete cart state exposed to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSnapshot {
    /// Lines in insertion order.
    pub lines: Vec<CartLine>,
    /// Sum of `price * quantity`.
    pub total: Decimal,
    /// Sum of quantities.
    pub item_count: u64,
    /// Whether a Cart Service call is in flight.
    pub is_syncing: bool,
    /// Last failure message, for views that render it inline.
    pub last_error: Option<String>,
}

impl Default for CartSnapshot {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            total: Decimal::ZERO,
            item_count: 0,
            is_syncing: false,
            last_error: None,
        }
    }
}

impl CartSnapshot {
    /// Line holding the product identified by `key`.
    #[must_use]
    pub fn line(&self, key: &ProductKey) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product.matches(key))
    }

    /// Whether the product identified by `key` is in the cart.
    #[must_use]
    pub fn contains(&self, key: &ProductKey) -> bool {
        self.line(key).is_some()
    }

    /// Quantity of the product identified by `key`, zero when absent.
    #[must_use]
    pub fn quantity_of(&self, key: &ProductKey) -> u32 {
        self.line(key).map_or(0, |line| line.quantity)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Copy of this snapshot with `lines` replaced and derived fields
    /// recomputed.
    fn with_lines(&self, lines: Vec<CartLine>) -> Self {
        Self {
            total: total(&lines),
            item_count: item_count(&lines),
            lines,
            is_syncing: self.is_syncing,
            last_error: self.last_error.clone(),
        }
    }
}

/// The closed set of cart transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Set `is_syncing`.
    SetLoading(bool),
    /// Set or clear `last_error`.
    SetError(Option<String>),
    /// Replace all lines with the server's view and clear `last_error`.
    LoadCart(CartPayload),
    /// Add one unit of a product, merging with an existing line.
    AddItem(ProductRef),
    /// Drop the line for a product. Unknown keys are ignored.
    RemoveItem(ProductKey),
    /// Set a line's quantity; zero or less removes the line.
    UpdateQuantity(ProductKey, i64),
    /// Empty the cart. Also clears `last_error`, which described the
    /// discarded cart.
    ClearCart,
}

impl CartAction {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetLoading(_) => "set_loading",
            Self::SetError(_) => "set_error",
            Self::LoadCart(_) => "load_cart",
            Self::AddItem(_) => "add_item",
            Self::RemoveItem(_) => "remove_item",
            Self::UpdateQuantity(_, _) => "update_quantity",
            Self::ClearCart => "clear_cart",
        }
    }
}

/// Apply `action` to `snapshot`, producing the next snapshot.
///
/// # Example
///
/// ```rust
/// # use cartwright::reducer::{CartAction, CartSnapshot, reduce};
/// # use cartwright_core::ProductRef;
/// # use rust_decimal::Decimal;
/// let product = ProductRef::new("p1", Decimal::TEN);
/// let mut cart = CartSnapshot::default();
/// for _ in 0..3 {
///     cart = reduce(&cart, CartAction::AddItem(product.clone()));
/// }
/// assert_eq!(cart.lines.len(), 1);
/// assert_eq!(cart.item_count, 3);
/// assert_eq!(cart.total, Decimal::new(30, 0));
/// ```
#[must_use]
pub fn reduce(snapshot: &CartSnapshot, action: CartAction) -> CartSnapshot {
    match action {
        CartAction::SetLoading(is_syncing) => CartSnapshot {
            is_syncing,
            ..snapshot.clone()
        },
        CartAction::SetError(last_error) => CartSnapshot {
            last_error,
            ..snapshot.clone()
        },
        CartAction::LoadCart(payload) => {
            let mut next = snapshot.with_lines(sanitize_lines(payload.into_lines()));
            next.last_error = None;
            next
        }
        CartAction::AddItem(product) => {
            let Some(key) = product.canonical_key() else {
                return snapshot.clone();
            };
            let mut lines = snapshot.lines.clone();
            match lines.iter_mut().find(|line| line.product.matches(&key)) {
                Some(line) => line.quantity = line.quantity.saturating_add(1),
                None => lines.push(CartLine::new(product.normalized(), 1)),
            }
            snapshot.with_lines(lines)
        }
        CartAction::RemoveItem(key) => remove_line(snapshot, &key),
        CartAction::UpdateQuantity(key, quantity) => {
            if quantity <= 0 {
                return remove_line(snapshot, &key);
            }
            let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
            let mut lines = snapshot.lines.clone();
            match lines.iter_mut().find(|line| line.product.matches(&key)) {
                Some(line) => line.quantity = quantity,
                None => return snapshot.clone(),
            }
            snapshot.with_lines(lines)
        }
        CartAction::ClearCart => {
            let mut next = snapshot.with_lines(Vec::new());
            next.last_error = None;
            next
        }
    }
}

fn remove_line(snapshot: &CartSnapshot, key: &ProductKey) -> CartSnapshot {
    if !snapshot.contains(key) {
        return snapshot.clone();
    }
    let lines = snapshot
        .lines
        .iter()
        .filter(|line| !line.product.matches(key))
        .cloned()
        .collect();
    snapshot.with_lines(lines)
}

/// Bring server-provided lines in line with the snapshot invariants.
///
/// Products get both identifier fields populated, lines without an
/// identifier or with a zero quantity are dropped, and repeated products are
/// merged into their first occurrence by summing quantities.
#[must_use]
pub fn sanitize_lines(raw: Vec<CartLine>) -> Vec<CartLine> {
    let mut lines: Vec<CartLine> = Vec::with_capacity(raw.len());
    for line in raw {
        let product = line.product.normalized();
        let Some(key) = product.canonical_key() else {
            continue;
        };
        if line.quantity == 0 {
            continue;
        }
        match lines.iter_mut().find(|existing| existing.product.matches(&key)) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => lines.push(CartLine::new(product, line.quantity)),
        }
    }
    lines
}
