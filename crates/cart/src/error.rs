//! Controller error handling with Sentry integration.
//!
//! Caller mistakes come back as [`CartError`]. Cart Service failures never
//! do: the controller reports them here (Sentry + log), records them on the
//! snapshot, and returns [`SyncOutcome::Failed`].

use thiserror::Error;

use crate::service::ServiceError;

/// Errors a cart operation returns to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// A mutation was attempted without a session. The caller should send
    /// the shopper to sign in; the cart is untouched.
    #[error("Unauthenticated: sign in to modify the cart")]
    Unauthenticated,

    /// The product carries no usable identifier.
    #[error("Invalid product: {0}")]
    InvalidProduct(String),

    /// Quantity updates must be positive; removals go through `remove_item`.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),
}

impl CartError {
    /// Whether the caller should redirect to the sign-in page.
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }
}

/// Result of an operation that reached the Cart Service (or chose not to).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The service confirmed and the transition was applied.
    Applied,
    /// Nothing to do (e.g., loading while signed out).
    Skipped,
    /// The service call failed; the snapshot is unchanged apart from
    /// `last_error`. Carries the user-facing message.
    Failed(String),
}

impl SyncOutcome {
    /// Whether the transition was applied.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

/// Capture a Cart Service failure to Sentry and the log.
///
/// `sentry::capture_error` is a no-op when Sentry was never initialized.
pub fn report_service_error(operation: &str, error: &ServiceError) {
    let event_id = sentry::capture_error(error);
    tracing::error!(
        operation,
        error = %error,
        sentry_event_id = %event_id,
        "Cart Service call failed"
    );
}

/// Add a breadcrumb for cart actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// actions leading up to an error.
pub fn add_breadcrumb(message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some("cart".to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
