//! Cart Service abstraction and clients.
//!
//! # Architecture
//!
//! - The Cart Service is the source of truth for cart contents
//! - [`CartService`] is the seam the controller depends on; tests inject an
//!   in-memory implementation, production uses [`HttpCartService`]
//! - Every mutating call returns an [`Ack`]; `success = false` is folded into
//!   [`ServiceError::Rejected`] so callers handle one failure path
//!
//! # Example
//!
//! ```rust,ignore
//! use cartwright::service::{CartService, HttpCartService};
//!
//! let service = HttpCartService::new(&config)?;
//! let cart = service.get_cart().await?;
//! service.add_to_cart(&ProductKey::new("p1"), 1).await?.into_result()?;
//! ```

mod http;
pub mod types;

use std::future::Future;
use std::time::Duration;

use cartwright_core::ProductKey;
use thiserror::Error;

pub use http::HttpCartService;
pub use types::{Ack, CartPayload};

/// Errors that can occur when talking to the Cart Service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint URL could not be built from the configured base.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// Rate limited by the Cart Service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The service answered `success = false`.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The call did not complete in time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl ServiceError {
    /// Message suitable for a user-facing toast.
    ///
    /// Transport details are never exposed; a rejection carries the
    /// service's own wording.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected(message) => message.clone(),
            Self::RateLimited(_) => "Too many requests, please try again shortly".to_string(),
            Self::Timeout(_) => "The cart service is not responding".to_string(),
            Self::Http(_) | Self::Parse(_) | Self::Url(_) | Self::Status { .. } => {
                "Could not reach the cart service".to_string()
            }
        }
    }
}

/// Remote, authoritative cart storage.
///
/// All operations are scoped to the signed-in customer by the service
/// itself; the client only names products and quantities.
pub trait CartService: Send + Sync {
    /// Fetch the full cart.
    fn get_cart(&self) -> impl Future<Output = Result<CartPayload, ServiceError>> + Send;

    /// Add `quantity` units of a product.
    fn add_to_cart(
        &self,
        key: &ProductKey,
        quantity: u32,
    ) -> impl Future<Output = Result<Ack, ServiceError>> + Send;

    /// Remove a product's line.
    fn remove_item(&self, key: &ProductKey)
    -> impl Future<Output = Result<Ack, ServiceError>> + Send;

    /// Set a product's quantity.
    fn update_quantity(
        &self,
        key: &ProductKey,
        quantity: u32,
    ) -> impl Future<Output = Result<Ack, ServiceError>> + Send;

    /// Empty the cart.
    fn clear_cart(&self) -> impl Future<Output = Result<Ack, ServiceError>> + Send;
}
