//! Wire types shared by Cart Service implementations.

use cartwright_core::CartLine;
use serde::{Deserialize, Serialize};

use super::ServiceError;

/// A cart as returned by the Cart Service.
///
/// Deployed services answer in one of two shapes: a bare array of lines, or
/// an object holding the lines under `items` (older builds used `lines`).
/// Both decode to the same line sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CartPayload {
    /// `[ {product, quantity}, ... ]`
    Lines(Vec<CartLine>),
    /// `{ "items": [ ... ] }`
    Wrapped {
        #[serde(alias = "lines")]
        items: Vec<CartLine>,
    },
}

impl CartPayload {
    /// Unwrap into the line sequence regardless of shape.
    #[must_use]
    pub fn into_lines(self) -> Vec<CartLine> {
        match self {
            Self::Lines(lines) | Self::Wrapped { items: lines } => lines,
        }
    }

    /// Number of raw lines in the payload.
    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::Lines(lines) | Self::Wrapped { items: lines } => lines.len(),
        }
    }

    /// Whether the payload carries no lines.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CartPayload {
    fn default() -> Self {
        Self::Lines(Vec::new())
    }
}

impl From<Vec<CartLine>> for CartPayload {
    fn from(lines: Vec<CartLine>) -> Self {
        Self::Lines(lines)
    }
}

/// Acknowledgement returned by every mutating Cart Service call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Whether the service applied the change.
    pub success: bool,
    /// Optional human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Ack {
    /// A successful acknowledgement.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// A refusal carrying the service's reason.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    /// Treat `success = false` exactly like a transport failure.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Rejected` when the service refused the change.
    pub fn into_result(self) -> Result<(), ServiceError> {
        if self.success {
            Ok(())
        } else {
            Err(ServiceError::Rejected(
                self.message
                    .unwrap_or_else(|| "request was not accepted".to_string()),
            ))
        }
    }
}

/// JSON envelope used by the HTTP Cart Service.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    /// Whether the request succeeded.
    pub success: bool,
    /// Optional human-readable message.
    #[serde(default)]
    pub message: Option<String>,
    /// Response payload.
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Split the envelope into its acknowledgement and payload.
    pub fn into_parts(self) -> (Ack, Option<T>) {
        (
            Ack {
                success: self.success,
                message: self.message,
            },
            self.data,
        )
    }
}

/// Request body for add and update calls.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest<'a> {
    /// Canonical product key.
    pub product_id: &'a str,
    /// Quantity to add, or the new quantity.
    pub quantity: u32,
}
