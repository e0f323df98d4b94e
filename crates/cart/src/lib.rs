//! Cartwright - Client-side cart state container.
//!
//! Keeps a local snapshot of the shopper's cart consistent with itself and
//! with the remote Cart Service, across sign-in/sign-out and partial
//! failures.
//!
//! # Architecture
//!
//! - [`reducer`] - Pure `(snapshot, action) -> snapshot` transitions
//! - [`controller`] - Write-through synchronization with the Cart Service
//!   and the authentication lifecycle
//! - [`service`] - Cart Service trait and the HTTP client
//! - [`identity`] - Reactive authentication flag
//! - [`notify`] - User-facing notices
//! - [`config`] - Environment configuration
//! - [`error`] - Caller-facing errors and Sentry reporting

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod controller;
pub mod error;
pub mod identity;
pub mod notify;
pub mod reducer;
pub mod service;

pub use config::{CartConfig, ConfigError};
pub use controller::{AuthTransition, CartController};
pub use error::{CartError, SyncOutcome};
pub use identity::{IdentityProvider, SessionIdentity};
pub use notify::{CartNotifier, Notice, NoticeLevel, TracingNotifier};
pub use reducer::{CartAction, CartSnapshot, reduce};
pub use service::{Ack, CartPayload, CartService, HttpCartService, ServiceError};
