//! Cartwright Core - Shared cart types.
//!
//! This crate provides the types used across all Cartwright components:
//! - `cartwright` - Cart state container and Cart Service clients
//! - `cli` - Command-line driver for a remote cart
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no async. Everything here is deterministic and can be tested
//! without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Product references, cart lines, canonical keys, and prices

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
