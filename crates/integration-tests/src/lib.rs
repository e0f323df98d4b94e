//! Integration test support for Cartwright.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartwright-integration-tests
//! ```
//!
//! # Test Doubles
//!
//! - [`MockCartService`] - In-memory Cart Service that records every call and
//!   can be scripted to fail, refuse, never answer, or hold one call until
//!   released
//! - [`RecordingNotifier`] - Collects the notices a controller emits

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cartwright::notify::{CartNotifier, Notice};
use cartwright::service::{Ack, CartPayload, CartService, ServiceError};
use cartwright_core::{CartLine, ProductKey, ProductRef};
use rust_decimal::Decimal;
use tokio::sync::Notify;

/// One call received by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Get,
    Add(ProductKey, u32),
    Remove(ProductKey),
    Update(ProductKey, u32),
    Clear,
}

/// How the mock answers while failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Behave like an unreachable upstream (HTTP 503).
    Transport,
    /// Answer `success = false` with this message.
    Rejected(String),
    /// Never answer.
    Hang,
}

/// Response shape used by `get_cart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadShape {
    #[default]
    Bare,
    Wrapped,
}

#[derive(Debug, Default)]
struct MockState {
    catalog: HashMap<ProductKey, ProductRef>,
    lines: Vec<CartLine>,
    calls: Vec<Call>,
    failure: Option<Failure>,
    shape: PayloadShape,
    held: Vec<(Call, Arc<Notify>)>,
}

/// In-memory Cart Service.
///
/// Clones share state, so a test can keep a handle while the controller owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MockCartService {
    state: Arc<Mutex<MockState>>,
}

impl MockCartService {
    /// Create an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a product so server-side lines carry its details.
    #[must_use]
    pub fn with_product(self, product: ProductRef) -> Self {
        if let Some(key) = product.canonical_key() {
            self.lock().catalog.insert(key, product);
        }
        self
    }

    /// Seed the server-side cart.
    #[must_use]
    pub fn with_lines(self, lines: Vec<CartLine>) -> Self {
        self.lock().lines = lines;
        self
    }

    /// Choose the `get_cart` response shape.
    #[must_use]
    pub fn with_shape(self, shape: PayloadShape) -> Self {
        self.lock().shape = shape;
        self
    }

    /// Fail every call until [`recover`](Self::recover).
    pub fn fail_with(&self, failure: Failure) {
        self.lock().failure = Some(failure);
    }

    /// Stop failing.
    pub fn recover(&self) {
        self.lock().failure = None;
    }

    /// Hold the next call equal to `call` until the returned gate is
    /// notified. The call is recorded when it arrives and answers once
    /// released.
    #[must_use]
    pub fn hold(&self, call: Call) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().held.push((call, Arc::clone(&gate)));
        gate
    }

    /// Calls received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Server-side lines.
    #[must_use]
    pub fn server_lines(&self) -> Vec<CartLine> {
        self.lock().lines.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call, wait while it is held, then report the scripted
    /// failure, if any.
    async fn admit(&self, call: Call) -> Option<Failure> {
        let gate = {
            let mut state = self.lock();
            let gate = state
                .held
                .iter()
                .position(|(held, _)| *held == call)
                .map(|index| state.held.remove(index).1);
            state.calls.push(call);
            gate
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.lock().failure.clone()
    }

    /// Apply `mutate` unless a failure is scripted.
    async fn mutate(
        &self,
        call: Call,
        mutate: impl FnOnce(&mut MockState),
    ) -> Result<Ack, ServiceError> {
        match self.admit(call).await {
            None => {
                mutate(&mut self.lock());
                Ok(Ack::ok())
            }
            Some(Failure::Rejected(message)) => Ok(Ack::rejected(message)),
            Some(Failure::Transport) => Err(unavailable()),
            Some(Failure::Hang) => std::future::pending().await,
        }
    }
}

fn unavailable() -> ServiceError {
    ServiceError::Status {
        status: 503,
        body: "service unavailable".to_string(),
    }
}

impl CartService for MockCartService {
    async fn get_cart(&self) -> Result<CartPayload, ServiceError> {
        match self.admit(Call::Get).await {
            None => {
                let state = self.lock();
                let lines = state.lines.clone();
                Ok(match state.shape {
                    PayloadShape::Bare => CartPayload::Lines(lines),
                    PayloadShape::Wrapped => CartPayload::Wrapped { items: lines },
                })
            }
            Some(Failure::Rejected(message)) => Err(ServiceError::Rejected(message)),
            Some(Failure::Transport) => Err(unavailable()),
            Some(Failure::Hang) => std::future::pending().await,
        }
    }

    async fn add_to_cart(&self, key: &ProductKey, quantity: u32) -> Result<Ack, ServiceError> {
        self.mutate(Call::Add(key.clone(), quantity), |state| {
            let product = state
                .catalog
                .get(key)
                .cloned()
                .unwrap_or_else(|| ProductRef::with_server_id(key.as_str(), Decimal::ZERO));
            match state.lines.iter_mut().find(|l| l.product.matches(key)) {
                Some(line) => line.quantity += quantity,
                None => state.lines.push(CartLine::new(product, quantity)),
            }
        })
        .await
    }

    async fn remove_item(&self, key: &ProductKey) -> Result<Ack, ServiceError> {
        self.mutate(Call::Remove(key.clone()), |state| {
            state.lines.retain(|l| !l.product.matches(key));
        })
        .await
    }

    async fn update_quantity(&self, key: &ProductKey, quantity: u32) -> Result<Ack, ServiceError> {
        self.mutate(Call::Update(key.clone(), quantity), |state| {
            if let Some(line) = state.lines.iter_mut().find(|l| l.product.matches(key)) {
                line.quantity = quantity;
            }
        })
        .await
    }

    async fn clear_cart(&self) -> Result<Ack, ServiceError> {
        self.mutate(Call::Clear, |state| state.lines.clear()).await
    }
}

/// Notifier that keeps every notice for later assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices received so far.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CartNotifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }
}

/// Product with a catalog `id` and a whole-unit price.
#[must_use]
pub fn product(id: &str, price: i64) -> ProductRef {
    ProductRef::new(id, Decimal::new(price, 0)).named(format!("Product {id}"))
}
