//! Identity Provider: the reactive "is the customer signed in" flag.
//!
//! Every cart mutation is gated on it, and the controller's lifecycle task
//! subscribes to its changes to load the cart on sign-in and forget it on
//! sign-out.

use tokio::sync::watch;

/// Source of the current authentication state.
pub trait IdentityProvider: Send + Sync {
    /// Whether a customer session is active right now.
    fn is_authenticated(&self) -> bool;

    /// Receiver that observes every change to the flag.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// In-process identity backed by a `watch` channel.
///
/// The sign-in flow (OAuth callback, token refresh) calls [`sign_in`] and
/// [`sign_out`]; everything else only reads.
///
/// [`sign_in`]: SessionIdentity::sign_in
/// [`sign_out`]: SessionIdentity::sign_out
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    sender: watch::Sender<bool>,
}

impl SessionIdentity {
    /// Create an identity in the given state.
    #[must_use]
    pub fn new(authenticated: bool) -> Self {
        let (sender, _receiver) = watch::channel(authenticated);
        Self { sender }
    }

    /// Create a signed-out identity.
    #[must_use]
    pub fn signed_out() -> Self {
        Self::new(false)
    }

    /// Mark the session as authenticated.
    pub fn sign_in(&self) {
        self.set(true);
    }

    /// Mark the session as unauthenticated.
    pub fn sign_out(&self) {
        self.set(false);
    }

    /// Set the flag, notifying subscribers only when it actually changes.
    pub fn set(&self, authenticated: bool) {
        self.sender.send_if_modified(|current| {
            let changed = *current != authenticated;
            *current = authenticated;
            changed
        });
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::signed_out()
    }
}

impl IdentityProvider for SessionIdentity {
    fn is_authenticated(&self) -> bool {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}
