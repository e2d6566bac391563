// crates/sync-engine/src/session.rs
//! Identity seam
//!
//! Authentication happens elsewhere; the engine only needs to know who is
//! signed in, if anyone.

use hymnal_core::UserId;
use std::sync::{Arc, RwLock};

/// Supplies the signed-in user
pub trait SessionProvider: Send + Sync {
    /// The signed-in user, or `None` when signed out
    fn current_user(&self) -> Option<UserId>;

    fn is_signed_in(&self) -> bool {
        self.current_user().is_some()
    }
}

/// Session state pushed by the host's authentication layer
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    user: Arc<RwLock<Option<UserId>>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user: UserId) -> Self {
        let state = Self::new();
        state.sign_in(user);
        state
    }

    /// Records a sign-in; anonymous or blank ids count as signed out
    pub fn sign_in(&self, user: UserId) {
        let user = (!user.is_anonymous()).then_some(user);
        match self.user.write() {
            Ok(mut guard) => *guard = user,
            Err(poisoned) => *poisoned.into_inner() = user,
        }
    }

    pub fn sign_out(&self) {
        match self.user.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

impl SessionProvider for SessionState {
    fn current_user(&self) -> Option<UserId> {
        match self.user.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
