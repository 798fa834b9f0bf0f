//! Credential access for stream clients.
//!
//! Clients never hold on to a token: they ask their provider at connect time
//! and again on every open, so a refreshed token takes effect on the very
//! next attempt.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

/// Source of the current authentication token.
pub trait CredentialProvider: Send + Sync + Debug {
    /// The token to use right now, or `None` when unauthenticated.
    fn current(&self) -> Option<String>;
}

/// Process-wide, readable and writable token slot.
///
/// Cloning shares the slot. Empty or whitespace-only tokens count as absent.
#[derive(Debug, Clone, Default)]
pub struct SharedCredential {
    token: Arc<RwLock<Option<String>>>,
}

impl SharedCredential {
    pub fn new(token: Option<String>) -> Self {
        let credential = Self::default();
        if let Some(token) = token {
            credential.set(token);
        }
        credential
    }

    /// Replace the stored token.
    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        let trimmed = token.trim();
        *self.token.write() = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }

    /// Forget the stored token (logout).
    pub fn clear(&self) {
        *self.token.write() = None;
    }

    pub fn is_present(&self) -> bool {
        self.token.read().is_some()
    }
}

impl CredentialProvider for SharedCredential {
    fn current(&self) -> Option<String> {
        self.token.read().clone()
    }
}
