//! Single-use transaction tokens.
//!
//! A [`Token`] is minted by a store on lookup and spent by the matching
//! update. It carries a weak back-reference identifying the minting store
//! (tokens never keep a store alive) and an opaque payload only that store
//! can interpret. Tokens are deliberately not `Clone`: one lookup, one
//! token, at most one commit.

use std::any::Any;
use std::fmt;
use std::ptr;
use std::sync::Weak;

use crate::error::Error;
use crate::store::LeaseStore;

/// Transaction handle tying an update back to the lookup that prepared it.
///
/// A default-constructed token is "zero": never minted, invalid, owned by
/// no one. Invalidation is sticky; a spent token cannot be revived.
#[derive(Default)]
pub struct Token {
    owner: Option<Weak<dyn LeaseStore>>,
    value: Option<Box<dyn Any + Send + Sync>>,
}

impl Token {
    /// Mints a token for `owner` with a payload of the owner's choosing.
    pub fn new(owner: Weak<dyn LeaseStore>, value: impl Any + Send + Sync) -> Self {
        Self {
            owner: Some(owner),
            value: Some(Box::new(value)),
        }
    }

    /// Whether the token is minted and not yet invalidated.
    pub fn valid(&self) -> bool {
        self.owner.is_some()
    }

    /// Whether `store` minted this token.
    ///
    /// Compares store identity by address. Zero and invalidated tokens are
    /// owned by no one, and a token outliving its store loses its owner.
    pub fn is_owned_by(&self, store: &dyn LeaseStore) -> bool {
        let Some(owner) = &self.owner else {
            return false;
        };
        owner.strong_count() > 0 && ptr::addr_eq(owner.as_ptr(), store as *const dyn LeaseStore)
    }

    /// The opaque payload, if the token is minted.
    pub fn value(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.value.as_deref()
    }

    /// Makes the token unusable. Idempotent and safe on zero tokens.
    ///
    /// The first call hands the token to the owning store's `release_token`
    /// before clearing the back-reference.
    pub fn invalidate(&mut self) {
        let Some(owner) = &self.owner else {
            return;
        };
        if let Some(store) = owner.upgrade() {
            store.release_token(self);
        }
        self.owner = None;
    }

    /// Invalidates the token and returns an error carrying that fact.
    ///
    /// Token-family errors pass through unchanged; anything else is wrapped
    /// in [`Error::TokenInvalidated`].
    pub fn invalidate_with_error(&mut self, error: Error) -> Error {
        self.invalidate();
        if error.is_token_error() {
            error
        } else {
            Error::TokenInvalidated(Box::new(error))
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("valid", &self.valid())
            .finish_non_exhaustive()
    }
}
