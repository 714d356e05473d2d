//! The capability surface offered by lease storage backends.

use async_trait::async_trait;

use crate::clientid::ClientId;
use crate::error::Result;
use crate::lease::Lease;
use crate::token::Token;

/// A store that tracks the leases currently bound to each client.
///
/// The lookup/update pair forms an optimistic transaction: `lookup` snapshots
/// the client's leases and mints a single-use [`Token`] pinning the observed
/// state, and `update` commits a replacement lease set only if that state is
/// still current. A rejected update spends the token; the caller restarts
/// from `lookup` (use [`crate::Error::is_token_error`] to tell restartable
/// rejections apart from caller mistakes).
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Fetches the leases for a client and prepares an update to them.
    ///
    /// The returned leases are a point-in-time snapshot; later store mutation
    /// never shows through it.
    async fn lookup(&self, cid: &ClientId) -> Result<(Vec<Lease>, Token)>;

    /// Replaces the leases for a client, consuming the token on commit.
    ///
    /// An empty `leases` set deletes the client's bindings. On a concurrent
    /// modification the token is invalidated and the whole transaction must
    /// be restarted; some rejections (a foreign or mis-aimed token) leave the
    /// token alive so the caller can correct the call and retry.
    async fn update(&self, cid: &ClientId, leases: Vec<Lease>, token: &mut Token) -> Result<()>;

    /// Frees any backend resources associated with an issued token.
    ///
    /// Called whenever a token is invalidated, including from within `update`.
    /// Must tolerate repeated and concurrent calls for the same token.
    fn release_token(&self, token: &Token);
}
