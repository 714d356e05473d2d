//! Lease values held by the store.
//!
//! A [`Lease`] binds one or more IP networks to a client until an absolute
//! deadline. Leases are plain values: [`ipnet::IpNet`] elements are `Copy`,
//! so cloning a lease yields a snapshot that shares no element storage with
//! the original. The optional expiration callback and the owning plugin tag
//! are shared by reference across clones, matching how they are consumed.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ipnet::IpNet;

/// Callback invoked when a lease is reaped by the expiration sweep.
///
/// Receives the lease's elements and its original deadline. Runs on its own
/// task, never under a store lock; errors are the callback's own concern.
pub type ExpireAction = Arc<dyn Fn(Vec<IpNet>, DateTime<Utc>) + Send + Sync>;

/// Identity tag for the plugin that installed a lease.
///
/// Handles compare by identity, not by name: two plugins configured with the
/// same name remain distinct owners. Cloning a handle yields the same
/// identity.
#[derive(Debug, Clone)]
pub struct PluginHandle(Arc<str>);

impl PluginHandle {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl PartialEq for PluginHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for PluginHandle {}

/// A single binding of IP networks to a client.
#[derive(Clone)]
pub struct Lease {
    /// The networks handed out under this lease. A single lease may bundle
    /// several prefixes, e.g. an IA carrying multiple addresses.
    pub elements: Vec<IpNet>,

    /// Absolute deadline after which the lease may be reaped.
    pub expire: DateTime<Utc>,

    /// The plugin that installed this lease. Informational: consumed by
    /// callers and expire actions for filtering, never enforced on updates.
    pub owner: Option<PluginHandle>,

    /// Invoked once when the expiration sweep reaps this lease.
    pub expire_action: Option<ExpireAction>,
}

impl Lease {
    pub fn new(elements: Vec<IpNet>, expire: DateTime<Utc>) -> Self {
        Self {
            elements,
            expire,
            owner: None,
            expire_action: None,
        }
    }

    /// Whether the lease's deadline falls before `cutoff`.
    pub fn expired_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.expire < cutoff
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("elements", &self.elements)
            .field("expire", &self.expire)
            .field("owner", &self.owner)
            .field("expire_action", &self.expire_action.as_ref().map(|_| ".."))
            .finish()
    }
}
