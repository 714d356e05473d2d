//! In-memory lease storage.
//!
//! This is the reference [`LeaseStore`] backend: a process-local table from
//! [`ClientId`] to that client's leases, with optimistic concurrency control
//! and scheduled garbage collection. Nothing is persisted.
//!
//! # Locking
//!
//! Two levels of locks with a fixed order:
//!
//! - `records` ([`RwLock`]) guards the map topology only — adding or
//!   removing entries. Inner values reached through a record's `Arc` are
//!   updated without it.
//! - Each record's [`Mutex`] guards that record's `(revision, leases)` pair.
//!
//! A record lock may be taken while holding the map lock, never the reverse.
//! Expiration callbacks run on their own tasks, outside both.
//!
//! # Revisions
//!
//! Every record carries a revision stamp drawn from a store-wide atomic
//! counter. Zero is reserved to mean "no leases"; any successful update or
//! reap bumps the record to a fresh non-zero value, which is what invalidates
//! every other outstanding token for that client. Records removed from the
//! map are stamped with a tombstone revision on the way out, so an update
//! still holding one from its read phase cannot commit into it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::clientid::ClientId;
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::lease::Lease;
use crate::store::LeaseStore;
use crate::token::Token;

/// Work budget handed to the scheduled sweep: reap everything reapable.
const MAX_EXPIRE_BATCH: usize = usize::MAX;

/// Revision stamped on records as they are removed from the map.
///
/// An update racing the cleanup pass may already hold the record's `Arc`
/// from its read phase. Left at revision 0, such a record would still match
/// a token minted against the emptied entry, and the update would commit
/// into storage no longer reachable from the map. The tombstone can never
/// equal a token's captured revision, so those updates fail the revision
/// check and report a concurrent update instead.
const TOMBSTONE_REVISION: u64 = u64::MAX;

/// Payload minted into tokens issued by [`TransientStore`].
#[derive(Debug, Clone)]
struct TokenValue {
    /// The client the token was issued for, so it cannot be aimed elsewhere.
    cid: ClientId,
    /// The record revision observed at lookup time. Zero for absent records.
    revision: u64,
}

#[derive(Debug, Default)]
struct RecordInner {
    /// Zero iff `leases` is empty; then the record is a cleanup candidate.
    /// Records removed from the map carry [`TOMBSTONE_REVISION`] instead.
    revision: u64,
    leases: Vec<Lease>,
}

impl RecordInner {
    fn reset(&mut self) {
        self.leases = Vec::new();
        self.revision = 0;
    }
}

/// Per-client row. Entries are created once and mostly mutated in place;
/// removal is left to the deferred cleanup pass.
#[derive(Debug)]
struct Record {
    inner: Mutex<RecordInner>,
}

impl Record {
    fn new(revision: u64, leases: Vec<Lease>) -> Self {
        Self {
            inner: Mutex::new(RecordInner { revision, leases }),
        }
    }
}

/// Concurrency-safe in-memory lease table.
///
/// Constructed with [`TransientStore::new`], which also launches the
/// background expiration ticker. The ticker holds only a weak reference, so
/// dropping the last `Arc` ends it.
#[derive(Debug)]
pub struct TransientStore {
    records: RwLock<HashMap<ClientId, Arc<Record>>>,
    /// Source for record revisions. Only ever moves through atomic
    /// increments; the value 0 is reserved.
    current_rev: AtomicU64,
    grace: TimeDelta,
    self_ref: Weak<TransientStore>,
}

impl TransientStore {
    /// Creates an empty store and starts its expiration ticker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: &StoreConfig) -> Arc<Self> {
        let store = Arc::new_cyclic(|weak| Self {
            records: RwLock::new(HashMap::new()),
            current_rev: AtomicU64::new(1),
            grace: config.expire_grace(),
            self_ref: weak.clone(),
        });

        tokio::spawn(Self::expire_task(
            Arc::downgrade(&store),
            config.expire_period(),
        ));

        store
    }

    fn next_revision(&self) -> u64 {
        let mut revision = self.current_rev.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        while revision == 0 {
            // 2^64 rollover: 0 stays reserved for empty records.
            revision = self.current_rev.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        }
        revision
    }

    /// Reaps expired leases until at least `work_amount` have been removed,
    /// bounded by what is actually reapable.
    ///
    /// A lease is reapable once its deadline is more than the configured
    /// grace in the past. Every reaped lease's expire action has run to
    /// completion by the time this returns. Emptied records are not removed
    /// here; that is punted to a background pass whose completion handle is
    /// returned, since it needs the map-wide write lock.
    pub async fn expire(&self, work_amount: usize) -> (usize, JoinHandle<()>) {
        let cutoff = Utc::now() - self.grace;
        let mut cleanup_candidates = Vec::new();
        let mut callbacks = Vec::new();
        let mut cleaned = 0;

        let records = self.records.read().await;
        for (cid, record) in records.iter() {
            let mut inner = record.inner.lock().await;
            if inner.revision == 0 {
                // Already empty, only needs the map-level cleanup.
                cleanup_candidates.push(cid.clone());
                continue;
            }

            // Fast path: nothing expired, nothing allocated. On the first
            // expired lease, switch to rebuilding the survivor list from the
            // prefix already passed over.
            let mut survivors: Option<Vec<Lease>> = None;
            for (index, lease) in inner.leases.iter().enumerate() {
                if lease.expired_before(cutoff) {
                    if let Some(action) = &lease.expire_action {
                        let action = Arc::clone(action);
                        let elements = lease.elements.clone();
                        let expired_at = lease.expire;
                        callbacks.push(tokio::spawn(async move {
                            action(elements, expired_at);
                        }));
                    }
                    if survivors.is_none() {
                        survivors = Some(inner.leases[..index].to_vec());
                    }
                    cleaned += 1;
                } else if let Some(survivors) = survivors.as_mut() {
                    survivors.push(lease.clone());
                }
            }

            if let Some(survivors) = survivors {
                if survivors.is_empty() {
                    inner.reset();
                    cleanup_candidates.push(cid.clone());
                } else {
                    inner.leases = survivors;
                    inner.revision = self.next_revision();
                }
            }
            drop(inner);

            if cleaned >= work_amount {
                break;
            }
        }
        drop(records);

        debug!(cleaned, "expired leases");

        let deferred = match self.self_ref.upgrade() {
            Some(store) => tokio::spawn(async move {
                store.cleanup(cleanup_candidates).await;
            }),
            // Store is mid-drop; there is no map left worth compacting.
            None => tokio::spawn(async {}),
        };

        // Wait for the callbacks so "reaped" implies "callback observed".
        for callback in callbacks {
            let _ = callback.await;
        }

        (cleaned, deferred)
    }

    /// Removes emptied records from the map.
    ///
    /// Candidates are re-checked under both locks: an entry resurrected by a
    /// concurrent update keeps its place. Removed records are tombstoned
    /// before their lock is released, so an update that fetched the record
    /// ahead of the removal cannot commit into it.
    async fn cleanup(&self, candidates: Vec<ClientId>) {
        let mut records = self.records.write().await;
        for cid in candidates {
            let Some(record) = records.get(&cid).cloned() else {
                continue;
            };
            let mut inner = record.inner.lock().await;
            if inner.revision != 0 {
                continue;
            }
            records.remove(&cid);
            inner.revision = TOMBSTONE_REVISION;
        }
    }

    /// Snapshots the whole table, for administrative inspection.
    ///
    /// Each entry is internally consistent, but entries are captured one at a
    /// time: the aggregate may mix states from different instants.
    pub async fn dump(&self) -> HashMap<ClientId, Vec<Lease>> {
        let mut out = HashMap::new();
        let records = self.records.read().await;
        for (cid, record) in records.iter() {
            let inner = record.inner.lock().await;
            out.insert(cid.clone(), inner.leases.clone());
        }
        out
    }

    async fn expire_task(store: Weak<TransientStore>, period: Duration) {
        let mut schedule = tokio::time::interval(period);
        schedule.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of an interval completes immediately; the first
        // sweep should wait a full period.
        schedule.tick().await;

        loop {
            schedule.tick().await;
            let Some(store) = store.upgrade() else {
                break;
            };
            let _ = store.expire(MAX_EXPIRE_BATCH).await;
        }
    }
}

#[async_trait]
impl LeaseStore for TransientStore {
    async fn lookup(&self, cid: &ClientId) -> Result<(Vec<Lease>, Token)> {
        let record = self.records.read().await.get(cid).cloned();

        let mut leases = Vec::new();
        let mut revision = 0;
        if let Some(record) = record {
            // Snapshot leases and revision together for a consistent view.
            let inner = record.inner.lock().await;
            leases = inner.leases.clone();
            revision = inner.revision;
        }

        let owner: Weak<dyn LeaseStore> = self.self_ref.clone();
        let token = Token::new(
            owner,
            TokenValue {
                cid: cid.clone(),
                revision,
            },
        );
        Ok((leases, token))
    }

    async fn update(&self, cid: &ClientId, new_leases: Vec<Lease>, token: &mut Token) -> Result<()> {
        if !token.valid() {
            return Err(Error::TokenAlreadyInvalid);
        }
        if !token.is_owned_by(self) {
            return Err(Error::TokenForeign);
        }

        let value = token
            .value()
            .and_then(|value| value.downcast_ref::<TokenValue>())
            .cloned();
        let Some(value) = value else {
            error!(%cid, "token issued from this store carries a foreign payload");
            return Err(token.invalidate_with_error(Error::TokenCorrupt));
        };
        if value.cid != *cid {
            return Err(Error::TokenClientMismatch);
        }

        let previous = self.records.read().await.get(cid).cloned();

        if let Some(record) = previous {
            let mut inner = record.inner.lock().await;
            // Any update since the lookup bumped the revision; reject so the
            // caller restarts from a fresh snapshot.
            if inner.revision != value.revision {
                return Err(token.invalidate_with_error(Error::ConcurrentUpdate));
            }

            if new_leases.is_empty() {
                // Deletion: the entry stays in the map for the cleanup pass.
                inner.reset();
            } else {
                inner.leases = new_leases;
                inner.revision = self.next_revision();
            }
        } else {
            if value.revision != 0 {
                // The token observed leases that have since been reaped away.
                return Err(token.invalidate_with_error(Error::ConcurrentUpdate));
            }

            let mut records = self.records.write().await;
            // The read lock was released before taking the write lock, so the
            // entry may have been created in between.
            if records.contains_key(cid) {
                return Err(token.invalidate_with_error(Error::ConcurrentUpdate));
            }
            records.insert(
                cid.clone(),
                Arc::new(Record::new(self.next_revision(), new_leases)),
            );
        }

        token.invalidate();
        Ok(())
    }

    // Tokens hold no per-token resources in this backend.
    fn release_token(&self, _token: &Token) {}
}
