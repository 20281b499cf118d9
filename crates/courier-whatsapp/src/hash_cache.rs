// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hashed user ids.
//!
//! Phone numbers are not handed to the bot engine: each sender is replaced by
//! a stable hash, resolved back to the number when answering. Entries expire
//! after a period without access, after which resolution fails instead of
//! guessing. Purged entries leave a tombstone behind so an expired hash keeps
//! reporting `Expired` rather than looking unknown.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use courier_core::CourierError;

const HASH_LEN: usize = 32;

/// Tombstones are kept this many TTLs past their last access.
const TOMBSTONE_TTLS: u32 = 24;

struct HashedId {
    /// `None` once purged.
    real_id: Option<String>,
    last_access: Instant,
}

/// Sliding-TTL map from hashed ids to real user ids.
pub struct ThreadHashCache {
    entries: DashMap<String, HashedId>,
    ttl: Duration,
}

impl std::fmt::Debug for ThreadHashCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadHashCache")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Hash of `real_id` for `phone_number_id`: the first 32 hex chars of
/// SHA-256 over `"{phone_number_id}:{real_id}"`.
pub fn hash_id(phone_number_id: &str, real_id: &str) -> String {
    let digest = Sha256::digest(format!("{phone_number_id}:{real_id}").as_bytes());
    let mut hashed = hex::encode(digest);
    hashed.truncate(HASH_LEN);
    hashed
}

impl ThreadHashCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Hashes `real_id` and records the mapping, refreshing its expiry.
    pub fn hash(&self, phone_number_id: &str, real_id: &str) -> String {
        let hashed = hash_id(phone_number_id, real_id);
        self.entries.insert(
            hashed.clone(),
            HashedId {
                real_id: Some(real_id.to_string()),
                last_access: Instant::now(),
            },
        );
        hashed
    }

    /// Resolves a hash to the real id, refreshing its expiry.
    ///
    /// Fails with `Expired` once the entry went unused for the TTL (purged
    /// or not), and with `NotFound` for a hash never seen or whose tombstone
    /// is gone.
    pub fn resolve(&self, hashed: &str) -> Result<String, CourierError> {
        let Some(mut entry) = self.entries.get_mut(hashed) else {
            return Err(CourierError::NotFound {
                kind: "hashed user id",
                id: hashed.to_string(),
            });
        };
        let now = Instant::now();
        let real_id = match &entry.real_id {
            Some(real_id) if now.duration_since(entry.last_access) < self.ttl => real_id.clone(),
            _ => {
                return Err(CourierError::Expired {
                    kind: "hashed user id",
                    id: hashed.to_string(),
                });
            }
        };
        entry.last_access = now;
        Ok(real_id)
    }

    /// Forgets the real id of expired entries and drops old tombstones.
    /// Returns how many real ids were forgotten.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let tombstone_ttl = self.ttl.saturating_mul(TOMBSTONE_TTLS);
        let mut forgotten = 0;
        self.entries.retain(|_, e| {
            let idle = now.duration_since(e.last_access);
            if e.real_id.is_none() {
                return idle < tombstone_ttl;
            }
            if idle >= self.ttl {
                e.real_id = None;
                forgotten += 1;
            }
            true
        });
        if forgotten > 0 {
            debug!(forgotten, "expired hashed ids purged");
        }
        forgotten
    }

    /// Number of hashes still resolvable to a real id.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.real_id.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Purges expired entries every `period` until `cancel` fires.
    pub fn spawn_purge(self: Arc<Self>, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Skip the first immediate tick.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.purge_expired();
                    }
                    _ = cancel.cancelled() => {
                        info!("hashed id purge shutting down");
                        break;
                    }
                }
            }
        })
    }
}
