// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-through cache of uploaded attachment ids.
//!
//! Maps `(scope, source URL)` to the id the platform assigned to the uploaded
//! media, so the same file is uploaded once per scope. The scope is the
//! application id for Messenger and the phone number id for WhatsApp.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::debug;

use crate::telemetry;

#[derive(Debug, Clone)]
struct CacheEntry {
    attachment_id: String,
    sequence: u64,
}

/// Capacity-bounded attachment id cache.
///
/// Entries never expire: platform attachment ids live as long as the asset.
/// Beyond capacity the oldest insertions are evicted. Two concurrent misses for
/// the same key may both upload; the last write wins.
#[derive(Debug)]
pub struct AttachmentCache {
    entries: DashMap<(String, String), CacheEntry>,
    capacity: usize,
    sequence: AtomicU64,
}

impl AttachmentCache {
    /// Creates a cache holding at most `capacity` ids.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            sequence: AtomicU64::new(0),
        }
    }

    /// Returns the cached id for `(scope, url)`.
    pub fn get(&self, scope: &str, url: &str) -> Option<String> {
        let hit = self
            .entries
            .get(&(scope.to_string(), url.to_string()))
            .map(|e| e.attachment_id.clone());
        telemetry::record_cache_lookup(hit.is_some());
        hit
    }

    /// Stores an id, replacing any previous value.
    pub fn insert(&self, scope: &str, url: &str, attachment_id: impl Into<String>) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            (scope.to_string(), url.to_string()),
            CacheEntry {
                attachment_id: attachment_id.into(),
                sequence,
            },
        );
        if self.entries.len() > self.capacity {
            self.evict_oldest();
        }
    }

    /// Returns the cached id, or runs `uploader` once and caches its result.
    ///
    /// Failed uploads are never cached: the next call uploads again.
    pub async fn get_or_upload<F, Fut, E>(
        &self,
        scope: &str,
        url: &str,
        uploader: F,
    ) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(id) = self.get(scope, url) {
            return Ok(id);
        }
        let id = uploader().await?;
        self.insert(scope, url, id.clone());
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Evicts a tenth of the capacity at once to amortize the scan.
    fn evict_oldest(&self) {
        let excess = self.entries.len().saturating_sub(self.capacity);
        let batch = excess.max(self.capacity / 10).max(1);
        let mut by_age: Vec<((String, String), u64)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().sequence))
            .collect();
        by_age.sort_by_key(|(_, seq)| *seq);
        for (key, _) in by_age.into_iter().take(batch) {
            self.entries.remove(&key);
        }
        debug!(evicted = batch, remaining = self.entries.len(), "attachment cache evicted");
    }
}
