// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU cache for transaction history first-page lookups.
//!
//! Caches the first page of each user's history to avoid repeated redb
//! reads for the most common query pattern.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use super::repository::transactions::UniversalTransaction;

/// A page of history and the cursor for the next one.
pub type HistoryPage = (Vec<UniversalTransaction>, Option<String>);

struct CacheEntry {
    limit: usize,
    page: HistoryPage,
    inserted_at: Instant,
}

/// In-process LRU cache keyed by user id.
pub struct TxCache {
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl TxCache {
    /// `capacity` is the number of users kept; zero is treated as one.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    /// Cached first page for `user_id`, if present, fresh and of the same size.
    pub fn get_first_page(&self, user_id: &str, limit: usize) -> Option<HistoryPage> {
        let mut cache = self.cache.lock().ok()?;
        let entry = cache.get(user_id)?;
        if entry.inserted_at.elapsed() < self.ttl {
            return (entry.limit == limit).then(|| entry.page.clone());
        }
        cache.pop(user_id);
        None
    }

    pub fn put_first_page(&self, user_id: &str, limit: usize, page: HistoryPage) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                user_id.to_string(),
                CacheEntry {
                    limit,
                    page,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    pub fn invalidate(&self, user_id: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Chain;

    fn sample_page() -> HistoryPage {
        let tx = UniversalTransaction::new_pending(
            "alice",
            None,
            "from",
            "to",
            "5",
            "SOL",
            Chain::Solana,
        );
        (vec![tx], None)
    }

    #[test]
    fn cache_put_and_get() {
        let cache = TxCache::new(10, Duration::from_secs(300));
        assert!(cache.get_first_page("alice", 20).is_none());

        cache.put_first_page("alice", 20, sample_page());
        let (txs, cursor) = cache.get_first_page("alice", 20).unwrap();
        assert_eq!(txs.len(), 1);
        assert!(cursor.is_none());

        // Different page size is a miss
        assert!(cache.get_first_page("alice", 50).is_none());
    }

    #[test]
    fn cache_invalidate() {
        let cache = TxCache::new(10, Duration::from_secs(300));
        cache.put_first_page("alice", 20, sample_page());
        cache.invalidate("alice");
        assert!(cache.get_first_page("alice", 20).is_none());
    }

    #[test]
    fn cache_ttl_expiry() {
        let cache = TxCache::new(10, Duration::from_millis(1));
        cache.put_first_page("alice", 20, sample_page());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get_first_page("alice", 20).is_none());
    }

    #[test]
    fn least_recent_user_is_evicted() {
        let cache = TxCache::new(1, Duration::from_secs(300));
        cache.put_first_page("alice", 20, sample_page());
        cache.put_first_page("bob", 20, sample_page());
        assert!(cache.get_first_page("alice", 20).is_none());
        assert!(cache.get_first_page("bob", 20).is_some());
    }
}
