//! Session cache of the viewer's own tag sets.
//!
//! Entries expire after a TTL and are dropped on the next write; the
//! dispatcher overwrites them optimistically and corrects them from the
//! store after every action.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use affinity_core::{PairKey, TagSet};

#[derive(Debug, Clone)]
struct CacheEntry {
    tags: TagSet,
    stored_at: Instant,
}

/// TTL-bounded map of viewer → target tag sets.
#[derive(Clone)]
pub struct TagCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<PairKey, CacheEntry>>>,
}

impl TagCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached tags, if stored within the TTL.
    pub async fn get(&self, pair: PairKey) -> Option<TagSet> {
        let entries = self.entries.read().await;
        entries
            .get(&pair)
            .filter(|e| e.stored_at.elapsed() < self.ttl)
            .map(|e| e.tags.clone())
    }

    /// Store a set, dropping any entries that have expired.
    pub async fn put(&self, pair: PairKey, tags: TagSet) {
        let mut entries = self.entries.write().await;
        let ttl = self.ttl;
        entries.retain(|_, e| e.stored_at.elapsed() < ttl);
        entries.insert(
            pair,
            CacheEntry {
                tags,
                stored_at: Instant::now(),
            },
        );
    }

    pub async fn invalidate(&self, pair: PairKey) {
        self.entries.write().await.remove(&pair);
    }

    /// Drop expired entries. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.stored_at.elapsed() < self.ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for TagCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(affinity_core::defaults::CACHE_TTL_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use affinity_core::{Tag, UserId};

    fn pair() -> PairKey {
        PairKey::new(UserId(1), UserId(2))
    }

    #[tokio::test]
    async fn test_put_get() {
        let cache = TagCache::new(Duration::from_secs(60));
        assert!(cache.get(pair()).await.is_none());
        cache.put(pair(), TagSet::from([Tag::Like])).await;
        assert_eq!(cache.get(pair()).await, Some(TagSet::from([Tag::Like])));
        assert!(cache.get(pair().reversed()).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = TagCache::new(Duration::from_secs(5));
        cache.put(pair(), TagSet::from([Tag::Approve])).await;

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(cache.get(pair()).await.is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get(pair()).await.is_none());
        assert_eq!(cache.purge_expired().await, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_drops_expired_entries() {
        let cache = TagCache::new(Duration::from_secs(5));
        for target in 2..6 {
            cache
                .put(PairKey::new(UserId(1), UserId(target)), TagSet::new())
                .await;
        }
        assert_eq!(cache.len().await, 4);

        tokio::time::advance(Duration::from_secs(6)).await;
        cache.put(pair(), TagSet::from([Tag::Hot])).await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(pair()).await, Some(TagSet::from([Tag::Hot])));
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = TagCache::default();
        cache.put(pair(), TagSet::new()).await;
        assert_eq!(cache.len().await, 1);
        cache.invalidate(pair()).await;
        assert!(cache.get(pair()).await.is_none());
    }
}
