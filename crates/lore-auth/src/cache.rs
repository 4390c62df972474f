//! The resolver's credential cache (§4.2): hash → row, with a 60 s TTL and
//! a 10 000-entry cap. On overflow the oldest half (by insertion timestamp)
//! is evicted in one pass, mirroring the source's `_key_cache` eviction
//! policy but as an explicitly-owned, constructor-injected component rather
//! than a module-level global (§9).

use std::time::{Duration, Instant};

use dashmap::DashMap;
use lore_core::Credential;

pub const DEFAULT_TTL_SECONDS: u64 = 60;
pub const MAX_ENTRIES: usize = 10_000;

struct Entry {
    credential: Credential,
    cached_at: Instant,
}

pub struct CredentialCache {
    entries: DashMap<String, Entry>,
    ttl: Duration,
    max_entries: usize,
}

impl CredentialCache {
    pub fn new(ttl_seconds: u64, max_entries: usize) -> Self {
        Self { entries: DashMap::new(), ttl: Duration::from_secs(ttl_seconds), max_entries }
    }

    pub fn get(&self, hash: &str) -> Option<Credential> {
        let entry = self.entries.get(hash)?;
        if entry.cached_at.elapsed() > self.ttl {
            drop(entry);
            self.entries.remove(hash);
            return None;
        }
        Some(entry.credential.clone())
    }

    pub fn insert(&self, hash: String, credential: Credential) {
        if self.entries.len() >= self.max_entries {
            self.evict_oldest_half();
        }
        self.entries.insert(hash, Entry { credential, cached_at: Instant::now() });
    }

    /// Synchronous invalidation — revocation must never leave a stale
    /// entry reachable, even for the remainder of the TTL (§4.2).
    pub fn invalidate(&self, hash: &str) {
        self.entries.remove(hash);
    }

    fn evict_oldest_half(&self) {
        let mut by_age: Vec<(String, Instant)> =
            self.entries.iter().map(|e| (e.key().clone(), e.value().cached_at)).collect();
        by_age.sort_by_key(|(_, cached_at)| *cached_at);
        let evict_count = by_age.len() / 2;
        for (hash, _) in by_age.into_iter().take(evict_count) {
            self.entries.remove(&hash);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for CredentialCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_SECONDS, MAX_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lore_core::{LoreId, Role};

    fn sample(hash: &str) -> Credential {
        Credential {
            id: LoreId::new(),
            tenant: LoreId::new(),
            name: "test".into(),
            hash: hash.into(),
            prefix: "lore_sk_dead".into(),
            project: None,
            role: Role::Writer,
            is_root: false,
            created_at: chrono::Utc::now(),
            last_used_at: None,
            revoked_at: None,
        }
    }

    #[test]
    fn hit_then_invalidate_then_miss() {
        let cache = CredentialCache::new(60, 100);
        cache.insert("h1".into(), sample("h1"));
        assert!(cache.get("h1").is_some());
        cache.invalidate("h1");
        assert!(cache.get("h1").is_none());
    }

    #[test]
    fn expired_entries_are_treated_as_misses() {
        let cache = CredentialCache::new(0, 100);
        cache.insert("h1".into(), sample("h1"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("h1").is_none());
    }

    #[test]
    fn overflow_evicts_roughly_half() {
        let cache = CredentialCache::new(60, 10);
        for i in 0..10 {
            cache.insert(format!("h{i}"), sample(&format!("h{i}")));
        }
        assert_eq!(cache.len(), 10);
        cache.insert("h10".into(), sample("h10"));
        assert!(cache.len() <= 6);
    }
}
