//! Binding records cached by (domain, did)

use super::types::BindingInfo;
use crate::Result;
use crate::cache::{CacheStats, LruStore};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BindingCacheKey {
    domain: String,
    did: i64,
}

/// Populated on store reads, invalidated on writes that move a did
#[derive(Debug)]
pub struct BindingCache {
    cache: LruStore<BindingCacheKey, BindingInfo>,
}

impl BindingCache {
    /// # Errors
    ///
    /// Returns error if capacity is zero
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            cache: LruStore::new(capacity)?,
        })
    }

    #[must_use]
    pub fn get(&self, domain: &str, did: i64) -> Option<BindingInfo> {
        self.cache.get(&BindingCacheKey {
            domain: domain.to_string(),
            did,
        })
    }

    pub fn set(&self, domain: &str, binding: BindingInfo) {
        let key = BindingCacheKey {
            domain: domain.to_string(),
            did: binding.did,
        };
        self.cache.set(key, binding);
    }

    pub fn delete(&self, domain: &str, did: i64) {
        self.cache.delete(&BindingCacheKey {
            domain: domain.to_string(),
            did,
        });
    }

    pub fn clear(&self) {
        tracing::info!(
            len = self.cache.len(),
            hit_ratio = self.cache.hit_ratio(),
            "clear binding cache"
        );
        self.cache.clear();
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(did: i64, device_id: &str) -> BindingInfo {
        BindingInfo {
            did,
            sub_domain: "flying".to_string(),
            device_id: device_id.to_string(),
            grant_token: None,
            grant_time: None,
        }
    }

    #[test]
    fn keyed_by_domain_and_did() {
        let cache = BindingCache::new(8).unwrap();
        cache.set("a", binding(1, "m1"));
        cache.set("b", binding(1, "m2"));

        assert_eq!(cache.get("a", 1).unwrap().device_id, "m1");
        assert_eq!(cache.get("b", 1).unwrap().device_id, "m2");
        assert!(cache.get("a", 2).is_none());

        cache.delete("a", 1);
        assert!(cache.get("a", 1).is_none());
        assert!(cache.get("b", 1).is_some());
    }
}
