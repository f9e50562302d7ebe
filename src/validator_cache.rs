use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::RwLock;

/// A rewritten object body together with the validator (ETag) the backend
/// reported for the original content.
#[derive(Clone, Debug, PartialEq, Eq)]
struct CacheEntry {
    body: Bytes,
    validator: String,
}

/// Statistics about the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ValidatorCacheStatistics {
    pub len: usize,
    pub size: usize,
}

/// In-memory map from request key to the last body served for it and the
/// backend validator that body corresponds to.
///
/// Entries are only ever replaced as a whole, so a reader never observes the
/// body of one `put` paired with the validator of another. There is no
/// eviction: the population is limited to the rewrite-eligible index keys of a
/// single bucket.
#[derive(Default)]
pub struct ValidatorCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ValidatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever is stored for `key`.
    pub async fn put(&self, key: &str, body: Bytes, validator: String) {
        let entry = CacheEntry { body, validator };
        let mut entries = self.entries.write().await;
        entries.insert(key.to_owned(), entry);
    }

    /// Returns the stored body and validator for `key`, or an empty body and
    /// an empty validator when nothing is stored.
    pub async fn get(&self, key: &str) -> (Bytes, String) {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) => (entry.body.clone(), entry.validator.clone()),
            None => (Bytes::new(), String::new()),
        }
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    #[inline]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    #[inline]
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn statistics(&self) -> ValidatorCacheStatistics {
        let entries = self.entries.read().await;
        ValidatorCacheStatistics {
            len: entries.len(),
            size: entries.values().map(|entry| entry.body.len()).sum(),
        }
    }
}
