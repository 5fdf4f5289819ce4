//! Short-lived cache for admin listing responses, keyed by a prefix plus the
//! request path and query. Mutations drop every key under a prefix.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Slots {
    entries: HashMap<String, (Instant, Value)>,
    // Bumped on every invalidation of a prefix.
    generations: HashMap<String, u64>,
}

#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    slots: RwLock<Slots>,
}

fn prefix_of(key: &str) -> &str {
    key.split_once(':').map_or(key, |(prefix, _)| prefix)
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        ResponseCache {
            ttl,
            slots: RwLock::new(Slots::default()),
        }
    }

    pub fn key(prefix: &str, uri: &axum::http::Uri) -> String {
        let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("");
        format!("{}:{}", prefix, path)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        if self.ttl.is_zero() {
            return None;
        }
        let slots = self.slots.read();
        slots
            .entries
            .get(key)
            .filter(|(stored, _)| stored.elapsed() < self.ttl)
            .map(|(_, value)| value.clone())
    }

    /// Current generation of `prefix`. Take it before loading a value and
    /// pass it to [`ResponseCache::insert_at`].
    pub fn generation(&self, prefix: &str) -> u64 {
        self.slots.read().generations.get(prefix).copied().unwrap_or(0)
    }

    pub fn insert(&self, key: String, value: Value) {
        let generation = self.generation(prefix_of(&key));
        self.insert_at(key, generation, value);
    }

    /// Stores `value` unless its prefix was invalidated after `generation`
    /// was read.
    pub fn insert_at(&self, key: String, generation: u64, value: Value) {
        if self.ttl.is_zero() {
            return;
        }
        let mut slots = self.slots.write();
        let current = slots.generations.get(prefix_of(&key)).copied().unwrap_or(0);
        if current != generation {
            return;
        }
        let ttl = self.ttl;
        slots.entries.retain(|_, (stored, _)| stored.elapsed() < ttl);
        slots.entries.insert(key, (Instant::now(), value));
    }

    pub fn invalidate(&self, prefixes: &[&str]) {
        let mut slots = self.slots.write();
        for prefix in prefixes {
            *slots.generations.entry(prefix.to_string()).or_default() += 1;
        }
        slots.entries.retain(|key, _| !prefixes.iter().any(|p| *p == prefix_of(key)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invalidation_is_scoped_to_prefix() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.insert("users:/api/admin/users".into(), json!([1]));
        cache.insert("analytics-users:/api/admin/analytics/users".into(), json!([2]));
        cache.invalidate(&["users"]);
        assert!(cache.get("users:/api/admin/users").is_none());
        assert_eq!(cache.get("analytics-users:/api/admin/analytics/users"), Some(json!([2])));
    }

    #[test]
    fn zero_ttl_disables_caching() {
        let cache = ResponseCache::new(Duration::ZERO);
        cache.insert("users:/x".into(), json!(1));
        assert!(cache.get("users:/x").is_none());
    }

    #[test]
    fn load_that_straddles_invalidation_is_not_stored() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let before = cache.generation("donations");
        // a mutation lands while the listing is being loaded
        cache.invalidate(&["donations"]);
        cache.insert_at("donations:/api/admin/donations".into(), before, json!(["stale"]));
        assert!(cache.get("donations:/api/admin/donations").is_none());

        let now = cache.generation("donations");
        cache.insert_at("donations:/api/admin/donations".into(), now, json!(["fresh"]));
        assert_eq!(cache.get("donations:/api/admin/donations"), Some(json!(["fresh"])));
    }
}
