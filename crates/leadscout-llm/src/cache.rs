use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// In-process TTL cache keyed by `(operation, message_text, rule_prompt)`
/// (§4.2). Process-local and lost on restart by design — correctness never
/// depends on a hit, only throughput (§5).
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (V, Instant)>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn key(operation: &str, message_text: &str, rule_prompt: &str) -> String {
        format!("{operation}:{message_text}:{rule_prompt}")
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut guard = self.entries.lock().unwrap();
        match guard.get(key) {
            Some((value, inserted_at)) if inserted_at.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                guard.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, value: V) {
        self.entries.lock().unwrap().insert(key, (value, Instant::now()));
    }

    /// Drop every entry whose key was built from `rule_prompt`. Keying the
    /// cache on the prompt already makes stale entries unreachable once the
    /// prompt changes; this just reclaims the memory instead of waiting on
    /// the TTL (§4.5 policy-change semantics).
    pub fn invalidate_prompt(&self, rule_prompt: &str) {
        let suffix = format!(":{rule_prompt}");
        self.entries.lock().unwrap().retain(|k, _| !k.ends_with(&suffix));
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_entries_are_not_returned() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_millis(0));
        let key = TtlCache::<i32>::key("classify", "hello", "match all");
        cache.insert(key.clone(), 42);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn invalidate_prompt_drops_only_matching_entries() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_secs(3600));
        let key_a = TtlCache::<i32>::key("classify", "hello", "prompt a");
        let key_b = TtlCache::<i32>::key("classify", "hello", "prompt b");
        cache.insert(key_a.clone(), 1);
        cache.insert(key_b.clone(), 2);

        cache.invalidate_prompt("prompt a");

        assert_eq!(cache.get(&key_a), None);
        assert_eq!(cache.get(&key_b), Some(2));
    }
}
