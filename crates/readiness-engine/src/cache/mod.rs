//! Report cache: a byte-oriented get/set capability with TTLs, plus the
//! time-bucket rounding that lets concurrent requests share an entry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};

use crate::errors::Result;

/// Default lifetime for cached reports when no rounding factor is set.
const DEFAULT_TTL: Duration = Duration::from_secs(4 * 60 * 60);

/// Floor for derived TTLs so a request near a bucket boundary still caches.
const MIN_TTL: Duration = Duration::from_secs(60);

/// Byte cache for expensive report artifacts. Entries are immutable once
/// written; concurrent readers are safe.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
}

/// Process-local cache used in tests and single-node deployments.
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (Instant, Vec<u8>)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for InMemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some((expires, value)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), (Instant::now() + ttl, value));
        Ok(())
    }
}

/// Round a timestamp down to the nearest multiple of `factor_secs` since
/// the epoch. Zero factor is the identity.
pub fn round_down(now: DateTime<Utc>, factor_secs: u64) -> DateTime<Utc> {
    if factor_secs == 0 {
        return now;
    }
    let secs = now.timestamp();
    let factor = factor_secs as i64;
    let rounded = secs - secs.rem_euclid(factor);
    Utc.timestamp_opt(rounded, 0).single().unwrap_or(now)
}

/// TTL for an entry written at `now`: the remainder of the current rounding
/// bucket, so every request in a bucket shares one entry and the entry dies
/// with the bucket.
pub fn ttl_for(now: DateTime<Utc>, factor_secs: u64) -> Duration {
    if factor_secs == 0 {
        return DEFAULT_TTL;
    }
    let bucket_start = round_down(now, factor_secs);
    let elapsed = (now - bucket_start).num_seconds().max(0) as u64;
    Duration::from_secs(factor_secs.saturating_sub(elapsed)).max(MIN_TTL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn get_returns_what_was_set() {
        let cache = InMemoryCache::new();
        cache
            .set("k", b"payload".to_vec(), Duration::from_secs(60))
            .unwrap();
        assert_eq!(cache.get("k").unwrap(), Some(b"payload".to_vec()));
        assert_eq!(cache.get("missing").unwrap(), None);
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = InMemoryCache::new();
        cache.set("k", vec![1], Duration::from_millis(5)).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("k").unwrap(), None);
    }

    #[test]
    fn rounding_buckets_share_a_floor() {
        let a = Utc.with_ymd_and_hms(2026, 3, 1, 10, 7, 13).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 3, 1, 10, 52, 40).unwrap();
        assert_eq!(round_down(a, 3600), round_down(b, 3600));
        assert_eq!(
            round_down(a, 3600),
            Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(round_down(a, 0), a);
    }

    #[test]
    fn ttl_covers_the_rest_of_the_bucket() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 1, 40).unwrap();
        assert_eq!(ttl_for(now, 3600), Duration::from_secs(3500));
        assert_eq!(ttl_for(now, 0), DEFAULT_TTL);
        // Near the end of a bucket the floor applies.
        let late = Utc.with_ymd_and_hms(2026, 3, 1, 10, 59, 58).unwrap();
        assert_eq!(ttl_for(late, 3600), MIN_TTL);
    }
}
