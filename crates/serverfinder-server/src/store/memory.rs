//! In-process lease store
//!
//! Expiry follows the tokio clock, so paused-time tests can step through
//! lease windows.

use super::{LeaseStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// TTL key-value map with switchable outages
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    reachable: AtomicBool,
    readable: AtomicBool,
    writable: AtomicBool,
}

/// Deadline used when `now + ttl` does not fit the clock
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            reachable: AtomicBool::new(true),
            readable: AtomicBool::new(true),
            writable: AtomicBool::new(true),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While unreachable every operation fails with `StoreError::Unavailable`.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Release);
    }

    /// While not readable, `multi_get` fails with `StoreError::Unavailable`
    /// but listing keeps working.
    pub fn set_readable(&self, readable: bool) {
        self.readable.store(readable, Ordering::Release);
    }

    /// While not writable, writes and deletes fail with `StoreError::Rejected`.
    pub fn set_writable(&self, writable: bool) {
        self.writable.store(writable, Ordering::Release);
    }

    /// Store a raw value without going through a worker.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        self.lock().insert(
            key.into(),
            Entry {
                value: value.into(),
                expires_at,
            },
        );
    }

    /// Live value under `key`, bypassing outage simulation.
    pub fn peek(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.lock()
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.reachable.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".to_string()))
        }
    }

    fn check_readable(&self) -> Result<(), StoreError> {
        self.check_reachable()?;
        if self.readable.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store reads failing".to_string()))
        }
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        self.check_reachable()?;
        if self.writable.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Rejected("memory store read-only".to_string()))
        }
    }

    fn purge_expired(entries: &mut HashMap<String, Entry>) {
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
    }
}

#[async_trait]
impl LeaseStore for MemoryStore {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check_reachable()?;
        let mut entries = self.lock();
        Self::purge_expired(&mut entries);

        let mut keys: Vec<String> = entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        self.check_readable()?;
        let mut entries = self.lock();
        Self::purge_expired(&mut entries);

        Ok(keys
            .iter()
            .map(|key| entries.get(key).map(|entry| entry.value.clone()))
            .collect())
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        self.insert_raw(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let store = MemoryStore::new();
        store
            .set_with_expiry("SK_a_h:1", "v", Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(store.list_keys("SK_").await.unwrap(), vec!["SK_a_h:1"]);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(store.list_keys("SK_").await.unwrap().is_empty());
        assert_eq!(store.peek("SK_a_h:1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rewrite_extends_lease() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(30);
        store.set_with_expiry("k", "1", ttl).await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;
        store.set_with_expiry("k", "2", ttl).await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(store.peek("k").as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_multi_get_marks_missing_keys() {
        let store = MemoryStore::new();
        store.insert_raw("a", "1", Duration::from_secs(60));
        let keys = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            store.multi_get(&keys).await.unwrap(),
            vec![Some("1".to_string()), None]
        );
    }

    #[tokio::test]
    async fn test_list_keys_filters_by_prefix() {
        let store = MemoryStore::new();
        store.insert_raw("SK_a", "1", Duration::from_secs(60));
        store.insert_raw("OTHER_b", "2", Duration::from_secs(60));
        assert_eq!(store.list_keys("SK_").await.unwrap(), vec!["SK_a"]);
    }

    #[tokio::test]
    async fn test_outages() {
        let store = MemoryStore::new();
        store.set_reachable(false);
        assert!(matches!(
            store.list_keys("").await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_reachable(true);

        store.set_writable(false);
        assert!(matches!(
            store.set_with_expiry("k", "v", Duration::from_secs(1)).await,
            Err(StoreError::Rejected(_))
        ));
        assert!(store.list_keys("").await.is_ok());
    }

    #[tokio::test]
    async fn test_read_failure_leaves_listing_working() {
        let store = MemoryStore::new();
        store.insert_raw("SK_a", "1", Duration::from_secs(60));
        store.set_readable(false);

        assert_eq!(store.list_keys("SK_").await.unwrap(), vec!["SK_a"]);
        assert!(matches!(
            store.multi_get(&["SK_a".to_string()]).await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_ttl_does_not_overflow() {
        let store = MemoryStore::new();
        store
            .set_with_expiry("k", "v", Duration::from_secs(u64::MAX))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(365 * 24 * 60 * 60)).await;
        assert_eq!(store.peek("k").as_deref(), Some("v"));
    }
}
