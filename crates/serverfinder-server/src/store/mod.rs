//! Lease Store
//!
//! The key-value store both worker kinds rendezvous through. Any store with
//! prefix listing, batch reads, expiring writes and deletes will do:
//! - `etcd`: production backend on etcd leases
//! - `memory`: in-process TTL map for tests and local runs

mod etcd;
mod memory;

pub use etcd::EtcdStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("etcd error: {0}")]
    Etcd(#[from] etcd_client::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store rejected write: {0}")]
    Rejected(String),
}

/// Operations the discovery workers need from a lease store
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Keys currently stored under `prefix`.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Values for `keys`, position for position. Missing or expired keys
    /// yield `None`.
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError>;

    /// Write `value` under `key`, replacing any previous value. The entry
    /// disappears after `ttl` unless written again.
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
