//! Etcd Lease Store
//!
//! Expiring writes are puts attached to a freshly granted etcd lease. Each
//! call runs on its own clone of the client handle, so no worker keeps
//! connection state between cycles.

use super::{LeaseStore, StoreError};
use crate::config::StoreConfig;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use etcd_client::{Client, GetOptions, PutOptions, Txn, TxnOp, TxnOpResponse};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Default `--max-txn-ops` of an etcd server
const MAX_TXN_OPS: usize = 128;

#[derive(Clone)]
pub struct EtcdStore {
    client: Client,
}

impl EtcdStore {
    /// Connect to etcd with exponential backoff
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let backoff = ExponentialBackoff {
            initial_interval: config.backoff_initial,
            max_interval: config.backoff_max,
            max_elapsed_time: Some(config.backoff_max_elapsed),
            multiplier: config.backoff_multiplier,
            ..Default::default()
        };

        let endpoints = config.endpoints.clone();
        let client = retry(backoff, || async {
            match Client::connect(&endpoints, None).await {
                Ok(client) => {
                    debug!(endpoints = ?endpoints, "Connected to etcd");
                    Ok(client)
                }
                Err(e) => {
                    warn!(error = %e, "etcd connection failed, retrying");
                    Err(backoff::Error::transient(e))
                }
            }
        })
        .await
        .map_err(|e| anyhow!("Failed to connect to etcd after retries: {:?}", e))?;

        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn handle(&self) -> Client {
        self.client.clone()
    }
}

/// Etcd lease TTLs are whole seconds; round up so a sub-second TTL still
/// grants a live lease.
fn lease_seconds(ttl: Duration) -> i64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    i64::try_from(secs.max(1)).unwrap_or(i64::MAX)
}

/// Revoke a granted lease whose put failed so it does not linger until its
/// TTL runs out. The put error is what the caller sees.
async fn revoke_on_error<T, R, F>(
    result: Result<T, etcd_client::Error>,
    revoke: R,
) -> Result<T, StoreError>
where
    R: FnOnce() -> F,
    F: Future<Output = Result<(), etcd_client::Error>>,
{
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            if let Err(revoke_err) = revoke().await {
                warn!(error = %revoke_err, "Failed to revoke orphaned lease");
            }
            Err(e.into())
        }
    }
}

#[async_trait]
impl LeaseStore for EtcdStore {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut client = self.handle();
        let options = GetOptions::new().with_prefix().with_keys_only();
        let resp = client.get(prefix, Some(options)).await?;

        let mut keys = Vec::with_capacity(resp.kvs().len());
        for kv in resp.kvs() {
            match kv.key_str() {
                Ok(key) => keys.push(key.to_string()),
                Err(e) => warn!(error = %e, "Skipping non UTF-8 lease key"),
            }
        }

        trace!(prefix = %prefix, key_count = keys.len(), "Listed lease keys");
        Ok(keys)
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        let mut client = self.handle();
        let mut values = Vec::with_capacity(keys.len());

        for chunk in keys.chunks(MAX_TXN_OPS) {
            let ops: Vec<TxnOp> = chunk
                .iter()
                .map(|key| TxnOp::get(key.as_str(), None))
                .collect();
            let resp = client.txn(Txn::new().and_then(ops)).await?;

            let responses = resp.op_responses();
            if responses.len() != chunk.len() {
                return Err(StoreError::Unavailable(format!(
                    "etcd returned {} results for {} reads",
                    responses.len(),
                    chunk.len()
                )));
            }

            for op in responses {
                let value = match op {
                    TxnOpResponse::Get(get) => get
                        .kvs()
                        .first()
                        .and_then(|kv| kv.value_str().ok())
                        .map(str::to_string),
                    _ => None,
                };
                values.push(value);
            }
        }

        Ok(values)
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut client = self.handle();
        let lease = client.lease_grant(lease_seconds(ttl), None).await?;
        let lease_id = lease.id();
        let options = PutOptions::new().with_lease(lease_id);
        let put = client.put(key, value, Some(options)).await;
        revoke_on_error(put, || async move {
            client.lease_revoke(lease_id).await.map(|_| ())
        })
        .await?;

        trace!(key = %key, lease_id = lease_id, ttl = lease.ttl(), "Lease written");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut client = self.handle();
        client.delete(key, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_lease_seconds_rounds_up() {
        assert_eq!(lease_seconds(Duration::from_secs(30)), 30);
        assert_eq!(lease_seconds(Duration::from_millis(1500)), 2);
        assert_eq!(lease_seconds(Duration::ZERO), 1);
    }

    #[tokio::test]
    async fn test_failed_put_revokes_lease() {
        let revoked = AtomicBool::new(false);
        let put: Result<(), etcd_client::Error> =
            Err(etcd_client::Error::InvalidArgs("put refused".to_string()));

        let result = revoke_on_error(put, || async {
            revoked.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(StoreError::Etcd(_))));
        assert!(revoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_successful_put_keeps_lease() {
        let revoked = AtomicBool::new(false);
        let result = revoke_on_error(Ok(7), || async {
            revoked.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert!(!revoked.load(Ordering::SeqCst));
    }
}
