//! Push Worker
//!
//! Keeps this process's own lease alive: the record is re-stamped and written
//! under its lease key with a TTL on every cycle, and deleted when the worker
//! stops. If the process dies without stopping, the lease simply expires.

use crate::config::PushConfig;
use crate::lifecycle::{StateCell, TimerTask, WorkerState};
use crate::observability::{events, metrics};
use crate::store::{LeaseStore, StoreError};
use serverfinder_core::{CodecError, Record};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum PushError {
    #[error("encoding server record failed: {0}")]
    Encode(#[from] CodecError),
    #[error("writing lease failed: {0}")]
    Write(#[from] StoreError),
}

/// The lease owned by one Push Worker
struct Lease {
    store: Arc<dyn LeaseStore>,
    key: String,
    ttl: Duration,
    record: Mutex<Record>,
}

impl Lease {
    fn snapshot(&self) -> Record {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stamp the heartbeat and write the record. Returns the heartbeat written.
    async fn renew(&self) -> Result<i64, PushError> {
        let (heartbeat, payload) = {
            let mut record = self.record.lock().unwrap_or_else(PoisonError::into_inner);
            record.touch();
            (record.heartbeat, record.encode()?)
        };

        self.store
            .set_with_expiry(&self.key, &payload, self.ttl)
            .await?;
        Ok(heartbeat)
    }

    /// One logged, metered renewal as run by the worker loop
    #[instrument(skip(self), fields(key = %self.key), level = "debug")]
    async fn run_cycle(&self) {
        match self.renew().await {
            Ok(heartbeat) => {
                metrics::record_push("ok");
                events::lease_renewed(&self.key, heartbeat, self.ttl.as_secs());
            }
            Err(e) => {
                metrics::record_push("error");
                events::lease_renew_failed(&self.key, &e.to_string());
            }
        }
    }

    /// Best-effort deregistration.
    async fn release(&self) {
        let ok = match self.store.delete(&self.key).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(key = %self.key, error = %e, "Lease delete failed");
                false
            }
        };
        events::lease_released(&self.key, ok);
    }
}

/// Lease advertiser for one server instance, not yet started
pub struct PushWorker {
    store: Arc<dyn LeaseStore>,
    config: PushConfig,
    record: Record,
    state: StateCell,
}

impl PushWorker {
    pub fn new(store: Arc<dyn LeaseStore>, config: PushConfig) -> Self {
        Self {
            store,
            config,
            record: Record::new("", "", 0),
            state: StateCell::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.record.name = name.into();
        self
    }

    pub fn address(mut self, address: impl Into<String>, port: u16) -> Self {
        self.record.address = address.into();
        self.record.port = port;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.record.tags.push(tag.into());
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn lease_key(&self) -> String {
        self.record.lease_key(&self.config.key_prefix)
    }

    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    /// Write the lease once, then renew it every `interval` in the
    /// background until stopped.
    pub async fn start(self) -> PushHandle {
        let lease = Arc::new(Lease {
            key: self.lease_key(),
            store: self.store,
            ttl: self.config.ttl,
            record: Mutex::new(self.record),
        });

        info!(
            key = %lease.key,
            ttl_secs = lease.ttl.as_secs_f64(),
            interval_secs = self.config.interval.as_secs_f64(),
            "Starting push worker"
        );
        self.state.set(WorkerState::Running);

        lease.run_cycle().await;

        let cycle_lease = lease.clone();
        let exit_lease = lease.clone();
        let task = TimerTask::spawn(
            "push",
            self.config.interval,
            self.state,
            move || {
                let lease = cycle_lease.clone();
                async move { lease.run_cycle().await }
            },
            move || async move { exit_lease.release().await },
        );

        PushHandle { lease, task }
    }
}

/// A running Push Worker
pub struct PushHandle {
    lease: Arc<Lease>,
    task: TimerTask,
}

impl PushHandle {
    pub fn lease_key(&self) -> &str {
        &self.lease.key
    }

    /// The record as last written, including its heartbeat.
    pub fn record(&self) -> Record {
        self.lease.snapshot()
    }

    pub fn state(&self) -> WorkerState {
        self.task.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.task.subscribe()
    }

    /// Stop renewing and delete the lease. Waits for a renewal in flight to
    /// finish; the delete is the last store call the worker makes.
    pub async fn stop(self) {
        self.task.stop().await;
    }
}
