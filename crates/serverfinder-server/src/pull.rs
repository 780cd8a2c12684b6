//! Pull Worker
//!
//! Keeps a [`ServerIndex`] warm by periodically listing every lease key,
//! batch-reading the values and swapping the decoded records in as the new
//! snapshot.
//!
//! Failure policy per cycle:
//! - listing or batch read fails: cycle aborted, previous snapshot kept
//! - no keys listed: snapshot replaced with an empty one
//! - a value fails to decode: that record is skipped, the cycle continues

use crate::config::PullConfig;
use crate::lifecycle::{StateCell, TimerTask, WorkerState};
use crate::observability::{events, metrics};
use crate::store::{LeaseStore, StoreError};
use serverfinder_core::{key_prefix, Record, ServerIndex};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, instrument, trace};

#[derive(Debug, Error)]
pub enum PullError {
    #[error("listing lease keys failed: {0}")]
    List(#[source] StoreError),
    #[error("reading lease values failed: {0}")]
    Fetch(#[source] StoreError),
}

impl PullError {
    fn stage(&self) -> &'static str {
        match self {
            Self::List(_) => "list_keys",
            Self::Fetch(_) => "multi_get",
        }
    }
}

/// Outcome of one successful fetch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// Keys returned by the listing
    pub key_count: usize,
    /// Records now in the snapshot
    pub record_count: usize,
    /// Values that expired between listing and reading
    pub missing: usize,
    /// Values that failed to decode
    pub skipped: usize,
}

/// Run one fetch cycle against `store` and replace `index` on success.
///
/// On error `index` is left untouched.
pub async fn fetch_once(
    store: &dyn LeaseStore,
    index: &ServerIndex,
    prefix: &str,
) -> Result<CycleReport, PullError> {
    let listing = key_prefix(prefix);
    let keys = store.list_keys(&listing).await.map_err(PullError::List)?;

    if keys.is_empty() {
        index.replace(Vec::new());
        return Ok(CycleReport::default());
    }

    let values = store.multi_get(&keys).await.map_err(PullError::Fetch)?;

    let mut report = CycleReport {
        key_count: keys.len(),
        ..CycleReport::default()
    };
    let mut records = Vec::with_capacity(values.len());

    for (key, value) in keys.iter().zip(values) {
        let Some(value) = value else {
            trace!(key = %key, "Lease expired before read");
            report.missing += 1;
            continue;
        };

        match Record::decode(&value) {
            Ok(record) => records.push(record),
            Err(e) => {
                events::record_skipped(key, &e.to_string());
                report.skipped += 1;
            }
        }
    }

    report.record_count = records.len();
    index.replace(records);
    Ok(report)
}

/// One logged, metered cycle as run by the worker loop
#[instrument(skip(store, index), level = "debug")]
async fn run_cycle(store: &dyn LeaseStore, index: &ServerIndex, prefix: &str) {
    let started = Instant::now();

    match fetch_once(store, index, prefix).await {
        Ok(report) => {
            metrics::record_pull_cycle("ok", started.elapsed());
            metrics::set_snapshot_records(report.record_count);
            metrics::record_skipped(report.skipped);
            events::snapshot_replaced(
                report.key_count,
                report.record_count,
                report.skipped,
                index.generation(),
            );
        }
        Err(e) => {
            metrics::record_pull_cycle("error", started.elapsed());
            events::pull_cycle_failed(prefix, e.stage(), &e.to_string());
        }
    }
}

/// Periodic snapshot refresher, not yet started
pub struct PullWorker {
    store: Arc<dyn LeaseStore>,
    config: PullConfig,
    index: Arc<ServerIndex>,
    state: StateCell,
}

impl PullWorker {
    pub fn new(store: Arc<dyn LeaseStore>, config: PullConfig) -> Self {
        Self {
            store,
            config,
            index: Arc::new(ServerIndex::new()),
            state: StateCell::new(),
        }
    }

    /// Feed an existing container instead of a fresh one.
    pub fn with_index(mut self, index: Arc<ServerIndex>) -> Self {
        self.index = index;
        self
    }

    pub fn index(&self) -> Arc<ServerIndex> {
        self.index.clone()
    }

    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    /// Run the first fetch cycle, then refresh every `interval` in the
    /// background until stopped.
    pub async fn start(self) -> PullHandle {
        info!(
            prefix = %self.config.key_prefix,
            interval_secs = self.config.interval.as_secs_f64(),
            "Starting pull worker"
        );
        self.state.set(WorkerState::Running);

        run_cycle(self.store.as_ref(), &self.index, &self.config.key_prefix).await;

        let store = self.store;
        let index = self.index.clone();
        let prefix = self.config.key_prefix.clone();

        let task = TimerTask::spawn(
            "pull",
            self.config.interval,
            self.state,
            move || {
                let store = store.clone();
                let index = index.clone();
                let prefix = prefix.clone();
                async move { run_cycle(store.as_ref(), &index, &prefix).await }
            },
            || async { info!("Pull worker stopped") },
        );

        PullHandle {
            index: self.index,
            task,
        }
    }
}

/// A running Pull Worker
pub struct PullHandle {
    index: Arc<ServerIndex>,
    task: TimerTask,
}

impl PullHandle {
    /// The container this worker keeps refreshed.
    pub fn index(&self) -> Arc<ServerIndex> {
        self.index.clone()
    }

    pub fn state(&self) -> WorkerState {
        self.task.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.task.subscribe()
    }

    /// Stop refreshing. Waits for a cycle in flight to finish; no cycle
    /// starts after this returns.
    pub async fn stop(self) {
        self.task.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serverfinder_core::Filter;
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(60);

    fn put(store: &MemoryStore, record: &Record) {
        store.insert_raw(record.lease_key("SK"), record.encode().unwrap(), TTL);
    }

    #[tokio::test]
    async fn test_fetch_decodes_all_listed_records() {
        let store = MemoryStore::new();
        put(&store, &Record::new("svc1", "10.0.0.1", 80).with_tag("web"));
        put(&store, &Record::new("svc2", "10.0.0.2", 80).with_tag("db"));
        store.insert_raw("OTHER_x", "ignored", TTL);

        let index = ServerIndex::new();
        let report = fetch_once(&store, &index, "SK").await.unwrap();

        assert_eq!(report.key_count, 2);
        assert_eq!(report.record_count, 2);
        assert_eq!(index.len(), 2);
        assert_eq!(index.query(&[Filter::tag("db")])[0].name, "svc2");
    }

    #[tokio::test]
    async fn test_undecodable_values_are_skipped() {
        let store = MemoryStore::new();
        put(&store, &Record::new("svc1", "10.0.0.1", 80));
        store.insert_raw("SK_broken_h:1", "{not json", TTL);

        let index = ServerIndex::new();
        let report = fetch_once(&store, &index, "SK").await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(index.all().len(), 1);
        assert_eq!(index.all()[0].name, "svc1");
    }

    #[tokio::test]
    async fn test_all_values_undecodable_clears_snapshot() {
        let store = MemoryStore::new();
        let index = ServerIndex::new();
        index.replace(vec![Record::new("old", "10.0.0.1", 1)]);
        store.insert_raw("SK_broken_h:1", "garbage", TTL);

        let report = fetch_once(&store, &index, "SK").await.unwrap();
        assert_eq!(report.skipped, 1);
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_empty_listing_clears_snapshot() {
        let store = MemoryStore::new();
        let index = ServerIndex::new();
        index.replace(vec![Record::new("old", "10.0.0.1", 1)]);

        fetch_once(&store, &index, "SK").await.unwrap();
        assert!(index.is_empty());
        assert_eq!(index.generation(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_store_keeps_snapshot() {
        let store = MemoryStore::new();
        let index = ServerIndex::new();
        let before = vec![Record::new("old", "10.0.0.1", 1).with_tag("t")];
        index.replace(before.clone());

        store.set_reachable(false);
        let err = fetch_once(&store, &index, "SK").await.unwrap_err();

        assert!(matches!(err, PullError::List(_)));
        assert_eq!(err.stage(), "list_keys");
        assert_eq!(index.all(), before);
        assert_eq!(index.generation(), 1);
    }

    #[tokio::test]
    async fn test_failed_batch_read_keeps_snapshot() {
        let store = MemoryStore::new();
        put(&store, &Record::new("svc1", "10.0.0.1", 80));
        let index = ServerIndex::new();
        let before = vec![Record::new("old", "10.0.0.9", 1)];
        index.replace(before.clone());

        store.set_readable(false);
        let err = fetch_once(&store, &index, "SK").await.unwrap_err();

        assert!(matches!(err, PullError::Fetch(_)));
        assert_eq!(err.stage(), "multi_get");
        assert_eq!(index.all(), before);
        assert_eq!(index.generation(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_refreshes_on_interval() {
        let store = Arc::new(MemoryStore::new());
        put(&store, &Record::new("svc1", "10.0.0.1", 80));

        let config = PullConfig {
            interval: Duration::from_secs(10),
            ..PullConfig::default()
        };
        let handle = PullWorker::new(store.clone(), config).start().await;
        let index = handle.index();
        assert_eq!(handle.state(), WorkerState::Running);
        assert_eq!(index.len(), 1);

        put(&store, &Record::new("svc2", "10.0.0.2", 80));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(index.len(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(index.len(), 2);

        let mut states = handle.subscribe();
        handle.stop().await;
        assert_eq!(*states.borrow_and_update(), WorkerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_survives_outage() {
        let store = Arc::new(MemoryStore::new());
        put(&store, &Record::new("svc1", "10.0.0.1", 80));

        let handle = PullWorker::new(store.clone(), PullConfig::default())
            .start()
            .await;
        let index = handle.index();

        store.set_reachable(false);
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(index.len(), 1);
        assert_eq!(index.generation(), 1);

        store.set_reachable(true);
        put(&store, &Record::new("svc2", "10.0.0.2", 80));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(index.len(), 2);

        handle.stop().await;
    }
}
