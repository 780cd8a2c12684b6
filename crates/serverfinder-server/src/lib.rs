//! Serverfinder Server Library
//!
//! Lease-based service discovery: Push Workers keep a TTL lease per server
//! instance alive in a shared store, Pull Workers periodically snapshot every
//! live lease into a queryable [`ServerIndex`].

pub mod api;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod pull;
pub mod push;
pub mod store;

pub use config::{parse_endpoints, DiscoveryConfig, PullConfig, PushConfig, StoreConfig};
pub use lifecycle::WorkerState;
pub use pull::{fetch_once, CycleReport, PullError, PullHandle, PullWorker};
pub use push::{PushError, PushHandle, PushWorker};
pub use serverfinder_core::{Filter, Record, ServerIndex};
pub use store::{EtcdStore, LeaseStore, MemoryStore, StoreError};
