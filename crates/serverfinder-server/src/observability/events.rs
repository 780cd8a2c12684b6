//! Structured Events
//!
//! One function per event type so field names stay consistent across the
//! pull and push workers.
//!
//! Event types:
//! - `snapshot_replaced` - Pull cycle swapped in a new snapshot
//! - `pull_cycle_failed` - Pull cycle aborted, previous snapshot kept
//! - `record_skipped` - One stored value could not be decoded
//! - `lease_renewed` - Push cycle wrote the lease
//! - `lease_renew_failed` - Push cycle could not write the lease
//! - `lease_released` - Lease deleted on stop

use tracing::{debug, info, warn};

/// Emit a snapshot replaced event
pub fn snapshot_replaced(key_count: usize, record_count: usize, skipped: usize, generation: u64) {
    debug!(
        event_type = "snapshot_replaced",
        key_count = key_count,
        record_count = record_count,
        skipped = skipped,
        generation = generation,
        "Server snapshot replaced"
    );
}

/// Emit a pull cycle failed event
pub fn pull_cycle_failed(prefix: &str, stage: &str, error: &str) {
    warn!(
        event_type = "pull_cycle_failed",
        prefix = %prefix,
        stage = %stage,
        error = %error,
        "Pull cycle failed, keeping previous snapshot"
    );
}

/// Emit a record skipped event
pub fn record_skipped(key: &str, error: &str) {
    warn!(
        event_type = "record_skipped",
        key = %key,
        error = %error,
        "Skipping undecodable server record"
    );
}

/// Emit a lease renewed event
pub fn lease_renewed(key: &str, heartbeat: i64, ttl_secs: u64) {
    debug!(
        event_type = "lease_renewed",
        key = %key,
        heartbeat = heartbeat,
        ttl_secs = ttl_secs,
        "Lease renewed"
    );
}

/// Emit a lease renew failed event
pub fn lease_renew_failed(key: &str, error: &str) {
    warn!(
        event_type = "lease_renew_failed",
        key = %key,
        error = %error,
        "Lease renewal failed, retrying next cycle"
    );
}

/// Emit a lease released event
pub fn lease_released(key: &str, ok: bool) {
    info!(
        event_type = "lease_released",
        key = %key,
        ok = ok,
        "Lease released"
    );
}
