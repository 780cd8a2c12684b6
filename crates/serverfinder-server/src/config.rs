//! Discovery Configuration
//!
//! Explicit configuration handed to the store client and to each worker, with
//! environment variable overrides. Nothing here is validated: zero intervals
//! or empty identifiers are passed through as given.

use serverfinder_core::DEFAULT_KEY_PREFIX;
use std::time::Duration;

/// Connection target and retry settings for the lease store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Etcd endpoints (env: ETCD_ENDPOINTS, comma-separated)
    pub endpoints: Vec<String>,

    /// Initial interval for connection retry
    pub backoff_initial: Duration,

    /// Maximum interval for connection retry
    pub backoff_max: Duration,

    /// Maximum elapsed time for connection retries
    pub backoff_max_elapsed: Duration,

    /// Multiplier for connection backoff
    pub backoff_multiplier: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoints: vec!["http://127.0.0.1:2379".to_string()],
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(10),
            backoff_max_elapsed: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

/// Settings for a Pull Worker
#[derive(Debug, Clone)]
pub struct PullConfig {
    /// Lease key prefix token (env: LEASE_KEY_PREFIX)
    pub key_prefix: String,

    /// Delay between fetch cycles (env: PULL_INTERVAL_SECS)
    pub interval: Duration,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            interval: Duration::from_secs(10),
        }
    }
}

/// Settings for a Push Worker
///
/// `interval` should be well below `ttl` so the lease is renewed at least
/// once per lease window.
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Lease key prefix token (env: LEASE_KEY_PREFIX)
    pub key_prefix: String,

    /// Lease time-to-live (env: LEASE_TTL_SECS)
    pub ttl: Duration,

    /// Delay between lease renewals (env: PUSH_INTERVAL_SECS)
    pub interval: Duration,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            ttl: Duration::from_secs(30),
            interval: Duration::from_secs(10),
        }
    }
}

/// Top-level configuration for one serverfinder process
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub store: StoreConfig,
    pub pull: PullConfig,
    pub push: PushConfig,

    /// HTTP listen address for the watch API (env: BIND_ADDR)
    pub bind_addr: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            pull: PullConfig::default(),
            push: PushConfig::default(),
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Split a comma-separated endpoint list, dropping blank entries.
pub fn parse_endpoints(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl DiscoveryConfig {
    /// Create configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(endpoints) = lookup("ETCD_ENDPOINTS") {
            config.store.endpoints = parse_endpoints(&endpoints);
        }

        if let Some(prefix) = lookup("LEASE_KEY_PREFIX") {
            config.pull.key_prefix = prefix.clone();
            config.push.key_prefix = prefix;
        }

        if let Some(secs) = lookup("PULL_INTERVAL_SECS").and_then(|v| v.parse::<u64>().ok()) {
            config.pull.interval = Duration::from_secs(secs);
        }

        if let Some(secs) = lookup("PUSH_INTERVAL_SECS").and_then(|v| v.parse::<u64>().ok()) {
            config.push.interval = Duration::from_secs(secs);
        }

        if let Some(secs) = lookup("LEASE_TTL_SECS").and_then(|v| v.parse::<u64>().ok()) {
            config.push.ttl = Duration::from_secs(secs);
        }

        if let Some(bind_addr) = lookup("BIND_ADDR") {
            config.bind_addr = bind_addr;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.pull.interval, Duration::from_secs(10));
        assert_eq!(config.push.interval, Duration::from_secs(10));
        assert_eq!(config.push.ttl, Duration::from_secs(30));
        assert_eq!(config.pull.key_prefix, "SK");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ETCD_ENDPOINTS", "http://a:2379, http://b:2379"),
            ("LEASE_KEY_PREFIX", "SVC"),
            ("PULL_INTERVAL_SECS", "3"),
            ("LEASE_TTL_SECS", "not-a-number"),
        ]);
        let config = DiscoveryConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.store.endpoints, vec!["http://a:2379", "http://b:2379"]);
        assert_eq!(config.pull.key_prefix, "SVC");
        assert_eq!(config.push.key_prefix, "SVC");
        assert_eq!(config.pull.interval, Duration::from_secs(3));
        assert_eq!(config.push.ttl, Duration::from_secs(30));
    }

    #[test]
    fn test_parse_endpoints_drops_blanks() {
        assert_eq!(parse_endpoints("http://a:2379,"), vec!["http://a:2379"]);
        assert_eq!(parse_endpoints(" , http://b:2379 ,,"), vec!["http://b:2379"]);
        assert!(parse_endpoints("").is_empty());
    }
}
