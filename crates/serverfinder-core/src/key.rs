//! Lease key derivation
//!
//! Full key format: `{prefix}_{name}_{address}:{port}`. Every key a watcher
//! lists starts with `{prefix}_`.

/// Prefix token used when none is configured.
pub const DEFAULT_KEY_PREFIX: &str = "SK";

/// Build the lease key for one server instance.
pub fn lease_key(prefix: &str, name: &str, address: &str, port: u16) -> String {
    format!("{prefix}_{name}_{address}:{port}")
}

/// Listing prefix matching every lease key under `prefix`.
pub fn key_prefix(prefix: &str) -> String {
    format!("{prefix}_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_key_format() {
        assert_eq!(
            lease_key(DEFAULT_KEY_PREFIX, "gateway", "10.0.0.7", 8080),
            "SK_gateway_10.0.0.7:8080"
        );
    }

    #[test]
    fn test_lease_key_matches_listing_prefix() {
        let key = lease_key("svc", "auth", "127.0.0.1", 9000);
        assert!(key.starts_with(&key_prefix("svc")));
        assert!(!key.starts_with(&key_prefix("sv")));
    }
}
