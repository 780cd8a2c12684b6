//! Server Record
//!
//! The value advertised by one server instance and stored under its lease key.
//! The JSON field names (`ip`, `livetick`) match the payloads written by
//! existing advertisers; `address` and `heartbeat` are accepted on decode.

use crate::key::lease_key;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid server record: {0}")]
    Json(#[from] serde_json::Error),
}

/// One advertised server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Service name, shared by all instances of the same service
    pub name: String,
    /// Address the instance listens on
    #[serde(rename = "ip", alias = "address")]
    pub address: String,
    pub port: u16,
    /// Free-form labels, order preserved, duplicates allowed
    #[serde(default)]
    pub tags: Vec<String>,
    /// UNIX seconds of the last push
    #[serde(rename = "livetick", alias = "heartbeat", default)]
    pub heartbeat: i64,
}

impl Record {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
            tags: Vec::new(),
            heartbeat: 0,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Lease key for this instance under `prefix`.
    pub fn lease_key(&self, prefix: &str) -> String {
        lease_key(prefix, &self.name, &self.address, self.port)
    }

    /// Stamp the heartbeat with the current time.
    pub fn touch(&mut self) {
        self.heartbeat = chrono::Utc::now().timestamp();
    }

    pub fn encode(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(data: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_keeps_fields() {
        let mut record = Record::new("gateway", "10.0.0.7", 8080).with_tags(["web", "edge", "web"]);
        record.touch();
        let stamped = record.heartbeat;

        let decoded = Record::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.heartbeat, stamped);
        assert_eq!(decoded.tags, vec!["web", "edge", "web"]);
    }

    #[test]
    fn test_touch_uses_current_time() {
        let before = chrono::Utc::now().timestamp();
        let mut record = Record::new("a", "127.0.0.1", 1);
        record.touch();
        let after = chrono::Utc::now().timestamp();
        assert!(record.heartbeat >= before && record.heartbeat <= after);
    }

    #[test]
    fn test_wire_field_names() {
        let record = Record::new("db", "10.1.1.1", 5432).with_tag("primary");
        let value: serde_json::Value = serde_json::from_str(&record.encode().unwrap()).unwrap();
        assert_eq!(value["ip"], "10.1.1.1");
        assert_eq!(value["livetick"], 0);
        assert_eq!(value["tags"][0], "primary");
    }

    #[test]
    fn test_decode_accepts_aliases_and_defaults() {
        let record =
            Record::decode(r#"{"name":"db","address":"10.1.1.1","port":5432,"heartbeat":42}"#)
                .unwrap();
        assert_eq!(record.address, "10.1.1.1");
        assert_eq!(record.heartbeat, 42);
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(Record::decode("not json").is_err());
        assert!(Record::decode(r#"{"name":"db","ip":"x"}"#).is_err());
        assert!(Record::decode(r#"{"name":"db","ip":"x","port":70000}"#).is_err());
    }

    #[test]
    fn test_lease_key_from_record() {
        let record = Record::new("auth", "192.168.0.2", 443);
        assert_eq!(record.lease_key("SK"), "SK_auth_192.168.0.2:443");
    }
}
