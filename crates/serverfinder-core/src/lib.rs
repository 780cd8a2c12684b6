//! Core shared types for serverfinder
//!
//! Server records, the lease key and wire format shared by advertisers and
//! watchers, and the indexed container that answers name/tag queries against
//! the last fetched snapshot.

pub mod filter;
pub mod index;
pub mod key;
pub mod record;

pub use filter::Filter;
pub use index::ServerIndex;
pub use key::{key_prefix, lease_key, DEFAULT_KEY_PREFIX};
pub use record::{CodecError, Record};
