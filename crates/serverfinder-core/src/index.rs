//! Indexed Server Container
//!
//! Holds the latest full snapshot of records together with two lookup
//! indices (name -> positions, tag -> positions). A snapshot and the indices
//! built from it live in one bundle behind a single `RwLock`, so readers
//! always see a matching pair. The bundle is only ever replaced whole.

use crate::filter::Filter;
use crate::record::Record;
use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use tracing::trace;

/// Snapshot plus the indices built against it
#[derive(Debug, Default)]
struct Snapshot {
    records: Vec<Record>,
    by_name: HashMap<String, Vec<usize>>,
    by_tag: HashMap<String, Vec<usize>>,
    generation: u64,
}

impl Snapshot {
    fn build(records: Vec<Record>, generation: u64) -> Self {
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_tag: HashMap<String, Vec<usize>> = HashMap::new();

        for (pos, record) in records.iter().enumerate() {
            by_name.entry(record.name.clone()).or_default().push(pos);
            for tag in &record.tags {
                by_tag.entry(tag.clone()).or_default().push(pos);
            }
        }

        Self {
            records,
            by_name,
            by_tag,
            generation,
        }
    }

    fn query(&self, filters: &[Filter]) -> Vec<Record> {
        let mut name_group: Option<Vec<usize>> = None;
        let mut tag_group: Option<BTreeSet<usize>> = None;

        for filter in filters {
            match filter {
                // Not deduplicated: repeating a name repeats its records.
                Filter::Name(name) => {
                    let group = name_group.get_or_insert_with(Vec::new);
                    if let Some(positions) = self.by_name.get(name) {
                        group.extend_from_slice(positions);
                    }
                }
                Filter::Tag(tag) => {
                    let group = tag_group.get_or_insert_with(BTreeSet::new);
                    if let Some(positions) = self.by_tag.get(tag) {
                        group.extend(positions.iter().copied());
                    }
                }
            }
        }

        let mut positions: Vec<usize> = match (name_group, tag_group) {
            (None, None) => return Vec::new(),
            (Some(names), None) => names,
            (None, Some(tags)) => tags.into_iter().collect(),
            (Some(names), Some(tags)) => names
                .into_iter()
                .filter(|pos| tags.contains(pos))
                .collect(),
        };
        positions.sort_unstable();

        positions
            .into_iter()
            .filter_map(|pos| self.records.get(pos).cloned())
            .collect()
    }
}

/// Thread-safe container answering name/tag queries against the current
/// snapshot. Any number of readers proceed together; `replace` is exclusive.
#[derive(Debug, Default)]
pub struct ServerIndex {
    inner: RwLock<Snapshot>,
}

impl ServerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        // A poisoned lock still guards a complete bundle: writers swap it in one move.
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap in a new snapshot, rebuilding both indices against it.
    ///
    /// Indices are built before the write lock is taken so readers are only
    /// blocked for the swap itself.
    pub fn replace(&self, records: Vec<Record>) {
        let count = records.len();
        let mut snapshot = Snapshot::build(records, 0);

        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        snapshot.generation = guard.generation + 1;
        *guard = snapshot;

        trace!(
            record_count = count,
            generation = guard.generation,
            "Server snapshot replaced"
        );
    }

    /// Copy of the full current snapshot, in snapshot order.
    pub fn all(&self) -> Vec<Record> {
        self.read().records.clone()
    }

    /// Records matching `filters`, in snapshot order.
    ///
    /// Within the name group and within the tag group filters are OR'ed;
    /// across groups they are AND'ed. Tag matches are deduplicated, name
    /// matches are not. No filters yields no records.
    pub fn query(&self, filters: &[Filter]) -> Vec<Record> {
        self.read().query(filters)
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of completed replacements. Zero until the first `replace`.
    pub fn generation(&self) -> u64 {
        self.read().generation
    }
}
