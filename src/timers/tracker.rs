use std::collections::{BTreeMap, BTreeSet};

use crate::element::window::BoundedWindow;
use crate::time::domain::{TimeDomain, Timestamp};
use crate::timers::record::TimerRecord;

/// (family-or-id, dynamic-tag) cell a modification lands in.
type TimerCell = (String, String);

/// Entry in the per-domain fire-order index.
type OrderedEntry = (Timestamp, String, String);

/// Timer modifications accumulated for one (user key, window) pair during
/// a bundle.
///
/// The cell map is last-write-wins; the ordered index tracks only live
/// (non-cleared) records so earlier-firing timers can be drained in fire
/// order when a later timer is delivered.
#[derive(Debug)]
pub struct BundleModifications<K> {
    modified: BTreeMap<TimerCell, TimerRecord<K>>,
    ordered_event_time: BTreeSet<OrderedEntry>,
    ordered_processing_time: BTreeSet<OrderedEntry>,
}

impl<K> Default for BundleModifications<K> {
    fn default() -> Self {
        BundleModifications {
            modified: BTreeMap::new(),
            ordered_event_time: BTreeSet::new(),
            ordered_processing_time: BTreeSet::new(),
        }
    }
}

impl<K: Clone + PartialEq> BundleModifications<K> {
    fn ordered_mut(&mut self, domain: TimeDomain) -> &mut BTreeSet<OrderedEntry> {
        match domain {
            TimeDomain::EventTime => &mut self.ordered_event_time,
            TimeDomain::ProcessingTime => &mut self.ordered_processing_time,
        }
    }

    /// Records a set or clear, superseding any earlier modification of the
    /// same cell.
    pub fn record(&mut self, family_or_id: &str, domain: TimeDomain, record: TimerRecord<K>) {
        let cell = (family_or_id.to_string(), record.dynamic_tag.clone());
        if let Some(old) = self.modified.get(&cell) {
            if !old.cleared {
                let stale = (old.fire_timestamp, cell.0.clone(), cell.1.clone());
                self.ordered_mut(domain).remove(&stale);
            }
        }
        if !record.cleared {
            self.ordered_mut(domain)
                .insert((record.fire_timestamp, cell.0.clone(), cell.1.clone()));
        }
        self.modified.insert(cell, record);
    }

    /// Overwrites a cell with a tombstone without touching the fire-order
    /// index; used while draining, where the index entry was already
    /// removed by the pop.
    pub fn insert_tombstone(&mut self, family_or_id: &str, record: TimerRecord<K>) {
        let cell = (family_or_id.to_string(), record.dynamic_tag.clone());
        self.modified.insert(cell, record);
    }

    /// Removes and returns the earliest live record in the domain with a
    /// fire timestamp at or before `bound`.
    pub fn pop_earlier(
        &mut self,
        domain: TimeDomain,
        bound: Timestamp,
    ) -> Option<(String, TimerRecord<K>)> {
        let entry = {
            let ordered = self.ordered_mut(domain);
            let first = ordered.iter().next()?.clone();
            if first.0 > bound {
                return None;
            }
            ordered.remove(&first);
            first
        };
        let cell = (entry.1.clone(), entry.2.clone());
        let record = self.modified.get(&cell)?.clone();
        Some((entry.1, record))
    }

    /// Whether a later modification of the same cell differs from `record`.
    pub fn superseded(&self, family_or_id: &str, record: &TimerRecord<K>) -> bool {
        let cell = (family_or_id.to_string(), record.dynamic_tag.clone());
        match self.modified.get(&cell) {
            Some(current) => current != record,
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.modified.is_empty()
    }
}

/// Buffers timer modifications made during a bundle, keyed by the user key
/// and window they were set under, and flushes the surviving records at
/// bundle finish.
#[derive(Debug)]
pub struct TimerBundleTracker<K> {
    groups: BTreeMap<(K, BoundedWindow), BundleModifications<K>>,
}

impl<K> Default for TimerBundleTracker<K> {
    fn default() -> Self {
        TimerBundleTracker {
            groups: BTreeMap::new(),
        }
    }
}

impl<K: Clone + Ord> TimerBundleTracker<K> {
    pub fn new() -> Self {
        TimerBundleTracker {
            groups: BTreeMap::new(),
        }
    }

    /// Records a modification for the (key, window) the timer was set under.
    pub fn record(
        &mut self,
        key: &K,
        window: &BoundedWindow,
        family_or_id: &str,
        domain: TimeDomain,
        record: TimerRecord<K>,
    ) {
        self.group_mut(key, window).record(family_or_id, domain, record);
    }

    pub fn group_mut(&mut self, key: &K, window: &BoundedWindow) -> &mut BundleModifications<K> {
        self.groups
            .entry((key.clone(), window.clone()))
            .or_default()
    }

    /// Drains every buffered modification as (family-or-id, record) pairs
    /// in deterministic key/window/cell order. Cleared records are emitted
    /// as tombstones.
    pub fn take_outputs(&mut self) -> Vec<(String, TimerRecord<K>)> {
        let groups = std::mem::take(&mut self.groups);
        let mut out = Vec::new();
        for (_, modifications) in groups {
            for ((family_or_id, _tag), record) in modifications.modified {
                out.push((family_or_id, record));
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(BundleModifications::is_empty)
    }
}
