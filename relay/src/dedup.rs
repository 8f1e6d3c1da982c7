//! Remembers which receivers have already been relayed for recently seen
//! payload telemetry documents.
use crate::document::Callsign;
use crate::metrics_defs::DEDUP_EVICTIONS;
use indexmap::IndexMap;
use parking_lot::Mutex;
use shared::counter;
use std::collections::BTreeSet;

pub const DEFAULT_WINDOW: usize = 30;
pub const MAX_WINDOW: usize = 1_000_000;

/// Tracks the receiver set of at most `window` document ids.
///
/// Entries are ordered by first sighting. Updating a tracked document does not
/// move it, so the document evicted is always the one that was first seen
/// longest ago, even if it is still receiving updates. A document that comes
/// back after eviction is treated as new and all of its receivers are
/// reported again.
pub struct DedupTracker {
    window: usize,
    entries: Mutex<IndexMap<String, BTreeSet<Callsign>>>,
}

impl DedupTracker {
    pub fn new(window: usize) -> Self {
        DedupTracker {
            window: window.max(1),
            entries: Mutex::new(IndexMap::new()),
        }
    }

    /// Records the current receivers of `doc_id` and returns those not seen
    /// before for this document.
    pub fn record_and_diff(
        &self,
        doc_id: &str,
        receivers: &BTreeSet<Callsign>,
    ) -> BTreeSet<Callsign> {
        let mut entries = self.entries.lock();

        if let Some(known) = entries.get_mut(doc_id) {
            let new_receivers = receivers.difference(known).cloned().collect();
            *known = receivers.clone();
            return new_receivers;
        }

        entries.insert(doc_id.to_string(), receivers.clone());

        if entries.len() > self.window
            && let Some((evicted, _)) = entries.shift_remove_index(0)
        {
            tracing::debug!(doc_id = %evicted, "evicted document from dedup window");
            counter!(DEDUP_EVICTIONS).increment(1);
        }

        receivers.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.entries.lock().contains_key(doc_id)
    }
}

impl Default for DedupTracker {
    fn default() -> Self {
        DedupTracker::new(DEFAULT_WINDOW)
    }
}
