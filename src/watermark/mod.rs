use crate::record::LogKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Returned by [`DeliveryTracker::latest`] when nothing is outstanding. Real
/// emission times are epoch milliseconds and never collide with it.
pub const NO_WATERMARK: i64 = 0;

/// Process-wide table of the newest delivery timestamp per build that has not
/// yet been observed in the log store.
///
/// Only the single latest watermark per build is kept, not a delivery history.
/// Completion is always re-derived from the store, so a racing sender leaving a
/// lower watermark behind only costs an extra store query.
///
/// Cloning yields another handle onto the same table.
#[derive(Debug, Clone, Default)]
pub struct DeliveryTracker {
    table: Arc<Mutex<HashMap<LogKey, i64>>>,
}

impl DeliveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after a record was handed to the ingestion service.
    pub fn record(&self, key: &LogKey, timestamp: i64) {
        let mut table = self.lock();
        match table.get_mut(key) {
            Some(current) if *current >= timestamp => {}
            Some(current) => *current = timestamp,
            None => {
                table.insert(key.clone(), timestamp);
            }
        }
    }

    /// The outstanding watermark for `key`, or [`NO_WATERMARK`].
    pub fn latest(&self, key: &LogKey) -> i64 {
        self.lock().get(key).copied().unwrap_or(NO_WATERMARK)
    }

    /// Called once the store has been seen to contain an event with `timestamp`.
    ///
    /// Removes the entry only if it still holds exactly that value, so a newer
    /// delivery recorded in the meantime stays outstanding. Returns whether the
    /// entry was removed.
    pub fn resolve(&self, key: &LogKey, timestamp: i64) -> bool {
        let mut table = self.lock();
        if table.get(key) == Some(&timestamp) {
            table.remove(key);
            true
        } else {
            false
        }
    }

    /// Number of builds with an outstanding watermark.
    pub fn outstanding(&self) -> usize {
        self.lock().len()
    }

    // The table holds plain integers, so a panic elsewhere while holding the
    // lock cannot leave it half-updated.
    fn lock(&self) -> MutexGuard<'_, HashMap<LogKey, i64>> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
