//! Epoch-millisecond clock used to stamp emitted records.

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

pub trait Clock: Debug + Send + Sync {
    fn epoch_ms(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock with a caller-controlled reading, for tests and replays.
#[derive(Debug, Clone)]
pub struct ManualClock {
    epoch_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(epoch_ms: i64) -> Self {
        Self {
            epoch_ms: Arc::new(AtomicI64::new(epoch_ms)),
        }
    }

    pub fn set(&self, epoch_ms: i64) {
        self.epoch_ms.store(epoch_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.epoch_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn epoch_ms(&self) -> i64 {
        self.epoch_ms.load(Ordering::SeqCst)
    }
}
