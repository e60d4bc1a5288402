//! Day-bucket sources for the rate limiter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::types::DayBucket;

/// Monotonic coarse clock. Only the bucket is ever observed by the engine.
pub trait Clock: Send {
    fn day_bucket(&self) -> DayBucket;
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn day_bucket(&self) -> DayBucket {
        (**self).day_bucket()
    }
}

// ─────────────────────────────────────────────────────────
// Block height
// ─────────────────────────────────────────────────────────

/// Buckets of `blocks_per_day` blocks over an externally advanced height.
#[derive(Debug, Clone)]
pub struct BlockClock {
    height: Arc<AtomicU64>,
    blocks_per_day: u64,
}

impl BlockClock {
    /// `blocks_per_day` of zero is treated as one.
    pub fn new(blocks_per_day: u64) -> Self {
        Self {
            height: Arc::new(AtomicU64::new(0)),
            blocks_per_day: blocks_per_day.max(1),
        }
    }

    pub fn height(&self) -> u64 {
        self.height.load(Ordering::Acquire)
    }

    /// Heights never move backwards; a lower value is ignored.
    pub fn set_height(&self, height: u64) {
        self.height.fetch_max(height, Ordering::AcqRel);
    }

    pub fn advance(&self, blocks: u64) {
        self.height.fetch_add(blocks, Ordering::AcqRel);
    }
}

impl Clock for BlockClock {
    fn day_bucket(&self) -> DayBucket {
        self.height() / self.blocks_per_day
    }
}

// ─────────────────────────────────────────────────────────
// Wall clock
// ─────────────────────────────────────────────────────────

/// Whole UTC days since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct UtcDayClock;

impl UtcDayClock {
    pub fn bucket_of(ts: DateTime<Utc>) -> DayBucket {
        ts.timestamp().max(0) as u64 / 86_400
    }
}

impl Clock for UtcDayClock {
    fn day_bucket(&self) -> DayBucket {
        Self::bucket_of(Utc::now())
    }
}
