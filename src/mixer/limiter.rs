//! Rate Limiter — per-identity movement budget per day bucket.
//!
//! Deposits and withdrawals draw from the same budget: the limit bounds total
//! movement, not net flow. Entries are created lazily and never pruned; a new
//! bucket simply has no entry yet and therefore reads as zero usage.

use std::collections::HashMap;

use super::error::{LedgerError, LedgerResult};
use super::types::{Amount, DayBucket, Identity};

#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_daily: Amount,
    usage: HashMap<(Identity, DayBucket), Amount>,
}

impl RateLimiter {
    pub fn new(max_daily: Amount) -> Self {
        Self {
            max_daily,
            usage: HashMap::new(),
        }
    }

    pub fn usage(&self, id: &Identity, day: DayBucket) -> Amount {
        self.usage.get(&(*id, day)).copied().unwrap_or(0)
    }

    pub fn remaining(&self, id: &Identity, day: DayBucket) -> Amount {
        self.max_daily.saturating_sub(self.usage(id, day))
    }

    /// Fails without side effects if `amount` would push usage past the limit.
    pub fn check(&self, id: &Identity, day: DayBucket, amount: Amount) -> LedgerResult<()> {
        match self.usage(id, day).checked_add(amount) {
            Some(total) if total <= self.max_daily => Ok(()),
            _ => Err(LedgerError::DailyLimitExceeded),
        }
    }

    pub fn record(&mut self, id: Identity, day: DayBucket, amount: Amount) -> LedgerResult<()> {
        self.check(&id, day, amount)?;
        *self.usage.entry((id, day)).or_insert(0) += amount;
        Ok(())
    }

    /// Give back usage recorded by an operation that is being rolled back.
    pub(crate) fn release(&mut self, id: Identity, day: DayBucket, amount: Amount) {
        if let Some(used) = self.usage.get_mut(&(id, day)) {
            *used = used.saturating_sub(amount);
        }
    }

    pub fn tracked_buckets(&self) -> usize {
        self.usage.len()
    }
}
