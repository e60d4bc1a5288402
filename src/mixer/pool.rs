//! Pool Manager — mixing-pool registry and the equal-split distribution.
//!
//! Lifecycle per pool: (absent) → Active → Closed. Closed is terminal.
//!
//! Payouts are strictly equal regardless of how much each participant put
//! in: a participant who joined with the minimum receives the same share as
//! one who joined with ten times that. Equal payouts remove the amount as a
//! correlation signal between deposit and withdrawal.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::error::{LedgerError, LedgerResult};
use super::types::{Amount, Identity, LedgerConfig, PoolId};

// ─────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub total_amount: Amount,
    /// Join order. Payouts are credited in this order.
    pub participants: Vec<Identity>,
    /// Maintained alongside `participants`; a mismatch blocks distribution.
    pub participant_count: usize,
    pub is_active: bool,
    pub creator: Identity,
}

/// Outcome of splitting a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub total: Amount,
    pub fee: Amount,
    pub distributable: Amount,
    pub per_participant: Amount,
    /// Integer-division remainder retained by the protocol.
    pub dust: Amount,
    pub participants: usize,
}

/// `fee = floor(total * pct / 100)`, `per = floor((total - fee) / n)`.
pub fn split(total: Amount, participants: usize, fee_percentage: u8) -> LedgerResult<Distribution> {
    if participants == 0 {
        return Err(LedgerError::PoolNotReady);
    }
    let fee = total
        .checked_mul(Amount::from(fee_percentage))
        .ok_or(LedgerError::InvalidAmount)?
        / 100;
    let distributable = total - fee;
    let n = participants as Amount;
    let per_participant = distributable / n;
    if per_participant == 0 {
        return Err(LedgerError::InsufficientPoolFunds);
    }
    Ok(Distribution {
        total,
        fee,
        distributable,
        per_participant,
        dust: distributable - per_participant * n,
        participants,
    })
}

// ─────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PoolManager {
    min_pool_amount: Amount,
    max_participants: usize,
    max_pool_id: PoolId,
    fee_percentage: u8,
    pools: HashMap<PoolId, Pool>,
    /// Authoritative membership index, (pool, identity) → present.
    index: HashSet<(PoolId, Identity)>,
}

impl PoolManager {
    pub fn new(cfg: &LedgerConfig) -> Self {
        Self {
            min_pool_amount: cfg.min_pool_amount,
            max_participants: cfg.max_pool_participants,
            max_pool_id: cfg.max_pool_id,
            fee_percentage: cfg.mixing_fee_percentage,
            pools: HashMap::new(),
            index: HashSet::new(),
        }
    }

    pub fn get(&self, pool_id: PoolId) -> Option<&Pool> {
        self.pools.get(&pool_id)
    }

    pub fn is_participant(&self, pool_id: PoolId, id: &Identity) -> bool {
        self.index.contains(&(pool_id, *id))
    }

    /// Sum of `total_amount` over pools that are still Active.
    pub fn active_total(&self) -> Amount {
        self.pools
            .values()
            .filter(|p| p.is_active)
            .map(|p| p.total_amount)
            .sum()
    }

    pub fn check_create(&self, pool_id: PoolId, amount: Amount) -> LedgerResult<()> {
        if amount < self.min_pool_amount {
            return Err(LedgerError::InvalidAmount);
        }
        if !(1..=self.max_pool_id).contains(&pool_id) || self.pools.contains_key(&pool_id) {
            return Err(LedgerError::InvalidPool);
        }
        Ok(())
    }

    pub fn create(&mut self, pool_id: PoolId, creator: Identity, amount: Amount) -> LedgerResult<&Pool> {
        self.check_create(pool_id, amount)?;
        self.index.insert((pool_id, creator));
        let pool = self.pools.entry(pool_id).or_insert(Pool {
            total_amount: amount,
            participants: vec![creator],
            participant_count: 1,
            is_active: true,
            creator,
        });
        Ok(pool)
    }

    /// Pool exists, is Active and has a free slot.
    pub fn check_open_slot(&self, pool_id: PoolId) -> LedgerResult<&Pool> {
        let pool = match self.pools.get(&pool_id) {
            Some(p) if p.is_active => p,
            _ => return Err(LedgerError::InvalidPool),
        };
        if pool.participant_count >= self.max_participants {
            return Err(LedgerError::PoolFull);
        }
        Ok(pool)
    }

    /// Entry amount and membership, checked after the caller's balance.
    pub fn check_entry(&self, pool_id: PoolId, id: &Identity, amount: Amount) -> LedgerResult<()> {
        let pool = self.check_open_slot(pool_id)?;
        if amount < self.min_pool_amount {
            return Err(LedgerError::InvalidAmount);
        }
        if self.is_participant(pool_id, id) {
            return Err(LedgerError::DuplicateParticipant);
        }
        pool.total_amount
            .checked_add(amount)
            .ok_or(LedgerError::InvalidAmount)?;
        Ok(())
    }

    pub fn join(&mut self, pool_id: PoolId, id: Identity, amount: Amount) -> LedgerResult<&Pool> {
        self.check_entry(pool_id, &id, amount)?;
        let pool = self.pools.get_mut(&pool_id).ok_or(LedgerError::InvalidPool)?;
        pool.participants.push(id);
        pool.participant_count += 1;
        pool.total_amount += amount;
        self.index.insert((pool_id, id));
        Ok(pool)
    }

    /// Compute the split for an Active, structurally consistent pool.
    pub fn plan_distribution(&self, pool_id: PoolId) -> LedgerResult<Distribution> {
        let pool = self.pools.get(&pool_id).ok_or(LedgerError::InvalidPool)?;
        if !pool.is_active || pool.participant_count != pool.participants.len() {
            return Err(LedgerError::PoolNotReady);
        }
        split(pool.total_amount, pool.participant_count, self.fee_percentage)
    }

    /// Flip the pool to Closed. The caller credits the payouts.
    pub fn close(&mut self, pool_id: PoolId) -> LedgerResult<&Pool> {
        let pool = self.pools.get_mut(&pool_id).ok_or(LedgerError::InvalidPool)?;
        if !pool.is_active {
            return Err(LedgerError::PoolNotReady);
        }
        pool.is_active = false;
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    fn manager() -> PoolManager {
        PoolManager::new(&LedgerConfig::new(Address::ZERO))
    }

    fn user(n: u8) -> Identity {
        Address::repeat_byte(n)
    }

    #[test]
    fn test_split_two_participants() {
        let d = split(1_000_000, 2, 2).unwrap();
        assert_eq!(d.fee, 20_000);
        assert_eq!(d.distributable, 980_000);
        assert_eq!(d.per_participant, 490_000);
        assert_eq!(d.dust, 0);
    }

    #[test]
    fn test_split_keeps_dust() {
        // fee = 6_000, distributable = 294_001, per = 98_000, dust = 1
        let d = split(300_001, 3, 2).unwrap();
        assert_eq!(d.fee, 6_000);
        assert_eq!(d.per_participant, 98_000);
        assert_eq!(d.dust, 1);
        assert_eq!(d.fee + d.per_participant * 3 + d.dust, 300_001);
    }

    #[test]
    fn test_split_too_small() {
        assert_eq!(split(5, 10, 2), Err(LedgerError::InsufficientPoolFunds));
    }

    #[test]
    fn test_create_rejects_bad_ids() {
        let mut pm = manager();
        assert_eq!(pm.create(0, user(1), 100_000).unwrap_err(), LedgerError::InvalidPool);
        assert_eq!(pm.create(1_001, user(1), 100_000).unwrap_err(), LedgerError::InvalidPool);
        pm.create(1, user(1), 100_000).unwrap();
        assert_eq!(pm.create(1, user(2), 100_000).unwrap_err(), LedgerError::InvalidPool);
    }

    #[test]
    fn test_create_below_minimum() {
        let mut pm = manager();
        assert_eq!(pm.create(1, user(1), 99_999).unwrap_err(), LedgerError::InvalidAmount);
        assert!(pm.get(1).is_none());
    }

    #[test]
    fn test_capacity_tenth_join_ok_eleventh_full() {
        let mut pm = manager();
        pm.create(1, user(1), 100_000).unwrap();
        for n in 2..=10 {
            pm.join(1, user(n), 100_000).unwrap();
        }
        assert_eq!(pm.get(1).unwrap().participant_count, 10);
        assert_eq!(pm.join(1, user(11), 100_000).unwrap_err(), LedgerError::PoolFull);
        assert_eq!(pm.join(1, user(11), 1).unwrap_err(), LedgerError::PoolFull);
    }

    #[test]
    fn test_duplicate_join() {
        let mut pm = manager();
        pm.create(1, user(1), 100_000).unwrap();
        assert_eq!(pm.join(1, user(1), 100_000).unwrap_err(), LedgerError::DuplicateParticipant);
        pm.join(1, user(2), 100_000).unwrap();
        assert_eq!(pm.join(1, user(2), 100_000).unwrap_err(), LedgerError::DuplicateParticipant);
        assert_eq!(pm.get(1).unwrap().participants, vec![user(1), user(2)]);
    }

    #[test]
    fn test_closed_pool_is_terminal() {
        let mut pm = manager();
        pm.create(1, user(1), 100_000).unwrap();
        pm.plan_distribution(1).unwrap();
        pm.close(1).unwrap();

        assert_eq!(pm.plan_distribution(1).unwrap_err(), LedgerError::PoolNotReady);
        assert_eq!(pm.join(1, user(2), 100_000).unwrap_err(), LedgerError::InvalidPool);
        assert_eq!(pm.active_total(), 0);
    }

    #[test]
    fn test_structural_mismatch_blocks_distribution() {
        let mut pm = manager();
        pm.create(1, user(1), 100_000).unwrap();
        pm.pools.get_mut(&1).unwrap().participant_count = 2;
        assert_eq!(pm.plan_distribution(1).unwrap_err(), LedgerError::PoolNotReady);
    }

    #[test]
    fn test_unknown_pool() {
        let pm = manager();
        assert_eq!(pm.plan_distribution(9).unwrap_err(), LedgerError::InvalidPool);
    }
}
