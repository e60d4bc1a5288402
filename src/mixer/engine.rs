//! Ledger Engine — the operations exposed to callers.
//!
//! Every operation validates all of its preconditions before touching state,
//! so a rejected call leaves nothing behind. The two operations that move
//! value out of custody (`withdraw`, `withdraw_protocol_fees`) restore any
//! bookkeeping they already applied if the external transfer fails.
//!
//! The engine holds `&mut self` for the duration of an operation and never
//! hands itself to a collaborator, so no operation can re-enter another.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::custody::ValueTransfer;
use super::error::{LedgerError, LedgerResult};
use super::ledger::AccountLedger;
use super::limiter::RateLimiter;
use super::pool::{Distribution, Pool, PoolManager};
use super::types::{Amount, DayBucket, Identity, LedgerConfig, PoolId};

// ─────────────────────────────────────────────────────────
// Protocol state & reports
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolState {
    /// One-way false → true.
    pub initialized: bool,
    pub paused: bool,
    /// Owed to the administrator; zeroed by fee withdrawal.
    pub accumulated_fees: Amount,
    /// Distribution remainders. Held in custody, owed to nobody.
    pub residual_dust: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractStatus {
    pub paused: bool,
    pub initialized: bool,
    pub total_fees: Amount,
}

/// Ledger-side liabilities against what custody actually holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConservationReport {
    pub balances: Amount,
    pub active_pools: Amount,
    pub fees: Amount,
    pub dust: Amount,
    pub custody: Amount,
}

impl ConservationReport {
    pub fn liabilities(&self) -> Amount {
        self.balances + self.active_pools + self.fees + self.dust
    }

    pub fn is_balanced(&self) -> bool {
        self.liabilities() == self.custody
    }
}

/// Journal entry for each committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    Initialized { admin: Identity },
    Deposited { identity: Identity, amount: Amount, day: DayBucket },
    Withdrawn { identity: Identity, amount: Amount, day: DayBucket },
    PoolCreated { pool_id: PoolId, creator: Identity, amount: Amount },
    PoolJoined { pool_id: PoolId, identity: Identity, amount: Amount, participants: usize },
    PoolDistributed { pool_id: PoolId, distribution: Distribution },
    PauseToggled { paused: bool },
    FeesWithdrawn { amount: Amount },
}

// ─────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────

pub struct LedgerEngine<T, C> {
    cfg: LedgerConfig,
    state: ProtocolState,
    ledger: AccountLedger,
    limiter: RateLimiter,
    pools: PoolManager,
    custody: T,
    clock: C,
    /// Oldest entries are dropped once `journal_capacity` is reached.
    events: VecDeque<LedgerEvent>,
}

impl<T: ValueTransfer, C: Clock> LedgerEngine<T, C> {
    pub fn new(cfg: LedgerConfig, custody: T, clock: C) -> Self {
        let limiter = RateLimiter::new(cfg.max_daily_limit);
        let pools = PoolManager::new(&cfg);
        Self {
            cfg,
            state: ProtocolState::default(),
            ledger: AccountLedger::new(),
            limiter,
            pools,
            custody,
            clock,
            events: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.cfg
    }

    pub fn custody(&self) -> &T {
        &self.custody
    }

    pub fn custody_mut(&mut self) -> &mut T {
        &mut self.custody
    }

    // ─────────────────────────────────────────────────
    // Guards
    // ─────────────────────────────────────────────────

    fn record(&mut self, event: LedgerEvent) {
        if self.cfg.journal_capacity == 0 {
            return;
        }
        if self.events.len() >= self.cfg.journal_capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    fn ensure_initialized(&self) -> LedgerResult<()> {
        if !self.state.initialized {
            return Err(LedgerError::NotInitialized);
        }
        Ok(())
    }

    /// Initialized and not paused. Pause reports as `NotAuthorized`.
    fn ensure_open(&self) -> LedgerResult<()> {
        self.ensure_initialized()?;
        if self.state.paused {
            return Err(LedgerError::NotAuthorized);
        }
        Ok(())
    }

    fn ensure_admin(&self, caller: &Identity) -> LedgerResult<()> {
        if *caller != self.cfg.admin {
            return Err(LedgerError::NotAuthorized);
        }
        Ok(())
    }

    fn ensure_transfer_amount(&self, amount: Amount) -> LedgerResult<()> {
        if amount == 0 || amount > self.cfg.max_transaction_amount {
            return Err(LedgerError::InvalidAmount);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────
    // Administrative
    // ─────────────────────────────────────────────────

    pub fn initialize(&mut self, caller: Identity) -> LedgerResult<()> {
        self.ensure_admin(&caller)?;
        if self.state.initialized {
            return Err(LedgerError::AlreadyInitialized);
        }
        self.state.initialized = true;
        info!("🟢 Engine initialized | admin={}", caller);
        self.record(LedgerEvent::Initialized { admin: caller });
        Ok(())
    }

    /// Returns the new paused state.
    pub fn toggle_pause(&mut self, caller: Identity) -> LedgerResult<bool> {
        self.ensure_admin(&caller)?;
        self.state.paused = !self.state.paused;
        warn!("⏸️ Pause toggled → paused={}", self.state.paused);
        self.record(LedgerEvent::PauseToggled { paused: self.state.paused });
        Ok(self.state.paused)
    }

    /// Pays the whole fee accumulator to the administrator's wallet.
    /// The accumulator is only reset once the transfer succeeded.
    pub fn withdraw_protocol_fees(&mut self, caller: Identity) -> LedgerResult<Amount> {
        self.ensure_admin(&caller)?;
        let fees = self.state.accumulated_fees;
        if fees == 0 {
            debug!("no protocol fees to withdraw");
            return Ok(0);
        }
        self.custody
            .transfer_out(caller, fees)
            .map_err(|e| LedgerError::TransferFailed(e.to_string()))?;
        self.state.accumulated_fees = 0;
        info!("🏦 Protocol fees withdrawn | amount={}", fees);
        self.record(LedgerEvent::FeesWithdrawn { amount: fees });
        Ok(fees)
    }

    // ─────────────────────────────────────────────────
    // Account ledger
    // ─────────────────────────────────────────────────

    /// Returns the caller's new ledger balance.
    pub fn deposit(&mut self, caller: Identity, amount: Amount) -> LedgerResult<Amount> {
        self.ensure_open()?;
        self.ensure_transfer_amount(amount)?;
        let day = self.clock.day_bucket();
        self.limiter.check(&caller, day, amount)?;
        self.ledger
            .balance(&caller)
            .checked_add(amount)
            .ok_or(LedgerError::InvalidAmount)?;

        self.custody
            .transfer_in(caller, amount)
            .map_err(|e| {
                warn!("💸 Deposit transfer failed | id={} amount={} err={}", caller, amount, e);
                LedgerError::TransferFailed(e.to_string())
            })?;

        let balance = self.ledger.credit(caller, amount)?;
        self.limiter.record(caller, day, amount)?;
        info!("💰 Deposit | id={} amount={} balance={} day={}", caller, amount, balance, day);
        self.record(LedgerEvent::Deposited { identity: caller, amount, day });
        Ok(balance)
    }

    /// Returns the caller's new ledger balance.
    pub fn withdraw(&mut self, caller: Identity, amount: Amount) -> LedgerResult<Amount> {
        self.ensure_open()?;
        self.ensure_transfer_amount(amount)?;
        let day = self.clock.day_bucket();
        self.limiter.check(&caller, day, amount)?;
        self.ledger.ensure_covers(&caller, amount)?;

        // Bookkeeping first, then the outbound transfer.
        let balance = self.ledger.debit(caller, amount)?;
        self.limiter.record(caller, day, amount)?;

        if let Err(e) = self.custody.transfer_out(caller, amount) {
            self.ledger.credit(caller, amount)?;
            self.limiter.release(caller, day, amount);
            warn!("💸 Withdraw transfer failed, rolled back | id={} amount={} err={}", caller, amount, e);
            return Err(LedgerError::TransferFailed(e.to_string()));
        }

        info!("📤 Withdraw | id={} amount={} balance={} day={}", caller, amount, balance, day);
        self.record(LedgerEvent::Withdrawn { identity: caller, amount, day });
        Ok(balance)
    }

    // ─────────────────────────────────────────────────
    // Pools
    // ─────────────────────────────────────────────────

    pub fn create_pool(&mut self, caller: Identity, pool_id: PoolId, amount: Amount) -> LedgerResult<()> {
        self.ensure_open()?;
        self.pools.check_create(pool_id, amount)?;
        self.ledger.ensure_covers(&caller, amount)?;

        self.ledger.debit(caller, amount)?;
        self.pools.create(pool_id, caller, amount)?;
        info!("🏊 Pool created | pool={} creator={} amount={}", pool_id, caller, amount);
        self.record(LedgerEvent::PoolCreated { pool_id, creator: caller, amount });
        Ok(())
    }

    pub fn join_pool(&mut self, caller: Identity, pool_id: PoolId, amount: Amount) -> LedgerResult<()> {
        self.ensure_open()?;
        self.pools.check_open_slot(pool_id)?;
        self.ledger.ensure_covers(&caller, amount)?;
        self.pools.check_entry(pool_id, &caller, amount)?;

        self.ledger.debit(caller, amount)?;
        let pool = self.pools.join(pool_id, caller, amount)?;
        let participants = pool.participant_count;
        info!(
            "🏊 Pool joined | pool={} id={} amount={} total={} participants={}",
            pool_id, caller, amount, pool.total_amount, participants,
        );
        self.record(LedgerEvent::PoolJoined { pool_id, identity: caller, amount, participants });
        Ok(())
    }

    /// Settle a pool. Open to any caller and allowed while paused.
    pub fn distribute(&mut self, caller: Identity, pool_id: PoolId) -> LedgerResult<Distribution> {
        self.ensure_initialized()?;
        let plan = self.pools.plan_distribution(pool_id)?;
        let participants = self
            .pools
            .get(pool_id)
            .map(|p| p.participants.clone())
            .ok_or(LedgerError::InvalidPool)?;

        for id in &participants {
            self.ledger
                .balance(id)
                .checked_add(plan.per_participant)
                .ok_or(LedgerError::InvalidAmount)?;
        }
        let fees = self
            .state
            .accumulated_fees
            .checked_add(plan.fee)
            .ok_or(LedgerError::InvalidAmount)?;

        for id in &participants {
            self.ledger.credit(*id, plan.per_participant)?;
        }
        self.state.accumulated_fees = fees;
        self.state.residual_dust += plan.dust;
        self.pools.close(pool_id)?;

        info!(
            "📦 Pool distributed | pool={} by={} total={} fee={} per={} n={} dust={}",
            pool_id, caller, plan.total, plan.fee, plan.per_participant, plan.participants, plan.dust,
        );
        self.record(LedgerEvent::PoolDistributed { pool_id, distribution: plan });
        Ok(plan)
    }

    // ─────────────────────────────────────────────────
    // Read-only queries
    // ─────────────────────────────────────────────────

    pub fn get_balance(&self, id: &Identity) -> Amount {
        self.ledger.balance(id)
    }

    pub fn get_daily_limit_remaining(&self, id: &Identity) -> Amount {
        self.limiter.remaining(id, self.clock.day_bucket())
    }

    pub fn get_daily_usage(&self, id: &Identity) -> Amount {
        self.limiter.usage(id, self.clock.day_bucket())
    }

    pub fn get_contract_status(&self) -> ContractStatus {
        ContractStatus {
            paused: self.state.paused,
            initialized: self.state.initialized,
            total_fees: self.state.accumulated_fees,
        }
    }

    pub fn protocol_state(&self) -> ProtocolState {
        self.state
    }

    pub fn get_pool_details(&self, pool_id: PoolId) -> Option<Pool> {
        self.pools.get(pool_id).cloned()
    }

    pub fn get_pool_participants(&self, pool_id: PoolId) -> Option<Vec<Identity>> {
        self.pools.get(pool_id).map(|p| p.participants.clone())
    }

    pub fn is_participant(&self, pool_id: PoolId, id: &Identity) -> bool {
        self.pools.is_participant(pool_id, id)
    }

    pub fn audit(&self) -> ConservationReport {
        ConservationReport {
            balances: self.ledger.total(),
            active_pools: self.pools.active_total(),
            fees: self.state.accumulated_fees,
            dust: self.state.residual_dust,
            custody: self.custody.custody_balance(),
        }
    }

    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        self.events.drain(..).collect()
    }
}
