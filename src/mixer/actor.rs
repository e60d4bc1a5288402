//! Engine Actor — serializes every call against the ledger.
//!
//! The actor owns the `LedgerEngine` outright and processes one `LedgerCmd`
//! at a time from its mpsc queue, so operations never interleave. Callers
//! hold a cloneable `EngineHandle` and await the reply over a oneshot.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::clock::Clock;
use super::custody::ValueTransfer;
use super::engine::{ConservationReport, ContractStatus, LedgerEngine, LedgerEvent};
use super::error::{LedgerError, LedgerResult};
use super::pool::{Distribution, Pool};
use super::types::{Amount, Identity, PoolId};

// ─────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────

type Reply<T> = oneshot::Sender<T>;

#[derive(Debug)]
pub enum LedgerCmd {
    Initialize { caller: Identity, reply: Reply<LedgerResult<()>> },
    Deposit { caller: Identity, amount: Amount, reply: Reply<LedgerResult<Amount>> },
    Withdraw { caller: Identity, amount: Amount, reply: Reply<LedgerResult<Amount>> },
    CreatePool { caller: Identity, pool_id: PoolId, amount: Amount, reply: Reply<LedgerResult<()>> },
    JoinPool { caller: Identity, pool_id: PoolId, amount: Amount, reply: Reply<LedgerResult<()>> },
    Distribute { caller: Identity, pool_id: PoolId, reply: Reply<LedgerResult<Distribution>> },
    TogglePause { caller: Identity, reply: Reply<LedgerResult<bool>> },
    WithdrawFees { caller: Identity, reply: Reply<LedgerResult<Amount>> },
    Balance { identity: Identity, reply: Reply<Amount> },
    DailyRemaining { identity: Identity, reply: Reply<Amount> },
    Status { reply: Reply<ContractStatus> },
    PoolDetails { pool_id: PoolId, reply: Reply<Option<Pool>> },
    Audit { reply: Reply<ConservationReport> },
    TakeEvents { reply: Reply<Vec<LedgerEvent>> },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("ledger engine is not running")]
    EngineUnavailable,
}

// ─────────────────────────────────────────────────────────
// Actor
// ─────────────────────────────────────────────────────────

pub struct EngineActor<T, C> {
    engine: LedgerEngine<T, C>,
    cmd_rx: mpsc::Receiver<LedgerCmd>,
    handled: u64,
}

impl<T, C> EngineActor<T, C>
where
    T: ValueTransfer + 'static,
    C: Clock + 'static,
{
    pub fn new(engine: LedgerEngine<T, C>, cmd_rx: mpsc::Receiver<LedgerCmd>) -> Self {
        Self { engine, cmd_rx, handled: 0 }
    }

    /// Spawn the actor on the current runtime.
    pub fn spawn(engine: LedgerEngine<T, C>, queue: usize) -> (EngineHandle, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(queue.max(1));
        let actor = Self::new(engine, cmd_rx);
        (EngineHandle { cmd_tx }, tokio::spawn(actor.run()))
    }

    /// Runs until every handle has been dropped.
    pub async fn run(mut self) {
        info!("🧮 EngineActor started | admin={}", self.engine.config().admin);

        while let Some(cmd) = self.cmd_rx.recv().await {
            self.handle(cmd);
            self.handled += 1;
        }

        let report = self.engine.audit();
        info!(
            "🧮 EngineActor shutting down | handled={} custody={} liabilities={} balanced={}",
            self.handled, report.custody, report.liabilities(), report.is_balanced(),
        );
    }

    fn handle(&mut self, cmd: LedgerCmd) {
        let e = &mut self.engine;
        // A dropped reply receiver only means the caller stopped waiting.
        match cmd {
            LedgerCmd::Initialize { caller, reply } => {
                let _ = reply.send(e.initialize(caller));
            }
            LedgerCmd::Deposit { caller, amount, reply } => {
                let _ = reply.send(e.deposit(caller, amount));
            }
            LedgerCmd::Withdraw { caller, amount, reply } => {
                let _ = reply.send(e.withdraw(caller, amount));
            }
            LedgerCmd::CreatePool { caller, pool_id, amount, reply } => {
                let _ = reply.send(e.create_pool(caller, pool_id, amount));
            }
            LedgerCmd::JoinPool { caller, pool_id, amount, reply } => {
                let _ = reply.send(e.join_pool(caller, pool_id, amount));
            }
            LedgerCmd::Distribute { caller, pool_id, reply } => {
                let _ = reply.send(e.distribute(caller, pool_id));
            }
            LedgerCmd::TogglePause { caller, reply } => {
                let _ = reply.send(e.toggle_pause(caller));
            }
            LedgerCmd::WithdrawFees { caller, reply } => {
                let _ = reply.send(e.withdraw_protocol_fees(caller));
            }
            LedgerCmd::Balance { identity, reply } => {
                let _ = reply.send(e.get_balance(&identity));
            }
            LedgerCmd::DailyRemaining { identity, reply } => {
                let _ = reply.send(e.get_daily_limit_remaining(&identity));
            }
            LedgerCmd::Status { reply } => {
                let _ = reply.send(e.get_contract_status());
            }
            LedgerCmd::PoolDetails { pool_id, reply } => {
                let _ = reply.send(e.get_pool_details(pool_id));
            }
            LedgerCmd::Audit { reply } => {
                let _ = reply.send(e.audit());
            }
            LedgerCmd::TakeEvents { reply } => {
                let _ = reply.send(e.take_events());
            }
        }
        debug!("cmd #{} done", self.handled + 1);
    }
}

// ─────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<LedgerCmd>,
}

impl EngineHandle {
    pub fn new(cmd_tx: mpsc::Sender<LedgerCmd>) -> Self {
        Self { cmd_tx }
    }

    async fn call<R>(&self, make: impl FnOnce(Reply<R>) -> LedgerCmd) -> Result<R, CallError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| CallError::EngineUnavailable)?;
        rx.await.map_err(|_| CallError::EngineUnavailable)
    }

    pub async fn initialize(&self, caller: Identity) -> Result<(), CallError> {
        Ok(self.call(|reply| LedgerCmd::Initialize { caller, reply }).await??)
    }

    pub async fn deposit(&self, caller: Identity, amount: Amount) -> Result<Amount, CallError> {
        Ok(self.call(|reply| LedgerCmd::Deposit { caller, amount, reply }).await??)
    }

    pub async fn withdraw(&self, caller: Identity, amount: Amount) -> Result<Amount, CallError> {
        Ok(self.call(|reply| LedgerCmd::Withdraw { caller, amount, reply }).await??)
    }

    pub async fn create_pool(&self, caller: Identity, pool_id: PoolId, amount: Amount) -> Result<(), CallError> {
        Ok(self.call(|reply| LedgerCmd::CreatePool { caller, pool_id, amount, reply }).await??)
    }

    pub async fn join_pool(&self, caller: Identity, pool_id: PoolId, amount: Amount) -> Result<(), CallError> {
        Ok(self.call(|reply| LedgerCmd::JoinPool { caller, pool_id, amount, reply }).await??)
    }

    pub async fn distribute(&self, caller: Identity, pool_id: PoolId) -> Result<Distribution, CallError> {
        Ok(self.call(|reply| LedgerCmd::Distribute { caller, pool_id, reply }).await??)
    }

    pub async fn toggle_pause(&self, caller: Identity) -> Result<bool, CallError> {
        Ok(self.call(|reply| LedgerCmd::TogglePause { caller, reply }).await??)
    }

    pub async fn withdraw_protocol_fees(&self, caller: Identity) -> Result<Amount, CallError> {
        Ok(self.call(|reply| LedgerCmd::WithdrawFees { caller, reply }).await??)
    }

    pub async fn balance(&self, identity: Identity) -> Result<Amount, CallError> {
        self.call(|reply| LedgerCmd::Balance { identity, reply }).await
    }

    pub async fn daily_limit_remaining(&self, identity: Identity) -> Result<Amount, CallError> {
        self.call(|reply| LedgerCmd::DailyRemaining { identity, reply }).await
    }

    pub async fn status(&self) -> Result<ContractStatus, CallError> {
        self.call(|reply| LedgerCmd::Status { reply }).await
    }

    pub async fn pool_details(&self, pool_id: PoolId) -> Result<Option<Pool>, CallError> {
        self.call(|reply| LedgerCmd::PoolDetails { pool_id, reply }).await
    }

    pub async fn audit(&self) -> Result<ConservationReport, CallError> {
        self.call(|reply| LedgerCmd::Audit { reply }).await
    }

    pub async fn take_events(&self) -> Result<Vec<LedgerEvent>, CallError> {
        self.call(|reply| LedgerCmd::TakeEvents { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::clock::BlockClock;
    use crate::mixer::custody::InMemoryCustody;
    use crate::mixer::types::LedgerConfig;
    use alloy_primitives::Address;

    fn spawn_engine() -> (EngineHandle, JoinHandle<()>, Identity) {
        let admin = Address::repeat_byte(0xAD);
        let mut custody = InMemoryCustody::new();
        for n in 1..=12u8 {
            custody.fund(Address::repeat_byte(n), 10_000_000);
        }
        let engine = LedgerEngine::new(LedgerConfig::new(admin), custody, BlockClock::new(144));
        let (handle, task) = EngineActor::spawn(engine, 32);
        (handle, task, admin)
    }

    #[tokio::test]
    async fn test_handle_round_trip() {
        let (h, _task, admin) = spawn_engine();
        let a = Address::repeat_byte(1);

        assert_eq!(h.deposit(a, 10).await, Err(CallError::Ledger(LedgerError::NotInitialized)));
        h.initialize(admin).await.unwrap();
        assert_eq!(h.deposit(a, 1_000_000).await.unwrap(), 1_000_000);
        h.create_pool(a, 1, 400_000).await.unwrap();
        assert_eq!(h.balance(a).await.unwrap(), 600_000);
        assert_eq!(h.pool_details(1).await.unwrap().unwrap().participant_count, 1);
        assert!(h.status().await.unwrap().initialized);
    }

    #[tokio::test]
    async fn test_concurrent_joins_are_serialized() {
        let (h, _task, admin) = spawn_engine();
        h.initialize(admin).await.unwrap();
        for n in 1..=12u8 {
            h.deposit(Address::repeat_byte(n), 100_000).await.unwrap();
        }
        h.create_pool(Address::repeat_byte(1), 7, 100_000).await.unwrap();

        let mut joins = Vec::new();
        for n in 2..=12u8 {
            let h = h.clone();
            joins.push(tokio::spawn(async move {
                h.join_pool(Address::repeat_byte(n), 7, 100_000).await
            }));
        }
        let mut ok = 0;
        let mut full = 0;
        for j in joins {
            match j.await.unwrap() {
                Ok(()) => ok += 1,
                Err(CallError::Ledger(LedgerError::PoolFull)) => full += 1,
                Err(other) => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!((ok, full), (9, 2));
        assert!(h.audit().await.unwrap().is_balanced());
    }

    #[tokio::test]
    async fn test_dropped_actor_reports_unavailable() {
        let (h, task, _) = spawn_engine();
        task.abort();
        let _ = task.await;
        assert_eq!(h.status().await, Err(CallError::EngineUnavailable));
    }
}
