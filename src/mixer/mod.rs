// ─── Ledger Engine: accounts, rate limits, mixing pools ───
pub mod engine;
pub mod error;
pub mod ledger;
pub mod limiter;
pub mod pool;
pub mod types;

// ─── External collaborators ───
pub mod clock;
pub mod custody;

// ─── Serialized access ───
pub mod actor;

pub use actor::{CallError, EngineActor, EngineHandle};
pub use engine::{ContractStatus, LedgerEngine, LedgerEvent};
pub use error::LedgerError;
pub use types::{Amount, Identity, LedgerConfig, PoolId};
