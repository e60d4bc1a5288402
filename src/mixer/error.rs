//! Ledger error kinds.
//!
//! Every failed operation aborts as a whole and reports exactly one kind.
//! Numeric codes follow the legacy numbering so existing clients can keep
//! matching on them.

use serde::Serialize;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LedgerError {
    /// Caller lacks the required role. Also reported while the engine is paused.
    #[error("caller is not authorized for this operation")]
    NotAuthorized,
    #[error("amount is zero or outside the permitted range")]
    InvalidAmount,
    #[error("ledger balance is too low")]
    InsufficientBalance,
    #[error("engine has not been initialized")]
    NotInitialized,
    #[error("engine is already initialized")]
    AlreadyInitialized,
    #[error("pool has reached its participant capacity")]
    PoolFull,
    #[error("daily movement limit exceeded")]
    DailyLimitExceeded,
    #[error("pool id is out of range, unknown, taken or closed")]
    InvalidPool,
    #[error("identity already participates in this pool")]
    DuplicateParticipant,
    #[error("pool value is too small to pay every participant")]
    InsufficientPoolFunds,
    #[error("pool is not ready for distribution")]
    PoolNotReady,
    /// The external value-transfer collaborator refused the movement.
    #[error("external transfer failed: {0}")]
    TransferFailed(String),
}

impl LedgerError {
    pub fn code(&self) -> u32 {
        match self {
            LedgerError::NotAuthorized => 100,
            LedgerError::InvalidAmount => 101,
            LedgerError::InsufficientBalance => 102,
            LedgerError::NotInitialized => 103,
            LedgerError::AlreadyInitialized => 104,
            LedgerError::PoolFull => 105,
            LedgerError::DailyLimitExceeded => 106,
            LedgerError::InvalidPool => 107,
            LedgerError::DuplicateParticipant => 108,
            LedgerError::InsufficientPoolFunds => 109,
            LedgerError::PoolNotReady => 110,
            LedgerError::TransferFailed(_) => 111,
        }
    }

    /// Stable kind name, independent of the display message.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::NotAuthorized => "NotAuthorized",
            LedgerError::InvalidAmount => "InvalidAmount",
            LedgerError::InsufficientBalance => "InsufficientBalance",
            LedgerError::NotInitialized => "NotInitialized",
            LedgerError::AlreadyInitialized => "AlreadyInitialized",
            LedgerError::PoolFull => "PoolFull",
            LedgerError::DailyLimitExceeded => "DailyLimitExceeded",
            LedgerError::InvalidPool => "InvalidPool",
            LedgerError::DuplicateParticipant => "DuplicateParticipant",
            LedgerError::InsufficientPoolFunds => "InsufficientPoolFunds",
            LedgerError::PoolNotReady => "PoolNotReady",
            LedgerError::TransferFailed(_) => "TransferFailed",
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
