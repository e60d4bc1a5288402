//! Value-transfer collaborator.
//!
//! Moves the native asset between an identity's external wallet and the
//! engine's custody account. The engine only sees success or failure.

use std::collections::HashMap;

use tracing::debug;

use super::types::{Amount, Identity};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("insufficient funds in {account}: have {available}, need {requested}")]
    InsufficientFunds {
        account: String,
        available: Amount,
        requested: Amount,
    },
    #[error("transfer rejected: {0}")]
    Rejected(String),
}

pub trait ValueTransfer: Send {
    /// External wallet of `from` → custody.
    fn transfer_in(&mut self, from: Identity, amount: Amount) -> Result<(), TransferError>;

    /// Custody → external wallet of `to`.
    fn transfer_out(&mut self, to: Identity, amount: Amount) -> Result<(), TransferError>;

    /// Total value currently held by the engine's custody account.
    fn custody_balance(&self) -> Amount;
}

// ─────────────────────────────────────────────────────────
// In-memory implementation
// ─────────────────────────────────────────────────────────

/// Simulated asset layer used by the node and by tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCustody {
    wallets: HashMap<Identity, Amount>,
    custody: Amount,
    /// When set, the next transfer in either direction fails with this reason.
    fail_next: Option<String>,
}

impl InMemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint external funds for `id` (genesis / test setup).
    pub fn fund(&mut self, id: Identity, amount: Amount) {
        *self.wallets.entry(id).or_insert(0) += amount;
    }

    pub fn wallet(&self, id: &Identity) -> Amount {
        self.wallets.get(id).copied().unwrap_or(0)
    }

    pub fn fail_next_transfer(&mut self, reason: impl Into<String>) {
        self.fail_next = Some(reason.into());
    }

    fn take_failure(&mut self) -> Result<(), TransferError> {
        match self.fail_next.take() {
            Some(reason) => Err(TransferError::Rejected(reason)),
            None => Ok(()),
        }
    }
}

impl ValueTransfer for InMemoryCustody {
    fn transfer_in(&mut self, from: Identity, amount: Amount) -> Result<(), TransferError> {
        self.take_failure()?;
        let available = self.wallet(&from);
        if available < amount {
            return Err(TransferError::InsufficientFunds {
                account: from.to_string(),
                available,
                requested: amount,
            });
        }
        self.wallets.insert(from, available - amount);
        self.custody += amount;
        debug!("custody ← {} {}", from, amount);
        Ok(())
    }

    fn transfer_out(&mut self, to: Identity, amount: Amount) -> Result<(), TransferError> {
        self.take_failure()?;
        if self.custody < amount {
            return Err(TransferError::InsufficientFunds {
                account: "custody".to_string(),
                available: self.custody,
                requested: amount,
            });
        }
        self.custody -= amount;
        *self.wallets.entry(to).or_insert(0) += amount;
        debug!("custody → {} {}", to, amount);
        Ok(())
    }

    fn custody_balance(&self) -> Amount {
        self.custody
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    #[test]
    fn test_round_trip_through_custody() {
        let a = Address::repeat_byte(9);
        let mut c = InMemoryCustody::new();
        c.fund(a, 1_000);

        c.transfer_in(a, 400).unwrap();
        assert_eq!(c.wallet(&a), 600);
        assert_eq!(c.custody_balance(), 400);

        c.transfer_out(a, 150).unwrap();
        assert_eq!(c.wallet(&a), 750);
        assert_eq!(c.custody_balance(), 250);
    }

    #[test]
    fn test_unfunded_wallet_is_rejected() {
        let a = Address::repeat_byte(9);
        let mut c = InMemoryCustody::new();
        let err = c.transfer_in(a, 1).unwrap_err();
        assert!(matches!(err, TransferError::InsufficientFunds { requested: 1, .. }));
        assert_eq!(c.custody_balance(), 0);
    }

    #[test]
    fn test_injected_failure_fires_once() {
        let a = Address::repeat_byte(9);
        let mut c = InMemoryCustody::new();
        c.fund(a, 10);
        c.fail_next_transfer("node offline");
        assert_eq!(
            c.transfer_in(a, 5),
            Err(TransferError::Rejected("node offline".into()))
        );
        assert_eq!(c.wallet(&a), 10);
        assert!(c.transfer_in(a, 5).is_ok());
    }
}
