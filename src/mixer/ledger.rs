//! Account Ledger — per-identity balances held in custody.

use std::collections::HashMap;

use super::error::{LedgerError, LedgerResult};
use super::types::{Amount, Identity};

#[derive(Debug, Default, Clone)]
pub struct AccountLedger {
    balances: HashMap<Identity, Amount>,
}

impl AccountLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unknown identities read as zero.
    pub fn balance(&self, id: &Identity) -> Amount {
        self.balances.get(id).copied().unwrap_or(0)
    }

    pub fn ensure_covers(&self, id: &Identity, amount: Amount) -> LedgerResult<()> {
        if self.balance(id) < amount {
            return Err(LedgerError::InsufficientBalance);
        }
        Ok(())
    }

    pub fn credit(&mut self, id: Identity, amount: Amount) -> LedgerResult<Amount> {
        let entry = self.balances.entry(id).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(LedgerError::InvalidAmount)?;
        Ok(*entry)
    }

    /// Entries are kept at zero rather than removed.
    pub fn debit(&mut self, id: Identity, amount: Amount) -> LedgerResult<Amount> {
        self.ensure_covers(&id, amount)?;
        let entry = self.balances.entry(id).or_insert(0);
        *entry -= amount;
        Ok(*entry)
    }

    pub fn total(&self) -> Amount {
        self.balances.values().sum()
    }

    pub fn accounts(&self) -> usize {
        self.balances.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    #[test]
    fn test_credit_then_debit() {
        let a = Address::repeat_byte(1);
        let mut ledger = AccountLedger::new();
        assert_eq!(ledger.balance(&a), 0);

        assert_eq!(ledger.credit(a, 700).unwrap(), 700);
        assert_eq!(ledger.debit(a, 200).unwrap(), 500);
        assert_eq!(ledger.balance(&a), 500);
    }

    #[test]
    fn test_overdraw_leaves_balance_untouched() {
        let a = Address::repeat_byte(1);
        let mut ledger = AccountLedger::new();
        ledger.credit(a, 100).unwrap();

        assert_eq!(ledger.debit(a, 101), Err(LedgerError::InsufficientBalance));
        assert_eq!(ledger.balance(&a), 100);
    }

    #[test]
    fn test_zero_balance_is_kept() {
        let a = Address::repeat_byte(1);
        let mut ledger = AccountLedger::new();
        ledger.credit(a, 5).unwrap();
        ledger.debit(a, 5).unwrap();
        assert_eq!(ledger.accounts(), 1);
        assert_eq!(ledger.total(), 0);
    }
}
