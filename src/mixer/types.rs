use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Authenticated caller of an operation.
pub type Identity = Address;

/// Native asset amount in base units.
pub type Amount = u128;

pub type PoolId = u64;

/// Fixed-width interval of the external clock used for daily limits.
pub type DayBucket = u64;

// ─────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────

/// Deployment constants. Fixed once the engine is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// The only identity allowed to initialize, pause and collect fees.
    pub admin: Identity,

    /// Maximum total movement (deposit + withdraw) per identity per day bucket.
    pub max_daily_limit: Amount,

    /// Upper bound for a single deposit or withdrawal.
    pub max_transaction_amount: Amount,

    /// Lower bound for seeding or joining a pool.
    pub min_pool_amount: Amount,

    /// Pool capacity. Default: 10.
    pub max_pool_participants: usize,

    /// Fee retained at distribution, in whole percent. Default: 2.
    pub mixing_fee_percentage: u8,

    /// Valid pool ids are `1..=max_pool_id`.
    pub max_pool_id: PoolId,

    /// Undrained events kept in the journal. Zero disables the journal.
    /// Default: 1024.
    pub journal_capacity: usize,
}

impl LedgerConfig {
    pub fn new(admin: Identity) -> Self {
        Self {
            admin,
            max_daily_limit: 10_000_000_000,
            max_transaction_amount: 1_000_000_000,
            min_pool_amount: 100_000,
            max_pool_participants: 10,
            mixing_fee_percentage: 2,
            max_pool_id: 1_000,
            journal_capacity: 1_024,
        }
    }

    /// Load overrides from environment variables (if set).
    ///
    /// `MIXER_ADMIN` is mandatory; every other value falls back to its default
    /// when missing or unparsable.
    pub fn from_env() -> anyhow::Result<Self> {
        let admin = std::env::var("MIXER_ADMIN")
            .map_err(|_| anyhow::anyhow!("MIXER_ADMIN is required"))?
            .parse::<Identity>()
            .map_err(|e| anyhow::anyhow!("MIXER_ADMIN is not a valid address: {e}"))?;

        let mut cfg = Self::new(admin);
        if let Ok(v) = std::env::var("MIXER_MAX_DAILY_LIMIT") {
            if let Ok(n) = v.parse() {
                cfg.max_daily_limit = n;
            }
        }
        if let Ok(v) = std::env::var("MIXER_MAX_TRANSACTION_AMOUNT") {
            if let Ok(n) = v.parse() {
                cfg.max_transaction_amount = n;
            }
        }
        if let Ok(v) = std::env::var("MIXER_MIN_POOL_AMOUNT") {
            if let Ok(n) = v.parse() {
                cfg.min_pool_amount = n;
            }
        }
        if let Ok(v) = std::env::var("MIXER_MAX_POOL_PARTICIPANTS") {
            if let Ok(n) = v.parse() {
                cfg.max_pool_participants = n;
            }
        }
        if let Ok(v) = std::env::var("MIXER_FEE_PERCENTAGE") {
            if let Ok(n) = v.parse() {
                cfg.mixing_fee_percentage = n;
            }
        }
        if let Ok(v) = std::env::var("MIXER_MAX_POOL_ID") {
            if let Ok(n) = v.parse() {
                cfg.max_pool_id = n;
            }
        }
        if let Ok(v) = std::env::var("MIXER_JOURNAL_CAPACITY") {
            if let Ok(n) = v.parse() {
                cfg.journal_capacity = n;
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject deployments the engine cannot honour.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_pool_participants == 0 {
            anyhow::bail!("max_pool_participants must be at least 1");
        }
        if self.mixing_fee_percentage >= 100 {
            anyhow::bail!("mixing_fee_percentage must be below 100, got {}", self.mixing_fee_percentage);
        }
        if self.min_pool_amount == 0 {
            anyhow::bail!("min_pool_amount must be positive");
        }
        if self.max_transaction_amount == 0 {
            anyhow::bail!("max_transaction_amount must be positive");
        }
        if self.max_pool_id == 0 {
            anyhow::bail!("max_pool_id must be positive");
        }
        if self.max_daily_limit < self.max_transaction_amount {
            warn!(
                "⚠️ max_daily_limit={} is below max_transaction_amount={}, large transfers can never pass",
                self.max_daily_limit, self.max_transaction_amount,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = LedgerConfig::new(Address::repeat_byte(0xAA));
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_pool_participants, 10);
        assert_eq!(cfg.mixing_fee_percentage, 2);
    }

    #[test]
    fn test_validate_rejects_full_fee() {
        let cfg = LedgerConfig {
            mixing_fee_percentage: 100,
            ..LedgerConfig::new(Address::ZERO)
        };
        assert!(cfg.validate().is_err());
    }
}
