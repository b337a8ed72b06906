//! Mutable strategy data

use alloy_primitives::U256;
use candid::{CandidType, Nat};

use crate::utils::common::u256_to_nat;

/// Struct containing all mutable bookkeeping of the strategy
#[derive(Clone, Default)]
pub struct StrategyData {
    /// Completion time of the last successful harvest, in seconds.
    /// Zero until the first harvest.
    pub last_harvest: u64,
    /// The strategy account's nonce
    pub eoa_nonce: u64,
    /// Total base asset received from reward conversion over the
    /// strategy's lifetime
    pub lifetime_gross_profit: U256,
}

impl StrategyData {
    /// Sets the last harvest timestamp for the strategy.
    pub fn last_harvest(&mut self, last_harvest: u64) -> &mut Self {
        self.last_harvest = last_harvest;
        self
    }

    /// Sets the account nonce for the strategy.
    pub fn eoa_nonce(&mut self, eoa_nonce: u64) -> &mut Self {
        self.eoa_nonce = eoa_nonce;
        self
    }

    /// Sets the lifetime gross profit for the strategy.
    pub fn lifetime_gross_profit(&mut self, lifetime_gross_profit: U256) -> &mut Self {
        self.lifetime_gross_profit = lifetime_gross_profit;
        self
    }
}

/// Candid-friendly projection of the strategy data
#[derive(Clone, Default, CandidType)]
pub struct StrategyDataQuery {
    pub last_harvest: u64,
    pub eoa_nonce: u64,
    pub lifetime_gross_profit: Nat,
}

impl From<StrategyData> for StrategyDataQuery {
    fn from(value: StrategyData) -> Self {
        Self {
            last_harvest: value.last_harvest,
            eoa_nonce: value.eoa_nonce,
            lifetime_gross_profit: u256_to_nat(&value.lifetime_gross_profit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_setters_assign_every_field() {
        let mut data = StrategyData::default();
        data.last_harvest(1_700_000_000)
            .eoa_nonce(7)
            .lifetime_gross_profit(U256::from(12_345));

        assert_eq!(data.last_harvest, 1_700_000_000);
        assert_eq!(data.eoa_nonce, 7);
        assert_eq!(data.lifetime_gross_profit, U256::from(12_345));
    }

    #[test]
    fn query_projection_converts_the_profit() {
        let mut data = StrategyData::default();
        data.lifetime_gross_profit(U256::from(99));

        let query: StrategyDataQuery = data.into();
        assert_eq!(query.lifetime_gross_profit, Nat::from(99_u64));
    }
}
