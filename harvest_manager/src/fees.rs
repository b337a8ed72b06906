//! Harvest fee policy.
//!
//! All fractions are integers over `PERCENT_DIVISOR`; the caller and
//! treasury shares are rounded independently from the same fee pool, so
//! up to two units of dust per harvest stay in the strategy rather than
//! being distributed.

use alloy_primitives::U256;
use candid::CandidType;
use serde::Deserialize;

use crate::{
    constants::{percent_divisor, MAX_FEE, MAX_SECURITY_FEE, PERCENT_DIVISOR},
    utils::error::{arithmetic_err, StrategyError, StrategyResult},
};

/// Fee fractions of the strategy, all denominated over `PERCENT_DIVISOR`
#[derive(Clone, CandidType, Debug, Deserialize, PartialEq)]
pub struct FeeConfig {
    /// Fraction of gross harvest profit charged as the total fee
    pub total_fee: u64,
    /// Fraction of the total fee paid to whoever triggered the harvest
    pub call_fee: u64,
    /// Fraction of the total fee paid to the treasury, always the
    /// complement of `call_fee`
    pub treasury_fee: u64,
    /// Fraction withheld from withdrawals, independent of harvest fees
    pub security_fee: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            total_fee: 450,
            call_fee: 1_000,
            treasury_fee: PERCENT_DIVISOR - 1_000,
            security_fee: 10,
        }
    }
}

/// Outcome of splitting one harvest's gross profit
#[derive(Clone, Debug, PartialEq)]
pub struct FeeSplit {
    pub caller_amount: U256,
    pub treasury_amount: U256,
    pub net_profit: U256,
}

impl FeeConfig {
    /// Updates the total fee. Errs with `FeeTooHigh` above `MAX_FEE`.
    pub fn set_total_fee(&mut self, new_total_fee: u64) -> StrategyResult<()> {
        if new_total_fee > MAX_FEE {
            return Err(StrategyError::FeeTooHigh);
        }
        self.total_fee = new_total_fee;
        Ok(())
    }

    /// Updates the call fee and derives the treasury fee as its
    /// complement. Values above `PERCENT_DIVISOR` would make the
    /// complement underflow and are rejected.
    pub fn set_call_fee(&mut self, new_call_fee: u64) -> StrategyResult<()> {
        if new_call_fee > PERCENT_DIVISOR {
            return Err(StrategyError::FeeTooHigh);
        }
        self.call_fee = new_call_fee;
        self.treasury_fee = PERCENT_DIVISOR - new_call_fee;
        Ok(())
    }

    /// Updates the withdrawal security fee. Errs with `FeeTooHigh` above
    /// `MAX_SECURITY_FEE`.
    pub fn set_security_fee(&mut self, new_security_fee: u64) -> StrategyResult<()> {
        if new_security_fee > MAX_SECURITY_FEE {
            return Err(StrategyError::FeeTooHigh);
        }
        self.security_fee = new_security_fee;
        Ok(())
    }

    /// Splits a gross profit into the caller share, the treasury share
    /// and the net amount left for redepositing.
    ///
    /// Multiply-before-divide keeps precision; the two shares round down
    /// independently instead of one being the fee remainder.
    pub fn split(&self, gross_profit: U256) -> StrategyResult<FeeSplit> {
        let fee = gross_profit
            .checked_mul(U256::from(self.total_fee))
            .ok_or_else(|| arithmetic_err("total fee multiplication overflowed"))?
            / percent_divisor();

        let caller_amount = fee
            .checked_mul(U256::from(self.call_fee))
            .ok_or_else(|| arithmetic_err("call fee multiplication overflowed"))?
            / percent_divisor();

        let treasury_amount = fee
            .checked_mul(U256::from(self.treasury_fee))
            .ok_or_else(|| arithmetic_err("treasury fee multiplication overflowed"))?
            / percent_divisor();

        let net_profit = gross_profit
            .checked_sub(fee)
            .ok_or_else(|| arithmetic_err("fee exceeded the gross profit"))?;

        Ok(FeeSplit {
            caller_amount,
            treasury_amount,
            net_profit,
        })
    }

    /// The amount withheld from a withdrawal of `amount`
    pub fn withdrawal_fee(&self, amount: U256) -> StrategyResult<U256> {
        Ok(amount
            .checked_mul(U256::from(self.security_fee))
            .ok_or_else(|| arithmetic_err("security fee multiplication overflowed"))?
            / percent_divisor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_config_is_complementary() {
        let config = FeeConfig::default();
        assert_eq!(config.call_fee + config.treasury_fee, PERCENT_DIVISOR);
        assert!(config.total_fee <= MAX_FEE);
    }

    #[test]
    fn total_fee_cap_is_enforced() {
        let mut config = FeeConfig::default();
        assert_eq!(
            config.set_total_fee(MAX_FEE + 1),
            Err(StrategyError::FeeTooHigh)
        );
        assert!(config.set_total_fee(MAX_FEE).is_ok());
        assert_eq!(config.total_fee, MAX_FEE);
    }

    #[test]
    fn call_fee_above_the_divisor_is_rejected() {
        let mut config = FeeConfig::default();
        assert_eq!(
            config.set_call_fee(PERCENT_DIVISOR + 1),
            Err(StrategyError::FeeTooHigh)
        );
    }

    #[test]
    fn security_fee_cap_is_enforced() {
        let mut config = FeeConfig::default();
        assert_eq!(
            config.set_security_fee(MAX_SECURITY_FEE + 1),
            Err(StrategyError::FeeTooHigh)
        );
        assert!(config.set_security_fee(MAX_SECURITY_FEE).is_ok());
    }

    #[test]
    fn split_matches_the_reference_scenario() {
        // 100 tokens of gross profit at 18 decimals, totalFee 450,
        // callFee 1000: fee 4.5, caller 0.45, treasury 4.05, net 95.5
        let config = FeeConfig::default();
        let one = U256::from(10_u128.pow(18));
        let split = config.split(U256::from(100) * one).unwrap();

        assert_eq!(split.caller_amount, U256::from(45) * one / U256::from(100));
        assert_eq!(
            split.treasury_amount,
            U256::from(405) * one / U256::from(100)
        );
        assert_eq!(split.net_profit, U256::from(955) * one / U256::from(10));
    }

    #[test]
    fn split_of_zero_is_zero() {
        let split = FeeConfig::default().split(U256::ZERO).unwrap();
        assert_eq!(split.caller_amount, U256::ZERO);
        assert_eq!(split.treasury_amount, U256::ZERO);
        assert_eq!(split.net_profit, U256::ZERO);
    }

    #[test]
    fn withdrawal_fee_uses_the_security_fraction() {
        let config = FeeConfig::default();
        let fee = config.withdrawal_fee(U256::from(1_000_000)).unwrap();
        assert_eq!(fee, U256::from(1_000)); // 10 bps
    }

    proptest! {
        #[test]
        fn fees_are_conserved(
            gross in any::<u128>(),
            total_fee in 0u64..=MAX_FEE,
            call_fee in 0u64..=PERCENT_DIVISOR,
        ) {
            let mut config = FeeConfig::default();
            config.set_total_fee(total_fee).unwrap();
            config.set_call_fee(call_fee).unwrap();

            let gross = U256::from(gross);
            let split = config.split(gross).unwrap();
            let fee = gross * U256::from(total_fee) / percent_divisor();

            // Shares never exceed the fee pool, dust stays bounded by the
            // number of independently rounded components
            let distributed = split.caller_amount + split.treasury_amount;
            prop_assert!(distributed <= fee);
            prop_assert!(fee - distributed <= U256::from(2));

            // Everything sums back to the gross profit
            prop_assert_eq!(split.net_profit + fee, gross);
        }

        #[test]
        fn call_and_treasury_fees_stay_complementary(call_fee in 0u64..=PERCENT_DIVISOR) {
            let mut config = FeeConfig::default();
            config.set_call_fee(call_fee).unwrap();
            prop_assert_eq!(config.call_fee, call_fee);
            prop_assert_eq!(config.treasury_fee, PERCENT_DIVISOR - call_fee);
        }

        #[test]
        fn total_fee_cap_rejects_everything_above(excess in MAX_FEE + 1..u64::MAX / 2) {
            let mut config = FeeConfig::default();
            prop_assert_eq!(config.set_total_fee(excess), Err(StrategyError::FeeTooHigh));
            // a failed update leaves the previous value untouched
            prop_assert_eq!(config.total_fee, FeeConfig::default().total_fee);
        }
    }
}
