//! Stable strategy snapshot held in the canister state

use crate::{
    state::STRATEGY_STATE,
    utils::error::{StrategyError, StrategyResult},
};

use super::{
    data::StrategyData,
    executable::ExecutableStrategy,
    lock::{Lock, StableLock},
    settings::StrategySettings,
};

/// The persisted form of the strategy
#[derive(Clone, Default)]
pub struct StableStrategy {
    /// Immutable settings and configurations
    pub settings: StrategySettings,
    /// Mutable state
    pub data: StrategyData,
    /// Lock state; determines if a sequence is currently executing
    pub lock: StableLock,
    /// Whether `mint` has installed this strategy
    pub initialized: bool,
}

impl StableStrategy {
    /// Set the strategy settings
    pub fn settings(&mut self, settings: StrategySettings) -> &mut Self {
        self.settings = settings;
        self
    }

    /// Set the strategy data
    pub fn data(&mut self, data: StrategyData) -> &mut Self {
        self.data = data;
        self
    }

    /// Installs the strategy into the canister state. A canister runs
    /// exactly one strategy, so a second mint is rejected.
    pub fn mint(&self) -> StrategyResult<()> {
        STRATEGY_STATE.with(|strategy| {
            let mut binding = strategy.borrow_mut();
            if binding.initialized {
                return Err(StrategyError::Custom(
                    "A strategy is already installed on this canister.".to_string(),
                ));
            }
            let mut minted = self.clone();
            minted.initialized = true;
            *binding = minted;
            Ok(())
        })
    }
}

impl From<&StableStrategy> for ExecutableStrategy {
    fn from(value: &StableStrategy) -> Self {
        ExecutableStrategy::new(
            value.settings.clone(),
            value.data.clone(),
            Lock::from(value.lock.clone()),
            value.initialized,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};

    #[test]
    fn builder_setters_assign_components() {
        let mut settings = StrategySettings::default();
        settings.base_asset(Address::repeat_byte(0x11));

        let mut data = StrategyData::default();
        data.last_harvest(1_700_000_000)
            .lifetime_gross_profit(U256::from(5));

        let mut stable = StableStrategy::default();
        stable.settings(settings).data(data);

        assert_eq!(stable.settings.base_asset, Address::repeat_byte(0x11));
        assert_eq!(stable.data.last_harvest, 1_700_000_000);
        assert_eq!(stable.data.lifetime_gross_profit, U256::from(5));
    }

    #[test]
    fn mint_installs_the_strategy_once() {
        let stable = StableStrategy::default();
        assert!(stable.mint().is_ok());

        STRATEGY_STATE.with(|state| assert!(state.borrow().initialized));

        // the second install attempt is rejected
        let result = StableStrategy::default().mint();
        assert!(matches!(result, Err(StrategyError::Custom(_))));
    }

    #[test]
    fn executable_conversion_carries_the_snapshot() {
        let mut stable = StableStrategy {
            initialized: true,
            ..Default::default()
        };
        stable.settings.base_asset(Address::repeat_byte(0x11));
        stable.data.last_harvest(42);
        stable.lock.is_locked = true;
        stable.lock.last_locked_at = Some(40);

        let executable: ExecutableStrategy = (&stable).into();
        assert_eq!(
            executable.settings.base_asset,
            Address::repeat_byte(0x11)
        );
        assert_eq!(executable.data.last_harvest, 42);
        assert!(executable.lock.is_locked);
        assert_eq!(executable.lock.last_locked_at, Some(40));
        assert!(executable.initialized);
    }
}
