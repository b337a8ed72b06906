//! Total strategy value.

use alloy_primitives::{Address, U256};

use crate::{
    asset::AssetClient,
    staking::StakingProtocol,
    utils::error::{arithmetic_err, StrategyResult},
};

/// Idle balance of the strategy account plus its staked balance, read
/// live from the chain. No caching: the harvest engine compares two of
/// these snapshots to realize profit.
pub async fn total_value<S: StakingProtocol, A: AssetClient>(
    staking: &S,
    asset: &A,
    base_asset: Address,
    account: Address,
) -> StrategyResult<U256> {
    let idle = asset.balance_of(base_asset, account).await?;
    let staked = staking.total_balance(account).await?;

    idle.checked_add(staked)
        .ok_or_else(|| arithmetic_err("The total strategy value overflowed."))
}
