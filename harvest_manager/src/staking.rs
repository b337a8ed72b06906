//! The external staking protocol the strategy compounds into.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;

#[cfg(test)]
use mockall::automock;

use crate::{
    account::StrategyAccount,
    asset::ensure_allowance,
    types::{
        claimableRewardsCall, claimableRewardsReturn, exitCall, getRewardCall, stakeCall,
        totalBalanceCall, totalBalanceReturn, withdrawCall, withdrawableBalanceCall,
        withdrawableBalanceReturn,
    },
    utils::{
        common::{call_with_dynamic_retries, decode_abi_response},
        error::StrategyResult,
        evm_rpc::BlockTag,
    },
};

/// Operations the engine needs from the staking collaborator
#[cfg_attr(test, automock)]
#[allow(async_fn_in_trait)]
pub trait StakingProtocol {
    async fn stake(&self, amount: U256, lock: bool) -> StrategyResult<()>;
    async fn withdraw(&self, amount: U256) -> StrategyResult<()>;
    /// Claims every pending reward
    async fn get_reward(&self) -> StrategyResult<()>;
    /// Withdraws the full balance and claims in one call
    async fn exit(&self) -> StrategyResult<()>;
    /// Pending (asset, amount) reward pairs for an account
    async fn claimable_rewards(&self, account: Address) -> StrategyResult<Vec<(Address, U256)>>;
    /// Total staked balance of an account
    async fn total_balance(&self, account: Address) -> StrategyResult<U256>;
    /// (withdrawable amount, early-exit penalty) of an account
    async fn withdrawable_balance(&self, account: Address) -> StrategyResult<(U256, U256)>;
}

/// Multi-reward staking contract of the MultiFeeDistribution family
pub struct MultiFeeDistribution<'a> {
    pub contract: Address,
    pub base_asset: Address,
    pub account: &'a StrategyAccount,
}

impl MultiFeeDistribution<'_> {
    async fn read(&self, data: Vec<u8>) -> StrategyResult<String> {
        call_with_dynamic_retries(
            &self.account.rpc_canister,
            BlockTag::Latest,
            self.contract,
            data,
        )
        .await
    }
}

impl StakingProtocol for MultiFeeDistribution<'_> {
    async fn stake(&self, amount: U256, lock: bool) -> StrategyResult<()> {
        ensure_allowance(self.account, self.base_asset, self.contract, amount).await?;
        let data = stakeCall { amount, lock }.abi_encode();
        self.account.send(self.contract, data, U256::ZERO).await
    }

    async fn withdraw(&self, amount: U256) -> StrategyResult<()> {
        let data = withdrawCall { amount }.abi_encode();
        self.account.send(self.contract, data, U256::ZERO).await
    }

    async fn get_reward(&self) -> StrategyResult<()> {
        self.account
            .send(self.contract, getRewardCall::SELECTOR.to_vec(), U256::ZERO)
            .await
    }

    async fn exit(&self) -> StrategyResult<()> {
        self.account
            .send(self.contract, exitCall::SELECTOR.to_vec(), U256::ZERO)
            .await
    }

    async fn claimable_rewards(&self, account: Address) -> StrategyResult<Vec<(Address, U256)>> {
        let data = claimableRewardsCall { account }.abi_encode();
        let response = self.read(data).await?;
        let rewards =
            decode_abi_response::<claimableRewardsReturn, claimableRewardsCall>(response)?.rewards;
        Ok(rewards
            .into_iter()
            .map(|reward| (reward.token, reward.amount))
            .collect())
    }

    async fn total_balance(&self, account: Address) -> StrategyResult<U256> {
        let data = totalBalanceCall { user: account }.abi_encode();
        let response = self.read(data).await?;
        decode_abi_response::<totalBalanceReturn, totalBalanceCall>(response)
            .map(|decoded| decoded._0)
    }

    async fn withdrawable_balance(&self, account: Address) -> StrategyResult<(U256, U256)> {
        let data = withdrawableBalanceCall { user: account }.abi_encode();
        let response = self.read(data).await?;
        decode_abi_response::<withdrawableBalanceReturn, withdrawableBalanceCall>(response)
            .map(|decoded| (decoded.amount, decoded.penaltyAmount))
    }
}
