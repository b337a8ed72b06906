//! ERC-20 access for the strategy account.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;

#[cfg(test)]
use mockall::automock;

use crate::{
    account::StrategyAccount,
    types::{allowanceCall, allowanceReturn, approveCall, balanceOfCall, balanceOfReturn, transferCall},
    utils::{
        common::{call_with_dynamic_retries, decode_abi_response},
        error::StrategyResult,
        evm_rpc::BlockTag,
    },
};

/// Token balance reads and transfers, abstracted for engine tests
#[cfg_attr(test, automock)]
#[allow(async_fn_in_trait)]
pub trait AssetClient {
    async fn balance_of(&self, token: Address, holder: Address) -> StrategyResult<U256>;
    async fn transfer(&self, token: Address, to: Address, amount: U256) -> StrategyResult<()>;
}

/// Live ERC-20 client backed by the strategy account
pub struct Erc20Client<'a> {
    pub account: &'a StrategyAccount,
}

impl AssetClient for Erc20Client<'_> {
    async fn balance_of(&self, token: Address, holder: Address) -> StrategyResult<U256> {
        let data = balanceOfCall { account: holder }.abi_encode();
        let response =
            call_with_dynamic_retries(&self.account.rpc_canister, BlockTag::Latest, token, data)
                .await?;
        decode_abi_response::<balanceOfReturn, balanceOfCall>(response).map(|decoded| decoded._0)
    }

    async fn transfer(&self, token: Address, to: Address, amount: U256) -> StrategyResult<()> {
        let data = transferCall { to, value: amount }.abi_encode();
        self.account.send(token, data, U256::ZERO).await
    }
}

/// Grants the spender an unlimited allowance when the current one cannot
/// cover `amount`. Spenders are the staking contract and the swap router,
/// both part of the strategy's trusted configuration.
pub async fn ensure_allowance(
    account: &StrategyAccount,
    token: Address,
    spender: Address,
    amount: U256,
) -> StrategyResult<()> {
    let data = allowanceCall {
        owner: account.address,
        spender,
    }
    .abi_encode();
    let response =
        call_with_dynamic_retries(&account.rpc_canister, BlockTag::Latest, token, data).await?;
    let current = decode_abi_response::<allowanceReturn, allowanceCall>(response)?._0;

    if current >= amount {
        return Ok(());
    }

    let data = approveCall {
        spender,
        value: U256::MAX,
    }
    .abi_encode();
    account.send(token, data, U256::ZERO).await
}
