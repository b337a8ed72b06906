//! The external swap venue rewards are converted through.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;

#[cfg(test)]
use mockall::automock;

use crate::{
    account::StrategyAccount,
    asset::ensure_allowance,
    types::{getAmountsOutCall, getAmountsOutReturn, swapExactTokensForTokensCall},
    utils::{
        common::{call_with_dynamic_retries, decode_abi_response},
        error::{StrategyError, StrategyResult},
        evm_rpc::BlockTag,
    },
};

/// Operations the engine needs from the swap collaborator
#[cfg_attr(test, automock)]
#[allow(async_fn_in_trait)]
pub trait SwapVenue {
    /// Swaps `amount_in` along `path`, refusing less than `min_out` and
    /// aborting past `deadline` (seconds)
    async fn swap_exact_input(
        &self,
        amount_in: U256,
        min_out: U256,
        path: Vec<Address>,
        recipient: Address,
        deadline: u64,
    ) -> StrategyResult<()>;

    /// Quotes the hop amounts a swap along `path` would return
    async fn quote_amounts_out(
        &self,
        amount_in: U256,
        path: Vec<Address>,
    ) -> StrategyResult<Vec<U256>>;
}

/// UniswapV2-compatible router
pub struct UniV2Router<'a> {
    pub contract: Address,
    pub account: &'a StrategyAccount,
}

impl SwapVenue for UniV2Router<'_> {
    async fn swap_exact_input(
        &self,
        amount_in: U256,
        min_out: U256,
        path: Vec<Address>,
        recipient: Address,
        deadline: u64,
    ) -> StrategyResult<()> {
        let token_in = *path.first().ok_or(StrategyError::NonExistentValue)?;
        ensure_allowance(self.account, token_in, self.contract, amount_in).await?;

        let data = swapExactTokensForTokensCall {
            amountIn: amount_in,
            amountOutMin: min_out,
            path,
            to: recipient,
            deadline: U256::from(deadline),
        }
        .abi_encode();
        self.account.send(self.contract, data, U256::ZERO).await
    }

    async fn quote_amounts_out(
        &self,
        amount_in: U256,
        path: Vec<Address>,
    ) -> StrategyResult<Vec<U256>> {
        let data = getAmountsOutCall {
            amountIn: amount_in,
            path,
        }
        .abi_encode();
        let response = call_with_dynamic_retries(
            &self.account.rpc_canister,
            BlockTag::Latest,
            self.contract,
            data,
        )
        .await?;
        decode_abi_response::<getAmountsOutReturn, getAmountsOutCall>(response)
            .map(|decoded| decoded.amounts)
    }
}
