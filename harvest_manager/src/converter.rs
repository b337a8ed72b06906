//! Claims rewards from the staking collaborator and converts every
//! convertible asset into the strategy's base asset.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};

use crate::{
    asset::AssetClient,
    constants::{percent_divisor, PERCENT_DIVISOR},
    journal::{JournalCollection, LogType},
    staking::StakingProtocol,
    state::{CONVERSION_DENYLIST, REWARD_ROUTES},
    swap::SwapVenue,
    utils::error::{arithmetic_err, StrategyError, StrategyResult},
};

/// Rejects malformed route entries before they reach the routing table
pub fn validate_route(asset: Address, path: &[Address], base_asset: Address) -> StrategyResult<()> {
    if asset == base_asset {
        return Err(StrategyError::Custom(
            "The base asset needs no conversion route.".to_string(),
        ));
    }
    if path.first() != Some(&asset) || path.last() != Some(&base_asset) {
        return Err(StrategyError::Custom(
            "A reward route must start at the reward asset and end at the base asset.".to_string(),
        ));
    }
    Ok(())
}

/// One harvest's claim-and-convert pass
pub struct RewardConverter<'a, S, V, A> {
    pub staking: &'a S,
    pub swap: &'a V,
    pub asset: &'a A,
    pub base_asset: Address,
    pub account: Address,
    pub routes: BTreeMap<Address, Vec<Address>>,
    pub denylist: Vec<Address>,
    /// Swap slippage tolerance in basis points. Zero accepts whatever the
    /// venue returns; operators are expected to configure a real tolerance.
    pub slippage: u64,
    /// Absolute deadline (seconds) handed to the swap venue
    pub deadline: u64,
}

impl<'a, S, V, A> RewardConverter<'a, S, V, A>
where
    S: StakingProtocol,
    V: SwapVenue,
    A: AssetClient,
{
    /// Builds a converter over the configured routing table and denylist
    pub fn new(
        staking: &'a S,
        swap: &'a V,
        asset: &'a A,
        base_asset: Address,
        account: Address,
        slippage: u64,
        deadline: u64,
    ) -> Self {
        Self {
            staking,
            swap,
            asset,
            base_asset,
            account,
            routes: REWARD_ROUTES.with(|routes| routes.borrow().clone()),
            denylist: CONVERSION_DENYLIST.with(|denylist| denylist.borrow().clone()),
            slippage,
            deadline,
        }
    }

    /// Claims all pending rewards and swaps every convertible balance into
    /// the base asset. Returns the base asset gained, measured as the idle
    /// balance delta around the whole pass.
    pub async fn claim_and_convert(
        &self,
        journal: &mut JournalCollection,
    ) -> StrategyResult<U256> {
        let idle_before = self.asset.balance_of(self.base_asset, self.account).await?;

        let claimable = self.staking.claimable_rewards(self.account).await?;
        self.staking.get_reward().await?;

        for (token, amount) in claimable {
            if amount == U256::ZERO || self.is_excluded(token) {
                continue;
            }

            let Some(route) = self.routes.get(&token) else {
                journal.append_note(
                    Ok(()),
                    LogType::Info,
                    format!("No conversion route for reward asset {token}; leaving it idle."),
                );
                continue;
            };

            // swap whatever actually arrived, not the pre-claim quote
            let balance = self.asset.balance_of(token, self.account).await?;
            if balance == U256::ZERO {
                continue;
            }

            let min_out = self.minimum_output(balance, route).await?;
            self.swap
                .swap_exact_input(balance, min_out, route.clone(), self.account, self.deadline)
                .await?;
        }

        let idle_after = self.asset.balance_of(self.base_asset, self.account).await?;
        idle_after
            .checked_sub(idle_before)
            .ok_or_else(|| arithmetic_err("The idle balance shrank during conversion."))
    }

    /// Values the pending rewards in base-asset terms using read-only
    /// quotes; the traversal mirrors `claim_and_convert`.
    pub async fn estimate(&self) -> StrategyResult<U256> {
        let claimable = self.staking.claimable_rewards(self.account).await?;
        let mut expected = U256::ZERO;

        for (token, amount) in claimable {
            if amount == U256::ZERO || self.denylist.contains(&token) {
                continue;
            }

            if token == self.base_asset {
                expected = expected
                    .checked_add(amount)
                    .ok_or_else(|| arithmetic_err("The estimated gross overflowed."))?;
                continue;
            }

            let Some(route) = self.routes.get(&token) else {
                continue;
            };

            let amounts = self.swap.quote_amounts_out(amount, route.clone()).await?;
            let out = amounts
                .last()
                .copied()
                .ok_or(StrategyError::NonExistentValue)?;
            expected = expected
                .checked_add(out)
                .ok_or_else(|| arithmetic_err("The estimated gross overflowed."))?;
        }

        Ok(expected)
    }

    fn is_excluded(&self, token: Address) -> bool {
        token == self.base_asset || self.denylist.contains(&token)
    }

    async fn minimum_output(&self, amount_in: U256, route: &[Address]) -> StrategyResult<U256> {
        if self.slippage == 0 {
            return Ok(U256::ZERO);
        }

        let amounts = self
            .swap
            .quote_amounts_out(amount_in, route.to_vec())
            .await?;
        let expected = amounts
            .last()
            .copied()
            .ok_or(StrategyError::NonExistentValue)?;

        Ok(expected
            .checked_mul(U256::from(PERCENT_DIVISOR - self.slippage))
            .ok_or_else(|| arithmetic_err("The minimum output overflowed."))?
            / percent_divisor())
    }
}
