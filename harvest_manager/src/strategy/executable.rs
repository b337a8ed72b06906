//! The executable strategy wrapper that runs the mutating sequences.
//!
//! Each sequence acquires the strategy lock for its whole duration, reads
//! its balance snapshots, talks to the external collaborators and only
//! then commits internal state: on any error the ledger, the fee
//! bookkeeping and the harvest timestamps are left exactly as they were.

use alloy_primitives::{Address, I256, U256};

use crate::{
    asset::AssetClient,
    balance,
    converter::RewardConverter,
    halt,
    journal::{JournalCollection, LogType},
    ledger,
    staking::StakingProtocol,
    state::{FEE_CONFIG, STRATEGY_STATE},
    swap::SwapVenue,
    utils::{
        common::u256_to_i256,
        error::{arithmetic_err, StrategyError, StrategyResult},
    },
};

use super::{data::StrategyData, lock::Lock, settings::StrategySettings};

/// Result of one executed harvest sequence
#[derive(Clone, Debug, PartialEq)]
pub struct HarvestOutcome {
    /// Base asset received from converting the claimed rewards
    pub gross: U256,
    /// Fee share transferred to the harvest caller
    pub caller_amount: U256,
    /// Fee share transferred to the treasury
    pub treasury_amount: U256,
    /// Realized change of total value, signed
    pub profit: I256,
    pub tvl_before: U256,
    pub tvl_after: U256,
    /// Whether the cadence gate let this harvest into the log
    pub logged: bool,
}

#[derive(Clone, Default)]
pub struct ExecutableStrategy {
    /// Immutable settings and configurations
    pub settings: StrategySettings,
    /// Mutable state
    pub data: StrategyData,
    /// Lock for the strategy; set while a sequence is executing
    pub lock: Lock,
    /// Whether the strategy has been installed
    pub initialized: bool,
    /// Tracks if this instance holds the lock, for release on drop
    acquired_lock: bool,
}

impl ExecutableStrategy {
    pub fn new(
        settings: StrategySettings,
        data: StrategyData,
        lock: Lock,
        initialized: bool,
    ) -> ExecutableStrategy {
        ExecutableStrategy {
            settings,
            data,
            lock,
            initialized,
            acquired_lock: false,
        }
    }

    /// Commits the bookkeeping and lock state back into the canister
    /// state. Settings are deliberately left alone: owner-gated setters
    /// may land while a sequence awaits an external call.
    fn apply_change(&self) {
        STRATEGY_STATE.with(|strategy| {
            let mut stored = strategy.borrow_mut();
            stored.data = self.data.clone();
            stored.lock = self.lock.clone().into();
        });
    }

    /// Locks the strategy for the duration of a sequence
    fn lock(&mut self, now: u64) -> StrategyResult<()> {
        self.lock.try_lock(now).map(|_| {
            self.acquired_lock = true;
            self.apply_change();
        })
    }

    /// Releases the lock if this instance holds it
    pub fn unlock(&mut self) {
        if self.acquired_lock {
            self.lock.release(true);
            self.acquired_lock = false;
            self.apply_change();
        }
    }

    /// The full harvest sequence: claim, convert, charge fees, redeposit,
    /// measure, log.
    pub async fn harvest<S, V, A>(
        &mut self,
        journal: &mut JournalCollection,
        staking: &S,
        swap: &V,
        asset: &A,
        now: u64,
        recipient: Address,
    ) -> StrategyResult<HarvestOutcome>
    where
        S: StakingProtocol,
        V: SwapVenue,
        A: AssetClient,
    {
        halt::require_functional()?;
        self.lock(now)?;
        let result = self
            .harvest_sequence(journal, staking, swap, asset, now, recipient)
            .await;
        self.unlock();
        result
    }

    async fn harvest_sequence<S, V, A>(
        &mut self,
        journal: &mut JournalCollection,
        staking: &S,
        swap: &V,
        asset: &A,
        now: u64,
        recipient: Address,
    ) -> StrategyResult<HarvestOutcome>
    where
        S: StakingProtocol,
        V: SwapVenue,
        A: AssetClient,
    {
        let eoa = self.settings.eoa.ok_or(StrategyError::NonExistentValue)?;
        let base_asset = self.settings.base_asset;

        let tvl_before = balance::total_value(staking, asset, base_asset, eoa).await?;
        journal.append_note(
            Ok(()),
            LogType::Info,
            format!("Total value before the harvest: {tvl_before}."),
        );

        let converter = RewardConverter::new(
            staking,
            swap,
            asset,
            base_asset,
            eoa,
            self.settings.slippage,
            now + self.settings.swap_deadline,
        );
        let gross = converter.claim_and_convert(journal).await?;

        let split = FEE_CONFIG.with(|config| config.borrow().split(gross))?;
        if split.caller_amount > U256::ZERO {
            asset
                .transfer(base_asset, recipient, split.caller_amount)
                .await?;
        }
        if split.treasury_amount > U256::ZERO {
            asset
                .transfer(base_asset, self.settings.treasury, split.treasury_amount)
                .await?;
        }

        // compound whatever sits idle, not just this harvest's net profit
        let idle = asset.balance_of(base_asset, eoa).await?;
        if idle > U256::ZERO {
            staking.stake(idle, false).await?;
        }

        let tvl_after = balance::total_value(staking, asset, base_asset, eoa).await?;
        let profit = u256_to_i256(tvl_after)?
            .checked_sub(u256_to_i256(tvl_before)?)
            .ok_or_else(|| arithmetic_err("The realized profit overflowed."))?;

        let time_since_last = if self.data.last_harvest == 0 {
            0
        } else {
            now.saturating_sub(self.data.last_harvest)
        };
        let logged = ledger::append_harvest_record(now, tvl_before, profit, time_since_last)?;

        self.data.last_harvest = now;
        self.data.lifetime_gross_profit =
            self.data.lifetime_gross_profit.saturating_add(gross);
        self.apply_change();

        journal.append_note(
            Ok(()),
            LogType::HarvestResult,
            format!(
                "Harvested {gross} gross, realized profit {profit}, caller incentive {}.",
                split.caller_amount
            ),
        );

        Ok(HarvestOutcome {
            gross,
            caller_amount: split.caller_amount,
            treasury_amount: split.treasury_amount,
            profit,
            tvl_before,
            tvl_after,
            logged,
        })
    }

    /// Sends `amount` of the base asset to the vault, un-staking the
    /// shortfall and withholding the security fee.
    pub async fn withdraw<S, A>(
        &mut self,
        journal: &mut JournalCollection,
        staking: &S,
        asset: &A,
        now: u64,
        amount: U256,
    ) -> StrategyResult<U256>
    where
        S: StakingProtocol,
        A: AssetClient,
    {
        self.lock(now)?;
        let result = self.withdraw_sequence(journal, staking, asset, amount).await;
        self.unlock();
        result
    }

    async fn withdraw_sequence<S, A>(
        &mut self,
        journal: &mut JournalCollection,
        staking: &S,
        asset: &A,
        amount: U256,
    ) -> StrategyResult<U256>
    where
        S: StakingProtocol,
        A: AssetClient,
    {
        let eoa = self.settings.eoa.ok_or(StrategyError::NonExistentValue)?;
        let base_asset = self.settings.base_asset;

        let mut idle = asset.balance_of(base_asset, eoa).await?;
        if idle < amount {
            staking.withdraw(amount - idle).await?;
            idle = asset.balance_of(base_asset, eoa).await?;
        }

        let amount = amount.min(idle);
        let fee = FEE_CONFIG.with(|config| config.borrow().withdrawal_fee(amount))?;
        let payout = amount
            .checked_sub(fee)
            .ok_or_else(|| arithmetic_err("The security fee exceeded the withdrawal."))?;

        if payout > U256::ZERO {
            asset.transfer(base_asset, self.settings.vault, payout).await?;
        }

        self.apply_change();
        journal.append_note(
            Ok(()),
            LogType::WithdrawResult,
            format!("Sent {payout} to the vault, withholding {fee} as the security fee."),
        );

        Ok(payout)
    }

    /// Exits the staking position entirely and returns every idle unit of
    /// the base asset to the vault.
    pub async fn retire<S, A>(
        &mut self,
        journal: &mut JournalCollection,
        staking: &S,
        asset: &A,
        now: u64,
    ) -> StrategyResult<U256>
    where
        S: StakingProtocol,
        A: AssetClient,
    {
        self.lock(now)?;
        let result = self.retire_sequence(journal, staking, asset).await;
        self.unlock();
        result
    }

    async fn retire_sequence<S, A>(
        &mut self,
        journal: &mut JournalCollection,
        staking: &S,
        asset: &A,
    ) -> StrategyResult<U256>
    where
        S: StakingProtocol,
        A: AssetClient,
    {
        let eoa = self.settings.eoa.ok_or(StrategyError::NonExistentValue)?;
        let base_asset = self.settings.base_asset;

        let (withdrawable, penalty) = staking.withdrawable_balance(eoa).await?;
        journal.append_note(
            Ok(()),
            LogType::Info,
            format!("Exiting with {withdrawable} withdrawable and a {penalty} penalty exposure."),
        );

        staking.exit().await?;

        let idle = asset.balance_of(base_asset, eoa).await?;
        if idle > U256::ZERO {
            asset.transfer(base_asset, self.settings.vault, idle).await?;
        }

        self.apply_change();
        journal.append_note(
            Ok(()),
            LogType::RetireResult,
            format!("Retired the strategy and returned {idle} to the vault."),
        );

        Ok(idle)
    }

    /// Stakes the entire idle balance. Rejected while paused.
    pub async fn deposit<S, A>(
        &mut self,
        journal: &mut JournalCollection,
        staking: &S,
        asset: &A,
        now: u64,
    ) -> StrategyResult<U256>
    where
        S: StakingProtocol,
        A: AssetClient,
    {
        halt::require_functional()?;
        self.lock(now)?;
        let result = self.deposit_sequence(journal, staking, asset).await;
        self.unlock();
        result
    }

    async fn deposit_sequence<S, A>(
        &mut self,
        journal: &mut JournalCollection,
        staking: &S,
        asset: &A,
    ) -> StrategyResult<U256>
    where
        S: StakingProtocol,
        A: AssetClient,
    {
        let eoa = self.settings.eoa.ok_or(StrategyError::NonExistentValue)?;

        let idle = asset.balance_of(self.settings.base_asset, eoa).await?;
        if idle > U256::ZERO {
            staking.stake(idle, false).await?;
        }

        self.apply_change();
        journal.append_note(
            Ok(()),
            LogType::DepositResult,
            format!("Staked {idle} idle base asset."),
        );

        Ok(idle)
    }
}

impl Drop for ExecutableStrategy {
    /// Releases the lock when the instance goes out of scope
    fn drop(&mut self) {
        self.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::MockAssetClient;
    use crate::staking::MockStakingProtocol;
    use crate::swap::MockSwapVenue;
    use crate::state::{HALT_STATE, REWARD_ROUTES};
    use crate::testing::block_on;

    const BASE: Address = Address::repeat_byte(0x01);
    const REWARD: Address = Address::repeat_byte(0x02);
    const TREASURY: Address = Address::repeat_byte(0x0a);
    const VAULT: Address = Address::repeat_byte(0x0b);
    const EOA: Address = Address::repeat_byte(0xaa);
    const CALLER_PAYOUT: Address = Address::repeat_byte(0xbb);

    const NOW: u64 = 1_700_000_000;

    fn strategy() -> ExecutableStrategy {
        let mut settings = StrategySettings::default();
        settings
            .base_asset(BASE)
            .staking_contract(Address::repeat_byte(0x03))
            .swap_router(Address::repeat_byte(0x04))
            .treasury(TREASURY)
            .vault(VAULT)
            .eoa(Some(EOA));

        REWARD_ROUTES.with(|routes| {
            routes.borrow_mut().insert(REWARD, vec![REWARD, BASE]);
        });

        ExecutableStrategy::new(settings, StrategyData::default(), Lock::default(), true)
    }

    fn expect_base_balance(asset: &mut MockAssetClient, value: u64) {
        asset
            .expect_balance_of()
            .withf(|token, _| *token == BASE)
            .times(1)
            .returning(move |_, _| Ok(U256::from(value)));
    }

    /// The end-to-end reference scenario: 100 000 staked, rewards worth
    /// 10 000 after conversion, totalFee 450 and callFee 1000 over 10 000.
    #[test]
    fn harvest_compounds_and_distributes_fees() {
        let mut strategy = strategy();
        let mut journal = JournalCollection::open(NOW, None);

        let mut staking = MockStakingProtocol::new();
        let mut swap = MockSwapVenue::new();
        let mut asset = MockAssetClient::new();

        // tvl_before = 0 idle + 100_000 staked
        staking
            .expect_total_balance()
            .times(1)
            .returning(|_| Ok(U256::from(100_000)));
        expect_base_balance(&mut asset, 0);

        // conversion: one routed reward claimed and swapped for 10_000 base
        staking
            .expect_claimable_rewards()
            .times(1)
            .returning(|_| Ok(vec![(REWARD, U256::from(10_000))]));
        staking.expect_get_reward().times(1).returning(|| Ok(()));
        expect_base_balance(&mut asset, 0); // converter idle_before
        asset
            .expect_balance_of()
            .withf(|token, _| *token == REWARD)
            .times(1)
            .returning(|_, _| Ok(U256::from(10_000)));
        swap.expect_swap_exact_input()
            .times(1)
            .returning(|_, _, _, _, _| Ok(()));
        expect_base_balance(&mut asset, 10_000); // converter idle_after

        // fee transfers: 450 total fee, 45 to the caller, 405 to treasury
        asset
            .expect_transfer()
            .withf(|token, to, amount| {
                *token == BASE && *to == CALLER_PAYOUT && *amount == U256::from(45)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        asset
            .expect_transfer()
            .withf(|token, to, amount| {
                *token == BASE && *to == TREASURY && *amount == U256::from(405)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        // redeposit of the 9_550 net
        expect_base_balance(&mut asset, 9_550);
        staking
            .expect_stake()
            .withf(|amount, lock| *amount == U256::from(9_550) && !*lock)
            .times(1)
            .returning(|_, _| Ok(()));

        // tvl_after = 0 idle + 109_550 staked
        expect_base_balance(&mut asset, 0);
        staking
            .expect_total_balance()
            .times(1)
            .returning(|_| Ok(U256::from(109_550)));

        let outcome = block_on(strategy.harvest(
            &mut journal,
            &staking,
            &swap,
            &asset,
            NOW,
            CALLER_PAYOUT,
        ))
        .unwrap();

        assert_eq!(outcome.gross, U256::from(10_000));
        assert_eq!(outcome.caller_amount, U256::from(45));
        assert_eq!(outcome.treasury_amount, U256::from(405));
        assert_eq!(outcome.tvl_before, U256::from(100_000));
        assert_eq!(outcome.tvl_after, U256::from(109_550));
        assert_eq!(outcome.profit, I256::try_from(9_550).unwrap());
        assert!(outcome.logged);

        // the ledger recorded the pre-harvest TVL and the realized profit
        let records = ledger::latest_slice(1).unwrap();
        assert_eq!(records[0].timestamp, NOW);
        assert_eq!(
            crate::utils::common::nat_to_u256(&records[0].tvl).unwrap(),
            U256::from(100_000)
        );

        // internal bookkeeping committed, lock released
        STRATEGY_STATE.with(|state| {
            let state = state.borrow();
            assert_eq!(state.data.last_harvest, NOW);
            assert_eq!(state.data.lifetime_gross_profit, U256::from(10_000));
            assert!(!state.lock.is_locked);
        });
    }

    #[test]
    fn failed_conversion_aborts_without_partial_state() {
        let mut strategy = strategy();
        let mut journal = JournalCollection::open(NOW, None);

        let mut staking = MockStakingProtocol::new();
        let mut swap = MockSwapVenue::new();
        let mut asset = MockAssetClient::new();

        staking
            .expect_total_balance()
            .returning(|_| Ok(U256::from(100_000)));
        expect_base_balance(&mut asset, 0);

        staking
            .expect_claimable_rewards()
            .returning(|_| Ok(vec![(REWARD, U256::from(10_000))]));
        staking.expect_get_reward().returning(|| Ok(()));
        expect_base_balance(&mut asset, 0);
        asset
            .expect_balance_of()
            .withf(|token, _| *token == REWARD)
            .returning(|_, _| Ok(U256::from(10_000)));

        // the venue rejects the swap mid-sequence
        swap.expect_swap_exact_input()
            .times(1)
            .returning(|_, _, _, _, _| {
                Err(StrategyError::Custom("insufficient liquidity".to_string()))
            });

        // nothing downstream of the failure may run
        asset.expect_transfer().times(0);
        staking.expect_stake().times(0);

        let result = block_on(strategy.harvest(
            &mut journal,
            &staking,
            &swap,
            &asset,
            NOW,
            CALLER_PAYOUT,
        ));
        assert!(result.is_err());

        // no log entry, no bookkeeping, lock released for the next caller
        assert_eq!(ledger::record_count(), 0);
        STRATEGY_STATE.with(|state| {
            let state = state.borrow();
            assert_eq!(state.data.last_harvest, 0);
            assert_eq!(state.data.lifetime_gross_profit, U256::ZERO);
            assert!(!state.lock.is_locked);
        });
    }

    #[test]
    fn paused_strategies_reject_harvests() {
        let mut strategy = strategy();
        let mut journal = JournalCollection::open(NOW, None);
        HALT_STATE.with(|halt| {
            halt.borrow_mut().status = crate::halt::HaltStatus::Paused { paused_at: NOW };
        });

        let staking = MockStakingProtocol::new();
        let swap = MockSwapVenue::new();
        let asset = MockAssetClient::new();

        let result = block_on(strategy.harvest(
            &mut journal,
            &staking,
            &swap,
            &asset,
            NOW,
            CALLER_PAYOUT,
        ));
        assert_eq!(result.unwrap_err(), StrategyError::Paused);
    }

    #[test]
    fn held_locks_turn_harvests_away() {
        let mut strategy = strategy();
        strategy.lock.is_locked = true;
        strategy.lock.last_locked_at = Some(NOW - 10);

        let mut journal = JournalCollection::open(NOW, None);
        let staking = MockStakingProtocol::new();
        let swap = MockSwapVenue::new();
        let asset = MockAssetClient::new();

        let result = block_on(strategy.harvest(
            &mut journal,
            &staking,
            &swap,
            &asset,
            NOW,
            CALLER_PAYOUT,
        ));
        assert_eq!(result.unwrap_err(), StrategyError::Locked);
    }

    #[test]
    fn withdraw_unstakes_the_shortfall_and_takes_the_security_fee() {
        let mut strategy = strategy();
        let mut journal = JournalCollection::open(NOW, None);

        let mut staking = MockStakingProtocol::new();
        let mut asset = MockAssetClient::new();

        // 200 idle, 800 must come out of the staking position
        expect_base_balance(&mut asset, 200);
        staking
            .expect_withdraw()
            .withf(|amount| *amount == U256::from(800))
            .times(1)
            .returning(|_| Ok(()));
        expect_base_balance(&mut asset, 1_000);

        // securityFee of 10 bps over 1_000 is 1
        asset
            .expect_transfer()
            .withf(|token, to, amount| {
                *token == BASE && *to == VAULT && *amount == U256::from(999)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let payout = block_on(strategy.withdraw(
            &mut journal,
            &staking,
            &asset,
            NOW,
            U256::from(1_000),
        ))
        .unwrap();
        assert_eq!(payout, U256::from(999));
    }

    #[test]
    fn retire_exits_and_returns_everything() {
        let mut strategy = strategy();
        let mut journal = JournalCollection::open(NOW, None);

        let mut staking = MockStakingProtocol::new();
        let mut asset = MockAssetClient::new();

        staking
            .expect_withdrawable_balance()
            .times(1)
            .returning(|_| Ok((U256::from(5_000), U256::ZERO)));
        staking.expect_exit().times(1).returning(|| Ok(()));
        expect_base_balance(&mut asset, 5_000);
        asset
            .expect_transfer()
            .withf(|token, to, amount| {
                *token == BASE && *to == VAULT && *amount == U256::from(5_000)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let returned =
            block_on(strategy.retire(&mut journal, &staking, &asset, NOW)).unwrap();
        assert_eq!(returned, U256::from(5_000));
    }

    #[test]
    fn deposit_stakes_the_idle_balance_unless_paused() {
        let mut strategy = strategy();
        let mut journal = JournalCollection::open(NOW, None);

        let mut staking = MockStakingProtocol::new();
        let mut asset = MockAssetClient::new();

        expect_base_balance(&mut asset, 3_000);
        staking
            .expect_stake()
            .withf(|amount, lock| *amount == U256::from(3_000) && !*lock)
            .times(1)
            .returning(|_, _| Ok(()));

        let staked =
            block_on(strategy.deposit(&mut journal, &staking, &asset, NOW)).unwrap();
        assert_eq!(staked, U256::from(3_000));

        // paused strategies accept no deposits
        HALT_STATE.with(|halt| {
            halt.borrow_mut().status = crate::halt::HaltStatus::Paused { paused_at: NOW };
        });
        let result = block_on(strategy.deposit(&mut journal, &staking, &asset, NOW));
        assert_eq!(result.unwrap_err(), StrategyError::Paused);
    }
}
