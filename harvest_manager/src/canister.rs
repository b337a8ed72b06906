//! Canister API surface.
//!
//! Access control per entry point: controllers administer fees, routes and
//! pause; the configured vault principal moves funds; harvest accepts only
//! self-authenticating callers.

use std::time::Duration;

use candid::{Int, Nat, Principal};
use ic_canister::{generate_idl, init, query, update, Canister, Idl, PreUpdate};
use ic_exports::{
    ic_cdk::{api::time, caller, spawn},
    ic_cdk_timers::{set_timer, set_timer_interval},
};

use crate::{
    access::{require_owner, require_plain_caller, require_vault},
    cleanup::daily_cleanup,
    converter::validate_route,
    fees::FeeConfig,
    halt::{self, Halt},
    journal::{JournalCollection, JournalEntry, LogType},
    ledger::{self, HarvestRecord},
    state::{
        CONVERSION_DENYLIST, FEE_CONFIG, HALT_STATE, HARVEST_LOG_CADENCE, JOURNAL, REWARD_ROUTES,
        STRATEGY_STATE, VAULT_PRINCIPAL,
    },
    strategy::{
        data::StrategyData,
        run::{
            initialize_strategy_account, run_deposit, run_estimate, run_harvest, run_retire,
            run_total_value, run_withdraw,
        },
        settings::{StrategySettings, StrategySettingsQuery},
        stable::StableStrategy,
    },
    types::{HarvestEstimate, HarvestSummary, InitArgs, RewardRouteQuery},
    utils::{
        common::{i256_to_int, nat_to_u256, nat_to_u64, string_to_address, u256_to_nat},
        error::StrategyResult,
        evm_rpc::Service,
    },
};

use crate::strategy::data::StrategyDataQuery;

fn now_seconds() -> u64 {
    time() / 1_000_000_000
}

#[derive(Canister)]
pub struct HarvestManager {
    #[id]
    id: Principal,
}

impl PreUpdate for HarvestManager {}

impl HarvestManager {
    /// Installs the strategy and schedules its maintenance timers.
    /// Traps on malformed arguments; nothing is mutated on-chain yet.
    #[init]
    pub fn init(&mut self, args: InitArgs) {
        let base_asset =
            string_to_address(args.base_asset).expect("the base asset address is malformed");

        let mut settings = StrategySettings::default();
        settings
            .base_asset(base_asset)
            .staking_contract(
                string_to_address(args.staking_contract)
                    .expect("the staking contract address is malformed"),
            )
            .swap_router(
                string_to_address(args.swap_router).expect("the swap router address is malformed"),
            )
            .treasury(string_to_address(args.treasury).expect("the treasury address is malformed"))
            .vault(string_to_address(args.vault).expect("the vault address is malformed"))
            .derivation_path(vec![b"strategy-account".to_vec()])
            .rpc_canister(Service(args.rpc_principal));

        if let Some(slippage) = args.slippage {
            settings.slippage(nat_to_u64(&slippage).expect("the slippage value is malformed"));
        }
        if let Some(deadline) = args.swap_deadline {
            settings
                .swap_deadline(nat_to_u64(&deadline).expect("the swap deadline is malformed"));
        }

        let mut stable = StableStrategy::default();
        stable.settings(settings).data(StrategyData::default());
        stable.mint().expect("the strategy could not be installed");

        VAULT_PRINCIPAL.with(|vault| vault.set(args.vault_principal));

        if let Some(cadence) = args.harvest_log_cadence {
            HARVEST_LOG_CADENCE
                .set(nat_to_u64(&cadence).expect("the harvest log cadence is malformed"));
        }

        CONVERSION_DENYLIST.with(|denylist| {
            *denylist.borrow_mut() = args
                .conversion_denylist
                .into_iter()
                .map(|asset| {
                    string_to_address(asset).expect("a denylist address is malformed")
                })
                .collect();
        });

        REWARD_ROUTES.with(|routes| {
            let mut routes = routes.borrow_mut();
            for route in args.reward_routes {
                let asset = string_to_address(route.asset)
                    .expect("a reward route asset address is malformed");
                let path: Vec<_> = route
                    .path
                    .into_iter()
                    .map(|hop| string_to_address(hop).expect("a reward route hop is malformed"))
                    .collect();
                validate_route(asset, &path, base_asset).expect("a reward route is malformed");
                routes.insert(asset, path);
            }
        });

        // derive the strategy account as soon as the install call returns
        set_timer(Duration::ZERO, || spawn(initialize_strategy_account()));

        // WATCHDOG AND MAINTENANCE | EVERY 24 HOURS
        set_timer_interval(Duration::from_secs(86_400), || {
            halt::update_halt_status(now_seconds());
            spawn(daily_cleanup(now_seconds()));
        });
    }

    // USER OPERATIONS

    /// Claims and compounds pending rewards; the caller incentive is paid
    /// to `recipient`. Open to any non-canister caller.
    #[update]
    pub async fn harvest(&mut self, recipient: String) -> StrategyResult<HarvestSummary> {
        let caller = caller();
        require_plain_caller(&caller)?;
        let recipient = string_to_address(recipient)?;

        let outcome = run_harvest(caller, recipient).await?;
        Ok(HarvestSummary {
            gross_converted: u256_to_nat(&outcome.gross),
            caller_incentive: u256_to_nat(&outcome.caller_amount),
            treasury_amount: u256_to_nat(&outcome.treasury_amount),
            profit: i256_to_int(&outcome.profit),
            tvl_before: u256_to_nat(&outcome.tvl_before),
            tvl_after: u256_to_nat(&outcome.tvl_after),
            logged: outcome.logged,
        })
    }

    /// Sends `amount` of the base asset to the vault address, minus the
    /// security fee. Vault only.
    #[update]
    pub async fn withdraw(&mut self, amount: Nat) -> StrategyResult<Nat> {
        require_vault(&caller())?;
        let amount = nat_to_u256(&amount)?;
        let payout = run_withdraw(caller(), amount).await?;
        Ok(u256_to_nat(&payout))
    }

    /// Exits the staking position and returns everything to the vault
    /// address. Vault only.
    #[update]
    pub async fn retire_strategy(&mut self) -> StrategyResult<Nat> {
        require_vault(&caller())?;
        let returned = run_retire(caller()).await?;
        Ok(u256_to_nat(&returned))
    }

    /// Stakes the strategy's idle balance. Vault only, rejected while
    /// paused.
    #[update]
    pub async fn deposit(&mut self) -> StrategyResult<Nat> {
        require_vault(&caller())?;
        let staked = run_deposit(caller()).await?;
        Ok(u256_to_nat(&staked))
    }

    /// Live total value (idle + staked) in base-asset units
    #[update]
    pub async fn strategy_balance(&mut self) -> StrategyResult<Nat> {
        let total = run_total_value().await?;
        Ok(u256_to_nat(&total))
    }

    /// Values the pending rewards and projects the fee split without
    /// executing a harvest
    #[update]
    pub async fn estimate_harvest(&mut self) -> StrategyResult<HarvestEstimate> {
        let (expected_gross, split) = run_estimate().await?;
        Ok(HarvestEstimate {
            expected_gross: u256_to_nat(&expected_gross),
            expected_caller_incentive: u256_to_nat(&split.caller_amount),
            expected_treasury_amount: u256_to_nat(&split.treasury_amount),
            expected_net_profit: u256_to_nat(&split.net_profit),
        })
    }

    // OWNER CONFIGURATION

    /// Updates the total harvest fee. Controller only.
    #[update]
    pub fn set_total_fee(&mut self, new_total_fee: Nat) -> StrategyResult<()> {
        let caller = caller();
        require_owner(&caller)?;
        let new_total_fee = nat_to_u64(&new_total_fee)?;
        FEE_CONFIG.with(|config| config.borrow_mut().set_total_fee(new_total_fee))?;
        JournalCollection::open(now_seconds(), Some(caller)).append_note(
            Ok(()),
            LogType::Info,
            format!("Total fee updated to {new_total_fee}."),
        );
        Ok(())
    }

    /// Updates the caller incentive fraction; the treasury fraction is
    /// derived as its complement. Controller only.
    #[update]
    pub fn set_call_fee(&mut self, new_call_fee: Nat) -> StrategyResult<()> {
        let caller = caller();
        require_owner(&caller)?;
        let new_call_fee = nat_to_u64(&new_call_fee)?;
        FEE_CONFIG.with(|config| config.borrow_mut().set_call_fee(new_call_fee))?;
        JournalCollection::open(now_seconds(), Some(caller)).append_note(
            Ok(()),
            LogType::Info,
            format!("Call fee updated to {new_call_fee}."),
        );
        Ok(())
    }

    /// Updates the withdrawal security fee. Controller only.
    #[update]
    pub fn set_security_fee(&mut self, new_security_fee: Nat) -> StrategyResult<()> {
        let caller = caller();
        require_owner(&caller)?;
        let new_security_fee = nat_to_u64(&new_security_fee)?;
        FEE_CONFIG.with(|config| config.borrow_mut().set_security_fee(new_security_fee))?;
        JournalCollection::open(now_seconds(), Some(caller)).append_note(
            Ok(()),
            LogType::Info,
            format!("Security fee updated to {new_security_fee}."),
        );
        Ok(())
    }

    /// Updates the treasury address. Controller only.
    #[update]
    pub fn set_treasury(&mut self, new_treasury: String) -> StrategyResult<()> {
        let caller = caller();
        require_owner(&caller)?;
        let new_treasury = string_to_address(new_treasury)?;
        STRATEGY_STATE.with(|strategy| {
            strategy.borrow_mut().settings.treasury = new_treasury;
        });
        JournalCollection::open(now_seconds(), Some(caller)).append_note(
            Ok(()),
            LogType::Info,
            format!("Treasury updated to {new_treasury}."),
        );
        Ok(())
    }

    /// Updates the minimum interval between harvest log entries.
    /// Controller only.
    #[update]
    pub fn set_harvest_log_cadence(&mut self, new_cadence: Nat) -> StrategyResult<()> {
        let caller = caller();
        require_owner(&caller)?;
        let new_cadence = nat_to_u64(&new_cadence)?;
        HARVEST_LOG_CADENCE.set(new_cadence);
        JournalCollection::open(now_seconds(), Some(caller)).append_note(
            Ok(()),
            LogType::Info,
            format!("Harvest log cadence updated to {new_cadence} seconds."),
        );
        Ok(())
    }

    /// Adds a conversion route for a reward asset. Routes can be added or
    /// replaced, never removed. Controller only.
    #[update]
    pub fn add_reward_route(&mut self, asset: String, path: Vec<String>) -> StrategyResult<()> {
        let caller = caller();
        require_owner(&caller)?;

        let asset = string_to_address(asset)?;
        let path = path
            .into_iter()
            .map(string_to_address)
            .collect::<StrategyResult<Vec<_>>>()?;
        let base_asset = STRATEGY_STATE.with(|strategy| strategy.borrow().settings.base_asset);
        validate_route(asset, &path, base_asset)?;

        REWARD_ROUTES.with(|routes| {
            routes.borrow_mut().insert(asset, path);
        });
        JournalCollection::open(now_seconds(), Some(caller)).append_note(
            Ok(()),
            LogType::Info,
            format!("Reward route added for {asset}."),
        );
        Ok(())
    }

    /// Pauses or unpauses the strategy. Controller only.
    #[update]
    pub fn set_paused(&mut self, paused: bool) -> StrategyResult<()> {
        let caller = caller();
        require_owner(&caller)?;
        let message = paused.then(|| "Paused by a controller.".to_string());
        halt::set_paused(paused, now_seconds(), message);
        JournalCollection::open(now_seconds(), Some(caller)).append_note(
            Ok(()),
            LogType::Watchdog,
            if paused { "Strategy paused." } else { "Strategy unpaused." },
        );
        Ok(())
    }

    // QUERIES

    /// The last `n` harvest records, oldest first
    #[query]
    pub fn latest_harvests(&self, n: u64) -> StrategyResult<Vec<HarvestRecord>> {
        ledger::latest_slice(n)
    }

    /// Number of records in the harvest log
    #[query]
    pub fn harvest_log_length(&self) -> u64 {
        ledger::record_count()
    }

    /// Average per-harvest return since `timestamp`, scaled by 10^18
    #[query]
    pub fn average_return_since(&self, timestamp: u64) -> StrategyResult<Int> {
        ledger::average_return_since(timestamp).map(|value| i256_to_int(&value))
    }

    /// Average per-harvest return over the last `n` records, scaled by 10^18
    #[query]
    pub fn average_return_last_n(&self, n: u64) -> StrategyResult<Int> {
        ledger::average_return_last_n(n).map(|value| i256_to_int(&value))
    }

    /// Average annualized return since `timestamp`, scaled by 10^18
    #[query]
    pub fn average_apr_since(&self, timestamp: u64) -> StrategyResult<Int> {
        ledger::average_apr_since(timestamp).map(|value| i256_to_int(&value))
    }

    /// Average annualized return over the last `n` records, scaled by 10^18
    #[query]
    pub fn average_apr_last_n(&self, n: u64) -> StrategyResult<Int> {
        ledger::average_apr_last_n(n).map(|value| i256_to_int(&value))
    }

    /// Current fee configuration
    #[query]
    pub fn get_fee_config(&self) -> FeeConfig {
        FEE_CONFIG.with(|config| config.borrow().clone())
    }

    /// The reward routing table
    #[query]
    pub fn get_reward_routes(&self) -> Vec<RewardRouteQuery> {
        REWARD_ROUTES.with(|routes| {
            routes
                .borrow()
                .iter()
                .map(|(asset, path)| RewardRouteQuery {
                    asset: asset.to_string(),
                    path: path.iter().map(|hop| hop.to_string()).collect(),
                })
                .collect()
        })
    }

    /// The strategy settings
    #[query]
    pub fn get_strategy_settings(&self) -> StrategySettingsQuery {
        STRATEGY_STATE.with(|strategy| strategy.borrow().settings.clone().into())
    }

    /// The strategy bookkeeping data
    #[query]
    pub fn get_strategy_data(&self) -> StrategyDataQuery {
        STRATEGY_STATE.with(|strategy| strategy.borrow().data.clone().into())
    }

    /// Pause status and the reason it was entered
    #[query]
    pub fn get_pause_status(&self) -> Halt {
        HALT_STATE.with(|halt| halt.borrow().clone())
    }

    /// The most recent `count` journal entries, oldest first
    #[query]
    pub fn get_journal(&self, count: u64) -> Vec<JournalEntry> {
        JOURNAL.with(|journal| {
            let journal = journal.borrow();
            let skip = journal.len().saturating_sub(count as usize);
            journal.iter().skip(skip).cloned().collect()
        })
    }

    pub fn idl() -> Idl {
        generate_idl!()
    }
}
