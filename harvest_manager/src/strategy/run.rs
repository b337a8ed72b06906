//! Entry points that wire the live collaborators to the executable
//! strategy and drive one externally triggered sequence.

use alloy_primitives::{Address, U256};
use candid::Principal;
use ic_exports::ic_cdk::api::time;

use crate::{
    account::StrategyAccount,
    asset::Erc20Client,
    constants::MAX_RETRY_ATTEMPTS,
    converter::RewardConverter,
    fees::FeeSplit,
    journal::{JournalCollection, LogType},
    staking::MultiFeeDistribution,
    state::{FEE_CONFIG, STRATEGY_STATE},
    swap::UniV2Router,
    utils::{
        error::{StrategyError, StrategyResult},
        signer::derive_account_address,
    },
};

use super::{executable::ExecutableStrategy, stable::StableStrategy, HarvestOutcome};

fn now_seconds() -> u64 {
    time() / 1_000_000_000
}

fn installed_strategy() -> StrategyResult<StableStrategy> {
    let stable = STRATEGY_STATE.with(|strategy| strategy.borrow().clone());
    if !stable.initialized {
        return Err(StrategyError::NonExistentValue);
    }
    Ok(stable)
}

fn strategy_account(stable: &StableStrategy) -> StrategyResult<StrategyAccount> {
    let eoa = stable.settings.eoa.ok_or(StrategyError::NonExistentValue)?;
    Ok(StrategyAccount::new(
        stable.settings.rpc_canister,
        eoa,
        stable.settings.derivation_path.clone(),
        stable.data.eoa_nonce,
    ))
}

/// Sends consume nonces even when a later step of the sequence fails, so
/// the tracked nonce is committed regardless of the outcome.
fn persist_nonce(account: &StrategyAccount) {
    STRATEGY_STATE.with(|strategy| {
        strategy.borrow_mut().data.eoa_nonce = account.nonce();
    });
}

fn note_result<T>(result: &StrategyResult<T>) -> StrategyResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(err) => Err(err.clone()),
    }
}

/// Runs the full harvest sequence, retrying from the top on failure.
pub async fn run_harvest(
    caller: Principal,
    recipient: Address,
) -> StrategyResult<HarvestOutcome> {
    let now = now_seconds();
    let mut journal = JournalCollection::open(now, Some(caller));

    let stable = installed_strategy()?;
    let account = strategy_account(&stable)?;
    let staking = MultiFeeDistribution {
        contract: stable.settings.staking_contract,
        base_asset: stable.settings.base_asset,
        account: &account,
    };
    let swap = UniV2Router {
        contract: stable.settings.swap_router,
        account: &account,
    };
    let asset = Erc20Client { account: &account };

    let mut executable: ExecutableStrategy = (&stable).into();
    let mut result = Err(StrategyError::NonExistentValue);

    for turn in 0..MAX_RETRY_ATTEMPTS {
        result = executable
            .harvest(&mut journal, &staking, &swap, &asset, now, recipient)
            .await;

        journal.append_note(
            note_result(&result),
            LogType::HarvestResult,
            format!(
                "Harvest attempt {}/{} finished.",
                turn + 1,
                MAX_RETRY_ATTEMPTS
            ),
        );

        if result.is_ok() {
            break;
        }
    }

    persist_nonce(&account);
    result
}

/// Withdraws `amount` of the base asset towards the vault address.
pub async fn run_withdraw(caller: Principal, amount: U256) -> StrategyResult<U256> {
    let now = now_seconds();
    let mut journal = JournalCollection::open(now, Some(caller));

    let stable = installed_strategy()?;
    let account = strategy_account(&stable)?;
    let staking = MultiFeeDistribution {
        contract: stable.settings.staking_contract,
        base_asset: stable.settings.base_asset,
        account: &account,
    };
    let asset = Erc20Client { account: &account };

    let mut executable: ExecutableStrategy = (&stable).into();
    let result = executable
        .withdraw(&mut journal, &staking, &asset, now, amount)
        .await;

    journal.append_note(
        note_result(&result),
        LogType::WithdrawResult,
        "Withdraw sequence finished.",
    );
    persist_nonce(&account);
    result
}

/// Exits the position entirely and returns the balance to the vault.
pub async fn run_retire(caller: Principal) -> StrategyResult<U256> {
    let now = now_seconds();
    let mut journal = JournalCollection::open(now, Some(caller));

    let stable = installed_strategy()?;
    let account = strategy_account(&stable)?;
    let staking = MultiFeeDistribution {
        contract: stable.settings.staking_contract,
        base_asset: stable.settings.base_asset,
        account: &account,
    };
    let asset = Erc20Client { account: &account };

    let mut executable: ExecutableStrategy = (&stable).into();
    let result = executable.retire(&mut journal, &staking, &asset, now).await;

    journal.append_note(
        note_result(&result),
        LogType::RetireResult,
        "Retire sequence finished.",
    );
    persist_nonce(&account);
    result
}

/// Stakes the strategy's idle balance.
pub async fn run_deposit(caller: Principal) -> StrategyResult<U256> {
    let now = now_seconds();
    let mut journal = JournalCollection::open(now, Some(caller));

    let stable = installed_strategy()?;
    let account = strategy_account(&stable)?;
    let staking = MultiFeeDistribution {
        contract: stable.settings.staking_contract,
        base_asset: stable.settings.base_asset,
        account: &account,
    };
    let asset = Erc20Client { account: &account };

    let mut executable: ExecutableStrategy = (&stable).into();
    let result = executable.deposit(&mut journal, &staking, &asset, now).await;

    journal.append_note(
        note_result(&result),
        LogType::DepositResult,
        "Deposit sequence finished.",
    );
    persist_nonce(&account);
    result
}

/// Live total value of the strategy in base-asset units.
pub async fn run_total_value() -> StrategyResult<U256> {
    let stable = installed_strategy()?;
    let account = strategy_account(&stable)?;
    let staking = MultiFeeDistribution {
        contract: stable.settings.staking_contract,
        base_asset: stable.settings.base_asset,
        account: &account,
    };
    let asset = Erc20Client { account: &account };

    let eoa = stable.settings.eoa.ok_or(StrategyError::NonExistentValue)?;
    crate::balance::total_value(&staking, &asset, stable.settings.base_asset, eoa).await
}

/// Values the pending rewards and applies the current fee split, giving
/// external schedulers a harvest-worthiness figure.
pub async fn run_estimate() -> StrategyResult<(U256, FeeSplit)> {
    let now = now_seconds();

    let stable = installed_strategy()?;
    let account = strategy_account(&stable)?;
    let staking = MultiFeeDistribution {
        contract: stable.settings.staking_contract,
        base_asset: stable.settings.base_asset,
        account: &account,
    };
    let swap = UniV2Router {
        contract: stable.settings.swap_router,
        account: &account,
    };
    let asset = Erc20Client { account: &account };

    let eoa = stable.settings.eoa.ok_or(StrategyError::NonExistentValue)?;
    let converter = RewardConverter::new(
        &staking,
        &swap,
        &asset,
        stable.settings.base_asset,
        eoa,
        stable.settings.slippage,
        now + stable.settings.swap_deadline,
    );

    let expected_gross = converter.estimate().await?;
    let split = FEE_CONFIG.with(|config| config.borrow().split(expected_gross))?;
    Ok((expected_gross, split))
}

/// Derives the strategy account address and its on-chain nonce.
/// Scheduled once right after installation.
pub async fn initialize_strategy_account() {
    let now = now_seconds();
    let mut journal = JournalCollection::open(now, None);

    let derivation_path =
        STRATEGY_STATE.with(|strategy| strategy.borrow().settings.derivation_path.clone());

    match derive_account_address(derivation_path).await {
        Ok(address) => {
            STRATEGY_STATE.with(|strategy| {
                strategy.borrow_mut().settings.eoa = Some(address);
            });
            journal.append_note(
                Ok(()),
                LogType::Info,
                format!("Strategy account derived: {address}."),
            );

            let stable = STRATEGY_STATE.with(|strategy| strategy.borrow().clone());
            if let Ok(account) = strategy_account(&stable) {
                match account.sync_nonce().await {
                    Ok(()) => persist_nonce(&account),
                    Err(err) => {
                        journal.append_note(
                            Err(err),
                            LogType::Info,
                            "The account nonce could not be synced; it stays at zero.",
                        );
                    }
                }
            }
        }
        Err(err) => {
            journal.append_note(
                Err(err),
                LogType::Info,
                "The strategy account could not be derived.",
            );
        }
    }
}
