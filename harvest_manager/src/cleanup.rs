//! Daily maintenance: journal pruning and provider reputation resets.
//!
//! Reputations are reshuffled with an IC-seeded RNG so a provider that got
//! lucky early cannot entrench itself at the top of the ranking.

use ic_exports::ic_cdk::api::management_canister::main::raw_rand;
use rand::seq::SliceRandom;
use rand_chacha::rand_core::SeedableRng;

#[cfg(feature = "mainnet")]
use crate::constants::MAINNET_PROVIDERS;
#[cfg(feature = "sepolia")]
use crate::constants::SEPOLIA_PROVIDERS;

use crate::{
    constants::MAX_JOURNAL_ENTRIES,
    journal::{JournalCollection, LogType},
    state::{JOURNAL, RPC_REPUTATIONS},
    utils::error::{StrategyError, StrategyResult},
};

/// Runs the complete daily maintenance pass
pub async fn daily_cleanup(now: u64) {
    let mut journal = JournalCollection::open(now, None);

    journal_cleanup();
    journal.append_note(
        Ok(()),
        LogType::Cleanup,
        "Journal pruned to the retention bound.",
    );

    match reputations_cleanup().await {
        Ok(()) => {
            journal.append_note(
                Ok(()),
                LogType::Cleanup,
                "Provider reputations reset and reshuffled.",
            );
        }
        Err(err) => {
            journal.append_note(
                Err(err),
                LogType::Cleanup,
                "Provider reputations could not be reshuffled.",
            );
        }
    }
}

/// Trims the journal to its retention bound
pub fn journal_cleanup() {
    JOURNAL.with(|journal| {
        let mut journal = journal.borrow_mut();
        while journal.len() > MAX_JOURNAL_ENTRIES {
            journal.pop_front();
        }
    });
}

/// Resets all provider scores and randomizes the tie-break order
pub async fn reputations_cleanup() -> StrategyResult<()> {
    let (seed_bytes,) = raw_rand()
        .await
        .map_err(|(code, message)| StrategyError::CallResult(code, message))?;
    let seed: [u8; 32] = seed_bytes.try_into().map_err(|_| {
        StrategyError::DecodingError("The random seed is not 32 bytes long.".to_string())
    })?;

    let mut rng = rand_chacha::ChaCha8Rng::from_seed(seed);

    #[cfg(feature = "mainnet")]
    let mut providers = MAINNET_PROVIDERS.to_vec();
    #[cfg(feature = "sepolia")]
    let mut providers = SEPOLIA_PROVIDERS.to_vec();

    providers.shuffle(&mut rng);

    RPC_REPUTATIONS.with(|reputations| {
        *reputations.borrow_mut() = providers.into_iter().map(|provider| (0, provider)).collect();
    });

    Ok(())
}
