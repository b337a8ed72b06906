//! Thread-local canister state.
//!
//! The harvest log lives in stable memory so the full record sequence
//! survives upgrades; the remaining items are runtime configuration that
//! `init` populates.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, VecDeque},
};

use alloy_primitives::Address;
use evm_rpc_types::RpcService;
use ic_exports::candid::Principal;
use ic_stable_structures::{
    memory_manager::{MemoryId, MemoryManager, VirtualMemory},
    DefaultMemoryImpl, StableVec,
};

use crate::{
    constants::DEFAULT_HARVEST_LOG_CADENCE,
    fees::FeeConfig,
    halt::Halt,
    journal::JournalEntry,
    ledger::HarvestRecord,
    providers::ProviderService,
    strategy::stable::StableStrategy,
};

#[cfg(feature = "mainnet")]
use crate::constants::MAINNET_PROVIDERS;
#[cfg(feature = "sepolia")]
use crate::constants::SEPOLIA_PROVIDERS;

pub type StableMemory = VirtualMemory<DefaultMemoryImpl>;

fn default_reputations() -> Vec<(i64, ProviderService)> {
    #[cfg(feature = "mainnet")]
    return MAINNET_PROVIDERS.iter().cloned().map(|p| (0, p)).collect();
    #[cfg(feature = "sepolia")]
    return SEPOLIA_PROVIDERS.iter().cloned().map(|p| (0, p)).collect();
}

fn default_rpc_queue() -> VecDeque<RpcService> {
    #[cfg(feature = "mainnet")]
    return MAINNET_PROVIDERS
        .iter()
        .cloned()
        .map(RpcService::EthMainnet)
        .collect();
    #[cfg(feature = "sepolia")]
    return SEPOLIA_PROVIDERS
        .iter()
        .cloned()
        .map(RpcService::EthSepolia)
        .collect();
}

thread_local! {
    static MEMORY_MANAGER: RefCell<MemoryManager<DefaultMemoryImpl>> =
        RefCell::new(MemoryManager::init(DefaultMemoryImpl::default()));

    /// Append-only harvest record log (stable memory, audit-grade)
    pub static HARVEST_LOG: RefCell<StableVec<HarvestRecord, StableMemory>> = RefCell::new(
        StableVec::init(MEMORY_MANAGER.with(|mm| mm.borrow().get(MemoryId::new(0))))
            .expect("harvest log memory initialization failed")
    );

    /// The single strategy instance this canister operates
    pub static STRATEGY_STATE: RefCell<StableStrategy> = RefCell::new(StableStrategy::default());

    /// Principal allowed to call withdraw / retire / deposit
    pub static VAULT_PRINCIPAL: Cell<Principal> = Cell::new(Principal::anonymous());

    /// Reward asset => swap path ending in the base asset. Add-only.
    pub static REWARD_ROUTES: RefCell<BTreeMap<Address, Vec<Address>>> =
        RefCell::new(BTreeMap::new());

    /// Reward assets excluded from conversion and profit attribution
    pub static CONVERSION_DENYLIST: RefCell<Vec<Address>> = RefCell::new(Vec::new());

    /// Minimum seconds between two harvest log entries
    pub static HARVEST_LOG_CADENCE: Cell<u64> = Cell::new(DEFAULT_HARVEST_LOG_CADENCE);

    /// Fee fractions applied at harvest and withdrawal time
    pub static FEE_CONFIG: RefCell<FeeConfig> = RefCell::new(FeeConfig::default());

    /// Pause state of the strategy
    pub static HALT_STATE: RefCell<Halt> = RefCell::new(Halt::default());

    /// Bounded execution journal, newest entries last
    pub static JOURNAL: RefCell<VecDeque<JournalEntry>> = RefCell::new(VecDeque::new());

    /// Reputation leaderboard of RPC providers
    pub static RPC_REPUTATIONS: RefCell<Vec<(i64, ProviderService)>> =
        RefCell::new(default_reputations());

    /// Rotating queue for raw `request` calls
    pub static RPC_SERVICE: RefCell<VecDeque<RpcService>> = RefCell::new(default_rpc_queue());
}

/// Appends an entry to the journal, discarding the oldest entries beyond
/// the retention bound.
pub fn insert_journal_entry(entry: JournalEntry) {
    JOURNAL.with(|journal| {
        let mut journal = journal.borrow_mut();
        journal.push_back(entry);
        while journal.len() > crate::constants::MAX_JOURNAL_ENTRIES {
            journal.pop_front();
        }
    });
}
