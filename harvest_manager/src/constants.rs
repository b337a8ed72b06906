//! Harvest Manager's Constants

use alloy_primitives::U256;

#[cfg(feature = "mainnet")]
use evm_rpc_types::EthMainnetService;
#[cfg(feature = "sepolia")]
use evm_rpc_types::EthSepoliaService;

/// Scale used for fixed point arithmetic
pub const SCALE: u128 = 1_000_000_000_000_000_000; // e18
pub fn scale() -> U256 {
    U256::from(SCALE)
}

/// Chain ID
#[cfg(feature = "mainnet")]
pub const CHAIN_ID: u64 = 1; // Ethereum mainnet
#[cfg(feature = "sepolia")]
pub const CHAIN_ID: u64 = 11155111; // Sepolia testnet

/// Denominator shared by every fee fraction
pub const PERCENT_DIVISOR: u64 = 10_000;
pub fn percent_divisor() -> U256 {
    U256::from(PERCENT_DIVISOR)
}

/// Hard cap on the total harvest fee, 500/10_000 => 5%
pub const MAX_FEE: u64 = 500;

/// Hard cap on the withdrawal security fee, 100/10_000 => 1%
pub const MAX_SECURITY_FEE: u64 = 100;

/// Seconds in a 365-day year, used to annualize per-harvest returns
pub const SECONDS_PER_YEAR: u64 = 31_536_000;
pub fn seconds_per_year() -> U256 {
    U256::from(SECONDS_PER_YEAR)
}

/// Minimum time between two harvest log entries, denominated in seconds.
/// Harvest calls inside the window still run, they just do not log.
pub const DEFAULT_HARVEST_LOG_CADENCE: u64 = 43_200; // 12 hours

/// Timeout after which an abandoned harvest lock is reclaimed, in seconds
pub const HARVEST_LOCK_TIMEOUT: u64 = 3_600;

/// Seconds a submitted swap stays valid before the venue rejects it
pub const DEFAULT_SWAP_DEADLINE: u64 = 600;

/// Max number of full harvest attempts per external trigger
pub const MAX_RETRY_ATTEMPTS: u8 = 2;

/// Days without a successful harvest before the watchdog pauses the strategy
pub const STALE_HARVEST_DAYS: i64 = 3;

/// Upper bound on retained execution journal entries
pub const MAX_JOURNAL_ENTRIES: usize = 300;

/// Gas limit used for strategy transactions
pub const TRANSACTION_GAS_LIMIT: u128 = 450_000;

/// Cycles attached to a raw transaction submission
pub const SEND_TRANSACTION_CYCLES: u128 = 40_000_000_000;

/// Default max response bytes
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 8_000;

/// Number of providers to use
pub const PROVIDER_COUNT: u8 = 3;

/// Number of providers needed to reach consensus
pub const PROVIDER_THRESHOLD: u8 = 2;

/// Providers eligible for the reputation ranking
#[cfg(feature = "mainnet")]
pub const MAINNET_PROVIDERS: [EthMainnetService; 3] = [
    EthMainnetService::Alchemy,
    EthMainnetService::Ankr,
    EthMainnetService::PublicNode,
];
#[cfg(feature = "sepolia")]
pub const SEPOLIA_PROVIDERS: [EthSepoliaService; 3] = [
    EthSepoliaService::Alchemy,
    EthSepoliaService::Ankr,
    EthSepoliaService::PublicNode,
];

/// Name of the threshold ECDSA key the strategy account derives from
#[cfg(feature = "mainnet")]
pub const ECDSA_KEY_NAME: &str = "key_1";
#[cfg(feature = "sepolia")]
pub const ECDSA_KEY_NAME: &str = "test_key_1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_is_e18() {
        assert_eq!(SCALE, 10_u128.pow(18));
    }

    #[test]
    fn fee_caps_fit_the_divisor() {
        assert!(MAX_FEE < PERCENT_DIVISOR);
        assert!(MAX_SECURITY_FEE < PERCENT_DIVISOR);
    }

    #[test]
    fn seconds_per_year_is_365_days() {
        assert_eq!(SECONDS_PER_YEAR, 365 * 24 * 60 * 60);
    }
}
