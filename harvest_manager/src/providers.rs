//! Reputation-based ranking of the EVM RPC providers the strategy reads
//! through. Consensus failures demote a provider, successful responses
//! promote it.

use evm_rpc_types::{MultiRpcResult, RpcService, RpcServices};

#[cfg(feature = "mainnet")]
use evm_rpc_types::EthMainnetService;
#[cfg(feature = "sepolia")]
use evm_rpc_types::EthSepoliaService;

use crate::{
    constants::PROVIDER_COUNT,
    state::RPC_REPUTATIONS,
    utils::error::{StrategyError, StrategyResult},
};

#[cfg(feature = "mainnet")]
pub type ProviderService = EthMainnetService;
#[cfg(feature = "sepolia")]
pub type ProviderService = EthSepoliaService;

/// Getter function to retrieve the ranked list of providers from the thread's local storage
fn fetch_provider_list() -> Vec<(i64, ProviderService)> {
    RPC_REPUTATIONS.with(|leaderboard| leaderboard.borrow().clone())
}

/// Sorts the providers by reputation and returns the top ones.
pub fn ranked_provider_list() -> Vec<ProviderService> {
    let mut provider_list = fetch_provider_list();

    provider_list.sort_by(|a, b| b.0.cmp(&a.0));

    let mut provider_list: Vec<ProviderService> =
        provider_list.into_iter().map(|(_, service)| service).collect();

    if provider_list.len() > PROVIDER_COUNT as usize {
        provider_list.truncate(PROVIDER_COUNT as usize);
    }

    provider_list
}

/// The full ranked provider set, used for consensus reads.
pub fn get_ranked_rpc_providers() -> RpcServices {
    let providers = ranked_provider_list();
    #[cfg(feature = "mainnet")]
    return RpcServices::EthMainnet(Some(providers));
    #[cfg(feature = "sepolia")]
    return RpcServices::EthSepolia(Some(providers));
}

/// Only the top-ranked provider, used where a single response suffices.
pub fn get_ranked_rpc_provider() -> RpcServices {
    let mut providers = ranked_provider_list();
    providers.truncate(1);
    #[cfg(feature = "mainnet")]
    return RpcServices::EthMainnet(Some(providers));
    #[cfg(feature = "sepolia")]
    return RpcServices::EthSepolia(Some(providers));
}

/// Increments the score of a specific provider by 1
pub fn increment_provider_score(provider: &ProviderService) {
    RPC_REPUTATIONS.with(|leaderboard| {
        let mut leaderboard = leaderboard.borrow_mut();

        if let Some(entry) = leaderboard.iter_mut().find(|(_, p)| p == provider) {
            entry.0 += 1;
        }
    });
}

/// Decrements the score of a specific provider by 1
pub fn decrement_provider_score(provider: &ProviderService) {
    RPC_REPUTATIONS.with(|leaderboard| {
        let mut leaderboard = leaderboard.borrow_mut();

        if let Some(entry) = leaderboard.iter_mut().find(|(_, p)| p == provider) {
            entry.0 -= 1;
        }
    });
}

/// Collapses a multi-provider response into a single result and feeds the
/// outcome back into the reputation ranking.
pub fn extract_multi_rpc_result<T>(result: MultiRpcResult<T>) -> StrategyResult<T> {
    match result {
        MultiRpcResult::Consistent(rpc_result) => {
            rpc_result.map_err(StrategyError::RpcResponseError)
        }
        MultiRpcResult::Inconsistent(results) => {
            for (service, rpc_result) in results {
                let provider = match service {
                    #[cfg(feature = "mainnet")]
                    RpcService::EthMainnet(provider) => Some(provider),
                    #[cfg(feature = "sepolia")]
                    RpcService::EthSepolia(provider) => Some(provider),
                    _ => None,
                };

                if let Some(provider) = provider {
                    match rpc_result {
                        Ok(_) => increment_provider_score(&provider),
                        Err(_) => decrement_provider_score(&provider),
                    }
                }
            }
            Err(StrategyError::NoConsensus)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RPC_REPUTATIONS;

    fn seed_reputations(entries: Vec<(i64, ProviderService)>) {
        RPC_REPUTATIONS.with(|leaderboard| *leaderboard.borrow_mut() = entries);
    }

    #[cfg(feature = "mainnet")]
    #[test]
    fn ranking_orders_by_score_and_truncates() {
        seed_reputations(vec![
            (-2, EthMainnetService::Alchemy),
            (5, EthMainnetService::Ankr),
            (1, EthMainnetService::PublicNode),
        ]);

        let ranked = ranked_provider_list();
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0], EthMainnetService::Ankr);
        assert_eq!(ranked[2], EthMainnetService::Alchemy);
    }

    #[cfg(feature = "mainnet")]
    #[test]
    fn score_adjustments_are_applied() {
        seed_reputations(vec![(0, EthMainnetService::Alchemy)]);

        increment_provider_score(&EthMainnetService::Alchemy);
        increment_provider_score(&EthMainnetService::Alchemy);
        decrement_provider_score(&EthMainnetService::Alchemy);

        let scores = RPC_REPUTATIONS.with(|leaderboard| leaderboard.borrow().clone());
        assert_eq!(scores[0].0, 1);
    }

    #[test]
    fn consistent_error_is_surfaced() {
        let result: MultiRpcResult<String> = MultiRpcResult::Consistent(Err(
            evm_rpc_types::RpcError::ProviderError(evm_rpc_types::ProviderError::NoPermission),
        ));
        assert!(matches!(
            extract_multi_rpc_result(result),
            Err(StrategyError::RpcResponseError(_))
        ));
    }

    #[test]
    fn inconsistent_results_yield_no_consensus() {
        let result: MultiRpcResult<String> = MultiRpcResult::Inconsistent(vec![]);
        assert_eq!(
            extract_multi_rpc_result(result).unwrap_err(),
            StrategyError::NoConsensus
        );
    }
}
