//! Gas estimation for strategy transactions

use candid::Nat;
use evm_rpc_types::RpcServices;
use num_traits::ToPrimitive;
use serde::Deserialize;
use serde_json::json;

use super::common::{extract_call_result, request_with_dynamic_retries};
use super::error::{StrategyError, StrategyResult};
use super::evm_rpc::{BlockTag, FeeHistoryArgs, Service};
use crate::providers::extract_multi_rpc_result;

/// The minimum suggested maximum priority fee per gas.
const MIN_SUGGEST_MAX_PRIORITY_FEE_PER_GAS: u64 = 1_500_000_000;

pub struct FeeEstimates {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

#[derive(Deserialize)]
struct JsonRpcStringResult {
    result: String,
}

async fn fee_history(
    block_count: Nat,
    newest_block: BlockTag,
    reward_percentiles: Option<Vec<u8>>,
    rpc_services: RpcServices,
    evm_rpc: &Service,
) -> StrategyResult<super::evm_rpc::FeeHistory> {
    let fee_history_args = FeeHistoryArgs {
        block_count,
        newest_block,
        reward_percentiles,
    };

    let cycles = 25_000_000_000;

    let call_result = evm_rpc
        .eth_fee_history(rpc_services, None, fee_history_args, cycles)
        .await;

    let canister_response = extract_call_result(call_result)?;

    extract_multi_rpc_result(canister_response)
}

fn median_index(length: usize) -> usize {
    if length == 0 {
        panic!("Cannot find a median index for an array of length zero.");
    }
    (length - 1) / 2
}

/// EIP-1559 fee estimation over the 95th percentile of recent priority fees
pub async fn estimate_transaction_fees(
    block_count: u8,
    rpc_services: RpcServices,
    evm_rpc: &Service,
    block_tag: BlockTag,
) -> StrategyResult<FeeEstimates> {
    let fee_history = fee_history(
        Nat::from(block_count),
        block_tag,
        Some(vec![95]),
        rpc_services,
        evm_rpc,
    )
    .await?;

    let median_index = median_index(block_count.into());

    let base_fee_per_gas = fee_history
        .base_fee_per_gas
        .last()
        .ok_or(StrategyError::NonExistentValue)?;
    let base_fee_per_gas_u128 = base_fee_per_gas.0.to_u128().ok_or_else(|| {
        StrategyError::DecodingError("The base fee per gas does not fit into u128.".to_string())
    })?;

    let mut percentiles: Vec<Nat> = fee_history
        .reward
        .into_iter()
        .flat_map(|rewards| rewards.into_iter())
        .collect();

    // sort and retrieve the median reward
    percentiles.sort_unstable();
    let zero_nat = Nat::from(0_u32);
    let median_reward = percentiles.get(median_index).unwrap_or(&zero_nat);
    let median_reward_u128 = median_reward.0.to_u128().ok_or_else(|| {
        StrategyError::DecodingError("The median reward does not fit into u128.".to_string())
    })?;

    let max_priority_fee_per_gas = median_reward_u128
        .saturating_add(base_fee_per_gas_u128)
        .max(MIN_SUGGEST_MAX_PRIORITY_FEE_PER_GAS as u128);

    Ok(FeeEstimates {
        max_fee_per_gas: max_priority_fee_per_gas,
        max_priority_fee_per_gas: median_reward_u128,
    })
}

/// Estimates the gas limit for a call through a single provider, with a
/// 20% headroom on top of the node's answer.
pub async fn estimate_gas_limit(
    rpc_canister: &Service,
    from: String,
    to: String,
    data: &[u8],
) -> StrategyResult<u128> {
    let args = json!({
        "id": 1,
        "jsonrpc": "2.0",
        "params": [{
            "from": from,
            "to": to,
            "data": format!("0x{}", hex::encode(data))
        },
        "latest"],
        "method": "eth_estimateGas"
    })
    .to_string();

    let rpc_canister_response = request_with_dynamic_retries(rpc_canister, args).await?;

    let decoded_response: JsonRpcStringResult = serde_json::from_str(&rpc_canister_response)
        .map_err(|err| {
            StrategyError::DecodingError(format!(
                "Could not decode eth_estimateGas response: {} error: {}",
                &rpc_canister_response, err
            ))
        })?;

    if decoded_response.result.len() <= 2 {
        return Err(StrategyError::DecodingError(
            "The result field of the RPC's response is empty".to_string(),
        ));
    }

    let hex_string = if decoded_response.result[2..].len() % 2 == 1 {
        format!("0{}", &decoded_response.result[2..])
    } else {
        decoded_response.result[2..].to_string()
    };

    let hex_decoded_response = hex::decode(hex_string)
        .map_err(|err| StrategyError::DecodingError(format!("{:#?}", err)))?;

    let mut padded = [0u8; 16];
    if hex_decoded_response.len() > 16 {
        return Err(StrategyError::DecodingError(
            "The gas estimate exceeds 16 bytes.".to_string(),
        ));
    }
    padded[16 - hex_decoded_response.len()..].copy_from_slice(&hex_decoded_response);
    let estimate = u128::from_be_bytes(padded);

    Ok(estimate.saturating_mul(12) / 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_index_is_the_lower_middle() {
        assert_eq!(median_index(1), 0);
        assert_eq!(median_index(2), 0);
        assert_eq!(median_index(9), 4);
        assert_eq!(median_index(10), 4);
    }

    #[test]
    #[should_panic]
    fn median_index_rejects_empty_input() {
        median_index(0);
    }
}
