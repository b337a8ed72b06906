//! Common utility and helper functions that are used across the project

use std::str::FromStr;

use alloy_primitives::{Address, Sign, I256, U256};
use alloy_sol_types::SolCall;
use candid::{Int, Nat};
use evm_rpc_types::{HttpOutcallError, RpcConfig, RpcError, RpcService};
use ic_exports::ic_cdk::{self, api::call::CallResult};
use num_bigint::{BigInt, BigUint};

use super::{error::*, evm_rpc::*};

use crate::{
    constants::{DEFAULT_MAX_RESPONSE_BYTES, PROVIDER_COUNT, PROVIDER_THRESHOLD},
    providers::{extract_multi_rpc_result, get_ranked_rpc_provider, get_ranked_rpc_providers},
    state::RPC_SERVICE,
};

/// Converts String to Address and returns StrategyError on failure
pub fn string_to_address(input: String) -> StrategyResult<Address> {
    Address::from_str(&input).map_err(|err| StrategyError::DecodingError(format!("{:#?}", err)))
}

/// Converts values of type `Nat` to `U256`
pub fn nat_to_u256(n: &Nat) -> StrategyResult<U256> {
    let be_bytes = n.0.to_bytes_be();
    if be_bytes.len() > 32 {
        return Err(StrategyError::DecodingError(
            "The `Nat` input exceeds 32 bytes in its big-endian representation.".to_string(),
        ));
    }
    let mut padded_bytes = [0u8; 32];
    let start_pos = 32 - be_bytes.len();
    padded_bytes[start_pos..].copy_from_slice(&be_bytes);

    Ok(U256::from_be_bytes(padded_bytes))
}

/// Converts values of type `U256` to `Nat`
pub fn u256_to_nat(value: &U256) -> Nat {
    Nat(BigUint::from_bytes_be(&value.to_be_bytes::<32>()))
}

/// Converts values of type `Nat` to `u64`
pub fn nat_to_u64(n: &Nat) -> StrategyResult<u64> {
    use num_traits::ToPrimitive;
    n.0.to_u64().ok_or_else(|| {
        StrategyError::DecodingError("The `Nat` input does not fit into u64.".to_string())
    })
}

/// Converts values of type `U256` to `I256`, failing above the signed range
pub fn u256_to_i256(value: U256) -> StrategyResult<I256> {
    I256::checked_from_sign_and_abs(Sign::Positive, value)
        .ok_or_else(|| arithmetic_err("value exceeds the I256 range"))
}

/// Converts values of type `I256` to candid `Int`
pub fn i256_to_int(value: &I256) -> Int {
    let (sign, magnitude) = value.into_sign_and_abs();
    let sign = if sign.is_negative() {
        num_bigint::Sign::Minus
    } else {
        num_bigint::Sign::Plus
    };
    Int(BigInt::from_biguint(
        sign,
        BigUint::from_bytes_be(&magnitude.to_be_bytes::<32>()),
    ))
}

/// Converts candid `Int` values to `I256`
pub fn int_to_i256(value: &Int) -> StrategyResult<I256> {
    let (sign, magnitude) = value.0.clone().into_parts();
    let bytes = magnitude.to_bytes_be();
    if bytes.len() > 32 {
        return Err(StrategyError::DecodingError(
            "The `Int` input exceeds 32 bytes in its big-endian representation.".to_string(),
        ));
    }
    let abs = U256::from_be_slice(&bytes);
    let sign = match sign {
        num_bigint::Sign::Minus => Sign::Negative,
        _ => Sign::Positive,
    };
    I256::checked_from_sign_and_abs(sign, abs)
        .ok_or_else(|| arithmetic_err("value exceeds the I256 range"))
}

/// Returns `T` from a Solidity return payload.
pub fn decode_abi_response<T, F: SolCall<Return = T>>(hex_data: String) -> StrategyResult<T> {
    let stripped_hex = hex_data
        .strip_prefix("0x")
        .unwrap_or(&hex_data)
        .to_string();
    let hex_bytes =
        hex::decode(stripped_hex).map_err(|err| StrategyError::DecodingError(err.to_string()))?;
    F::abi_decode_returns(&hex_bytes, false)
        .map_err(|err| StrategyError::DecodingError(err.to_string()))
}

/// Extracts the Ok or Err values of a canister call and returns them.
pub fn extract_call_result<T>(result: CallResult<(T,)>) -> StrategyResult<T> {
    result
        .map(|(success_value,)| success_value)
        .map_err(|(rejection_code, error_message)| {
            StrategyError::CallResult(rejection_code, error_message)
        })
}

fn is_response_size_error(err: &RpcError) -> bool {
    if let RpcError::HttpOutcallError(HttpOutcallError::IcError { code, message }) = err {
        *code == ic_cdk::api::call::RejectionCode::SysFatal
            && (message.contains("size limit") || message.contains("length limit"))
    } else {
        false
    }
}

pub fn get_rpc_config(max_response_bytes: Option<u64>) -> RpcConfig {
    RpcConfig {
        response_size_estimate: max_response_bytes,
        response_consensus: Some(evm_rpc_types::ConsensusStrategy::Threshold {
            total: Some(PROVIDER_COUNT),
            min: PROVIDER_THRESHOLD,
        }),
    }
}

/// Rotates through the configured single-provider services
pub fn get_rpc_service() -> RpcService {
    RPC_SERVICE.with(|rpc| {
        let mut state = rpc.borrow_mut();
        let rpc = match state.front() {
            Some(inner) => inner.clone(),
            None => unreachable!(),
        };
        state.rotate_left(1);
        rpc
    })
}

/// Returns the estimated cycles cost of performing the RPC call if successful
pub async fn estimate_cycles(
    rpc_canister: &Service,
    rpc: RpcService,
    json_data: String,
    max_response_bytes: u64,
) -> StrategyResult<u128> {
    let call_result = rpc_canister
        .request_cost(rpc, json_data, max_response_bytes)
        .await;

    let extracted_call_result = extract_call_result(call_result)?;

    match extracted_call_result {
        Ok(cost) => {
            let cost_u128 = u128::try_from(cost.0).map_err(|err| {
                StrategyError::DecodingError(format!("Error converting Nat to u128: {:#?}", err))
            })?;
            Ok(cost_u128)
        }
        Err(rpc_err) => Err(StrategyError::RpcResponseError(rpc_err)),
    }
}

/// Performs `eth_call` reads against the EVM RPC canister, doubling the max
/// response bytes argument while the response does not fit.
/// Exits the loop if either of the following are satisfied:
/// A) The EVM RPC canister responds with Ok() or an error unrelated to the response size
/// B) The limit of 2MB is reached.
pub async fn call_with_dynamic_retries(
    rpc_canister: &Service,
    block: BlockTag,
    to: Address,
    data: Vec<u8>,
) -> StrategyResult<String> {
    let mut max_response_bytes = DEFAULT_MAX_RESPONSE_BYTES;
    let provider_set = get_ranked_rpc_providers();
    let data_string = format!("0x{}", hex::encode(data));

    // There is a 2 MB limit on the response size, an ICP limitation.
    while max_response_bytes < 2_000_000 {
        let transaction = TransactionRequest {
            to: Some(to.to_string()),
            input: Some(data_string.clone()),
            ..Default::default()
        };

        let args = CallArgs {
            transaction,
            block: Some(block.clone()),
        };

        let config = get_rpc_config(Some(max_response_bytes));
        let response = rpc_canister
            .eth_call(provider_set.clone(), Some(config), args)
            .await;

        let extracted_response = extract_call_result(response)?;
        let extracted_rpc_result = extract_multi_rpc_result(extracted_response);

        if let Err(StrategyError::RpcResponseError(err)) = &extracted_rpc_result {
            if is_response_size_error(err) {
                max_response_bytes *= 2;
                continue;
            }
        }

        return extracted_rpc_result;
    }

    Err(StrategyError::Custom(
        "Call with dynamic retries reached its ceiling of 2 Megabytes.".to_string(),
    ))
}

/// Performs raw `request` calls to the EVM RPC canister, doubling the max
/// response bytes argument while the response does not fit and rotating
/// the provider on unrelated errors.
pub async fn request_with_dynamic_retries(
    rpc_canister: &Service,
    json_data: String,
) -> StrategyResult<String> {
    let mut max_response_bytes = DEFAULT_MAX_RESPONSE_BYTES;
    let mut rpc = get_rpc_service();
    let mut rpc_changes = 0;

    // There is a 2 MB limit on the response size, an ICP limitation.
    while max_response_bytes < 2_000_000 && rpc_changes < 3 {
        let cycles = estimate_cycles(
            rpc_canister,
            rpc.clone(),
            json_data.clone(),
            max_response_bytes,
        )
        .await?;

        let call_result = rpc_canister
            .request(rpc.clone(), json_data.clone(), max_response_bytes, cycles)
            .await;

        let extracted_response =
            extract_call_result(call_result)?.map_err(StrategyError::RpcResponseError);

        match &extracted_response {
            Err(StrategyError::RpcResponseError(err)) => {
                if is_response_size_error(err) {
                    max_response_bytes *= 2;
                    continue;
                }
                rpc = get_rpc_service();
                rpc_changes += 1;
                continue;
            }
            _ => return extracted_response,
        }
    }

    Err(StrategyError::Custom(format!(
        "Request with dynamic retries gave up after {} provider rotations at {} max response bytes.",
        rpc_changes, max_response_bytes
    )))
}

/// Resolves the current block into a pinned block number tag
pub async fn get_block_tag(rpc_canister: &Service, latest: bool) -> StrategyResult<BlockTag> {
    let rpc = get_ranked_rpc_provider();
    let rpc_config = RpcConfig {
        response_size_estimate: Some(2_000),
        response_consensus: Some(evm_rpc_types::ConsensusStrategy::Threshold {
            total: Some(1),
            min: 1,
        }),
    };

    let tag = if latest {
        BlockTag::Latest
    } else {
        BlockTag::Safe
    };

    let call_result = rpc_canister
        .get_block_by_number(rpc, Some(rpc_config), tag)
        .await;
    let rpc_result = extract_call_result(call_result)?;
    let result = extract_multi_rpc_result(rpc_result)?;

    Ok(BlockTag::Number(result.number))
}

/// On success, returns the nonce associated with the given address
pub async fn get_nonce(rpc_canister: &Service, address: Address) -> StrategyResult<U256> {
    let account = address.to_string();
    let rpc = get_ranked_rpc_providers();
    let args = GetTransactionCountArgs {
        address: account,
        block: BlockTag::Latest,
    };

    let config = get_rpc_config(Some(10_000));

    let result = rpc_canister
        .eth_get_transaction_count(rpc, Some(config), args)
        .await;

    let wrapped_number = extract_call_result(result)?;
    let number = extract_multi_rpc_result(wrapped_number)?;
    nat_to_u256(&number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ic_exports::ic_cdk::api::call::RejectionCode;

    #[test]
    fn string_to_address_round_trips() {
        let input = "0x0123456789abcdef0123456789abcdef01234567".to_string();
        let address = string_to_address(input.clone()).unwrap();
        assert_eq!(address, Address::from_str(&input).unwrap());
    }

    #[test]
    fn string_to_address_rejects_garbage() {
        assert!(string_to_address("not an address".to_string()).is_err());
    }

    #[test]
    fn nat_and_u256_round_trip() {
        let value = U256::from(987_654_321_000_u128);
        let nat = u256_to_nat(&value);
        assert_eq!(nat_to_u256(&nat).unwrap(), value);
    }

    #[test]
    fn nat_to_u256_rejects_oversized_values() {
        let too_big = Nat(BigUint::from_bytes_be(&[0xff; 33]));
        assert!(nat_to_u256(&too_big).is_err());
    }

    #[test]
    fn int_and_i256_round_trip_with_sign() {
        for raw in [0_i128, 42, -42, i64::MAX as i128, -(1_i128 << 100)] {
            let value = I256::try_from(raw).unwrap();
            let int = i256_to_int(&value);
            assert_eq!(int_to_i256(&int).unwrap(), value);
        }
    }

    #[test]
    fn u256_to_i256_rejects_values_above_the_signed_range() {
        assert!(u256_to_i256(U256::MAX).is_err());
        assert_eq!(u256_to_i256(U256::from(7)).unwrap(), I256::try_from(7).unwrap());
    }

    #[test]
    fn response_size_errors_are_detected() {
        let err = RpcError::HttpOutcallError(HttpOutcallError::IcError {
            code: RejectionCode::SysFatal,
            message: "size limit exceeded".to_string(),
        });
        assert!(is_response_size_error(&err));

        let other = RpcError::HttpOutcallError(HttpOutcallError::IcError {
            code: RejectionCode::CanisterReject,
            message: "some other error".to_string(),
        });
        assert!(!is_response_size_error(&other));
    }

    #[test]
    fn call_result_extraction() {
        let ok: CallResult<(String,)> = Ok(("success".to_string(),));
        assert_eq!(extract_call_result(ok).unwrap(), "success".to_string());

        let err: CallResult<(String,)> =
            Err((RejectionCode::CanisterReject, "error message".to_string()));
        match extract_call_result(err).unwrap_err() {
            StrategyError::CallResult(code, message) => {
                assert_eq!(code, RejectionCode::CanisterReject);
                assert_eq!(message, "error message".to_string());
            }
            _ => panic!("Expected CallResult error"),
        }
    }

    #[test]
    fn rpc_config_uses_the_consensus_thresholds() {
        let config = get_rpc_config(Some(5_000));
        assert_eq!(config.response_size_estimate, Some(5_000));
        match config.response_consensus {
            Some(evm_rpc_types::ConsensusStrategy::Threshold { total, min }) => {
                assert_eq!(total, Some(PROVIDER_COUNT));
                assert_eq!(min, PROVIDER_THRESHOLD);
            }
            _ => panic!("Expected Threshold consensus strategy"),
        }
    }

    #[test]
    fn rpc_service_rotation_cycles_through_providers() {
        let first = get_rpc_service();
        let second = get_rpc_service();
        let third = get_rpc_service();
        let wrapped = get_rpc_service();
        assert_ne!(format!("{first:?}"), format!("{second:?}"));
        assert_ne!(format!("{second:?}"), format!("{third:?}"));
        assert_eq!(format!("{first:?}"), format!("{wrapped:?}"));
    }
}
