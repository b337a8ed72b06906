//! Transaction builder (and sender) that interacts with the EVM RPC canister

use alloy::consensus::TxEip1559;
use alloy_primitives::{Address, Bytes, TxKind, U256};

use crate::{
    constants::{CHAIN_ID, TRANSACTION_GAS_LIMIT},
    providers::get_ranked_rpc_providers,
    types::DerivationPath,
};

use super::{
    common::get_block_tag,
    error::{StrategyError, StrategyResult},
    evm_rpc::{SendRawTransactionStatus, Service},
    gas::{estimate_gas_limit, estimate_transaction_fees, FeeEstimates},
    signer::{ecdsa_key_id, sign_eip1559_transaction},
};

use crate::providers::extract_multi_rpc_result;

/// Transaction builder struct
#[derive(Default)]
pub struct TransactionBuilder {
    to: Address,
    from: Address,
    data: Vec<u8>,
    value: U256,
    nonce: u64,
    derivation_path: DerivationPath,
    cycles: u128,
}

impl TransactionBuilder {
    /// Sets the `to` field
    pub fn to(mut self, to: Address) -> Self {
        self.to = to;
        self
    }

    /// Sets the `from` field
    pub fn from(mut self, from: Address) -> Self {
        self.from = from;
        self
    }

    /// Sets the `data` field
    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Sets the `value` field
    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Sets the `nonce` field
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the `derivation_path` field
    pub fn derivation_path(mut self, derivation_path: DerivationPath) -> Self {
        self.derivation_path = derivation_path;
        self
    }

    /// Sets the `cycles` field
    pub fn cycles(mut self, cycles: u128) -> Self {
        self.cycles = cycles;
        self
    }

    /// Builds the TransactionBuilder into a transaction and sends it
    pub async fn send(self, rpc_canister: &Service) -> StrategyResult<SendRawTransactionStatus> {
        let input = Bytes::from(self.data.clone());
        let rpc = get_ranked_rpc_providers();
        let block_tag = get_block_tag(rpc_canister, true).await?;
        let FeeEstimates {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } = estimate_transaction_fees(9, rpc.clone(), rpc_canister, block_tag).await?;

        // A single provider occasionally refuses to estimate; the
        // configured ceiling keeps the transaction submittable.
        let gas_limit = estimate_gas_limit(
            rpc_canister,
            self.from.to_string(),
            self.to.to_string(),
            &self.data,
        )
        .await
        .unwrap_or(TRANSACTION_GAS_LIMIT);

        let request = TxEip1559 {
            chain_id: CHAIN_ID,
            to: TxKind::Call(self.to),
            max_fee_per_gas,
            max_priority_fee_per_gas,
            value: self.value,
            nonce: self.nonce,
            gas_limit,
            access_list: Default::default(),
            input,
        };

        let signed_transaction =
            sign_eip1559_transaction(request, ecdsa_key_id(), self.derivation_path, self.from)
                .await?;

        match rpc_canister
            .eth_send_raw_transaction(rpc, None, signed_transaction, self.cycles)
            .await
        {
            Ok((response,)) => extract_multi_rpc_result(response),
            Err((code, message)) => Err(StrategyError::CallResult(code, message)),
        }
    }
}
