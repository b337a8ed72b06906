//! Typed binding to the EVM RPC canister, reduced to the calls the
//! harvest manager actually performs.

use candid::{self, CandidType, Deserialize, Nat, Principal};
use evm_rpc_types::{MultiRpcResult, RpcConfig, RpcResult, RpcService, RpcServices};
use ic_exports::ic_cdk::{self, api::call::CallResult as Result};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, CandidType, Deserialize)]
pub struct GetTransactionCountArgs {
    pub address: String,
    pub block: BlockTag,
}

#[derive(Clone, Debug, PartialEq, Eq, CandidType, Deserialize, Default)]
pub enum BlockTag {
    #[default]
    Latest,
    Finalized,
    Safe,
    Earliest,
    Pending,
    Number(Nat),
}

#[derive(Clone, Debug, PartialEq, Eq, CandidType, Deserialize)]
pub struct FeeHistoryArgs {
    /// Number of blocks in the requested range.
    #[serde(rename = "blockCount")]
    pub block_count: Nat,

    /// Highest block of the requested range.
    #[serde(rename = "newestBlock")]
    pub newest_block: BlockTag,

    /// Percentile values (0-100) of effective priority fees to sample
    /// per block in the range.
    #[serde(rename = "rewardPercentiles")]
    pub reward_percentiles: Option<Vec<u8>>,
}

/// The slice of the `eth_feeHistory` response the gas estimator consumes.
/// The canister returns additional fields; candid subtyping drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, CandidType)]
pub struct FeeHistory {
    /// An array of block base fees per gas, including the block after the
    /// newest of the returned range.
    #[serde(rename = "baseFeePerGas")]
    pub base_fee_per_gas: Vec<Nat>,

    /// Effective priority fees per gas at the requested block percentiles.
    #[serde(rename = "reward")]
    pub reward: Vec<Vec<Nat>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, CandidType)]
pub enum SendRawTransactionStatus {
    Ok(Option<String>),
    InsufficientFunds,
    NonceTooLow,
    NonceTooHigh,
}

#[derive(Clone, Debug, PartialEq, Eq, CandidType, Deserialize)]
pub struct CallArgs {
    pub transaction: TransactionRequest,
    /// Defaults to "latest" when unspecified.
    pub block: Option<BlockTag>,
}

/// `eth_call` transaction descriptor. Every field the EVM RPC canister
/// accepts is optional; only the fields the strategy populates are kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, CandidType, Deserialize)]
pub struct TransactionRequest {
    /// The type of the transaction ("0x0", "0x1" or "0x2")
    #[serde(rename = "type")]
    pub tx_type: Option<String>,

    /// Transaction nonce
    pub nonce: Option<Nat>,

    /// Address of the receiver
    pub to: Option<String>,

    /// The address of the sender
    pub from: Option<String>,

    /// Gas limit for the transaction
    pub gas: Option<Nat>,

    /// Amount of ETH sent with this transaction
    pub value: Option<Nat>,

    /// Transaction input data
    pub input: Option<String>,

    /// The legacy gas price willing to be paid by the sender in wei
    #[serde(rename = "gasPrice")]
    pub gas_price: Option<Nat>,

    /// Maximum fee per gas the sender is willing to pay to miners in wei
    #[serde(rename = "maxPriorityFeePerGas")]
    pub max_priority_fee_per_gas: Option<Nat>,

    /// The maximum total fee per gas the sender is willing to pay in wei
    #[serde(rename = "maxFeePerGas")]
    pub max_fee_per_gas: Option<Nat>,

    /// Chain ID that this transaction is valid on
    #[serde(rename = "chainId")]
    pub chain_id: Option<Nat>,
}

/// The slice of the `eth_getBlockByNumber` response the strategy consumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, CandidType)]
pub struct Block {
    /// Base fee per gas (post EIP-1559 blocks)
    #[serde(rename = "baseFeePerGas")]
    pub base_fee_per_gas: Option<Nat>,

    /// Block number
    pub number: Nat,

    /// Maximum gas allowed in this block
    #[serde(rename = "gasLimit")]
    pub gas_limit: Nat,

    /// Gas used by all transactions in this block
    #[serde(rename = "gasUsed")]
    pub gas_used: Nat,

    /// Block hash
    pub hash: String,

    /// Timestamp
    #[serde(rename = "timestamp")]
    pub timestamp: Nat,
}

#[derive(Copy, Clone, Debug)]
pub struct Service(pub Principal);

impl Default for Service {
    fn default() -> Self {
        Self(Principal::anonymous())
    }
}

impl Service {
    pub async fn eth_fee_history(
        &self,
        arg0: RpcServices,
        arg1: Option<RpcConfig>,
        arg2: FeeHistoryArgs,
        cycles: u128,
    ) -> Result<(MultiRpcResult<FeeHistory>,)> {
        ic_cdk::api::call::call_with_payment128(
            self.0,
            "eth_feeHistory",
            (arg0, arg1, arg2),
            cycles,
        )
        .await
    }

    pub async fn eth_get_transaction_count(
        &self,
        arg0: RpcServices,
        arg1: Option<RpcConfig>,
        arg2: GetTransactionCountArgs,
    ) -> Result<(MultiRpcResult<Nat>,)> {
        ic_cdk::call(self.0, "eth_getTransactionCount", (arg0, arg1, arg2)).await
    }

    pub async fn eth_send_raw_transaction(
        &self,
        arg0: RpcServices,
        arg1: Option<RpcConfig>,
        arg2: String,
        cycles: u128,
    ) -> Result<(MultiRpcResult<SendRawTransactionStatus>,)> {
        ic_cdk::api::call::call_with_payment128(
            self.0,
            "eth_sendRawTransaction",
            (arg0, arg1, arg2),
            cycles,
        )
        .await
    }

    pub async fn get_block_by_number(
        &self,
        arg0: RpcServices,
        arg1: Option<RpcConfig>,
        arg2: BlockTag,
    ) -> Result<(MultiRpcResult<Block>,)> {
        ic_cdk::api::call::call_with_payment128(
            self.0,
            "eth_getBlockByNumber",
            (arg0, arg1, arg2),
            1_000_000_000_u128,
        )
        .await
    }

    pub async fn request(
        &self,
        arg0: RpcService,
        arg1: String,
        arg2: u64,
        cycles: u128,
    ) -> Result<(RpcResult<String>,)> {
        ic_cdk::api::call::call_with_payment128(self.0, "request", (arg0, arg1, arg2), cycles).await
    }

    pub async fn request_cost(
        &self,
        arg0: RpcService,
        arg1: String,
        arg2: u64,
    ) -> Result<(RpcResult<Nat>,)> {
        ic_cdk::call(self.0, "requestCost", (arg0, arg1, arg2)).await
    }

    pub async fn eth_call(
        &self,
        source: RpcServices,
        config: Option<RpcConfig>,
        args: CallArgs,
    ) -> Result<(MultiRpcResult<String>,)> {
        ic_cdk::call(self.0, "eth_call", (source, config, args)).await
    }
}
