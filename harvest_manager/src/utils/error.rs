use candid::CandidType;
use evm_rpc_types::RpcError;
use ic_exports::ic_kit::RejectionCode;
use serde::Deserialize;

/// Harvest Manager Canister Result
pub type StrategyResult<T> = Result<T, StrategyError>;

/// Harvest Manager Canister Errors
#[derive(Clone, CandidType, Debug, Deserialize, PartialEq)]
pub enum StrategyError {
    /// `CallResult` error
    CallResult(RejectionCode, String),
    /// Unauthorized access
    Unauthorized,
    /// A requested value does not exist
    NonExistentValue,
    /// Wrapper for the RPC errors returned by the EVM RPC canister
    RpcResponseError(RpcError),
    /// Decoding issue
    DecodingError(String),
    /// The strategy is locked by an in-flight sequence
    Locked,
    /// The strategy is paused
    Paused,
    /// Attempted fee update exceeds its hard cap
    FeeTooHigh,
    /// Requested log slice or window exceeds the available data
    InvalidRange,
    /// A trailing-average query visited a zero divisor.
    /// Distinct from a legitimate zero return value.
    ZeroDivision(String),
    /// No consensus was reached among RPC providers
    NoConsensus,
    /// Arithmetic error
    Arithmetic(String),
    /// Unknown/Custom error
    Custom(String),
}

pub fn arithmetic_err<S: AsRef<str>>(s: S) -> StrategyError {
    StrategyError::Arithmetic(format!("{:#?}", s.as_ref()))
}

pub fn zero_division_err<S: AsRef<str>>(s: S) -> StrategyError {
    StrategyError::ZeroDivision(s.as_ref().to_string())
}
