//! Shared types: the Solidity interfaces of the external collaborators and
//! the candid surface of the canister API.

use alloy_sol_types::sol;
use candid::{CandidType, Int, Nat, Principal};
use serde::Deserialize;

pub type DerivationPath = Vec<Vec<u8>>;

sol!(
    // Multi-reward staking protocol
    struct RewardData {
        address token;
        uint256 amount;
    }

    function stake(uint256 amount, bool lock) external;
    function withdraw(uint256 amount) external;
    function getReward() external;
    function exit() external;
    function claimableRewards(address account) external view returns (RewardData[] memory rewards);
    function totalBalance(address user) external view returns (uint256);
    function withdrawableBalance(address user) external view returns (uint256 amount, uint256 penaltyAmount);

    // V2-style swap router
    function swapExactTokensForTokens(
        uint256 amountIn,
        uint256 amountOutMin,
        address[] calldata path,
        address to,
        uint256 deadline
    ) external returns (uint256[] memory amounts);
    function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);

    // ERC-20
    function balanceOf(address account) external view returns (uint256);
    function transfer(address to, uint256 value) external returns (bool);
    function approve(address spender, uint256 value) external returns (bool);
    function allowance(address owner, address spender) external view returns (uint256);
);

/// One reward-route table entry as provided by the administrator
#[derive(CandidType, Deserialize, Clone)]
pub struct RewardRouteInput {
    /// Reward asset address
    pub asset: String,
    /// Hop addresses from the reward asset to the base asset, inclusive
    pub path: Vec<String>,
}

/// Canister installation arguments
#[derive(CandidType, Deserialize)]
pub struct InitArgs {
    /// EVM RPC canister principal
    pub rpc_principal: Principal,
    /// Principal allowed to call withdraw / retire / deposit
    pub vault_principal: Principal,
    /// EVM address withdrawn funds are sent to
    pub vault: String,
    /// Base asset of the strategy
    pub base_asset: String,
    /// Staking protocol contract
    pub staking_contract: String,
    /// Swap router contract
    pub swap_router: String,
    /// Treasury address receiving its fee share
    pub treasury: String,
    /// Seconds between harvest log entries; None keeps the default
    pub harvest_log_cadence: Option<Nat>,
    /// Swap slippage tolerance in basis points; None or 0 accepts any output
    pub slippage: Option<Nat>,
    /// Seconds a submitted swap stays valid; None keeps the default
    pub swap_deadline: Option<Nat>,
    /// Reward assets excluded from conversion and profit attribution
    pub conversion_denylist: Vec<String>,
    /// Initial reward routes
    pub reward_routes: Vec<RewardRouteInput>,
}

/// One reward-route table entry as reported back to callers
#[derive(CandidType, Deserialize, Clone)]
pub struct RewardRouteQuery {
    pub asset: String,
    pub path: Vec<String>,
}

/// Projected outcome of a harvest, produced without executing one
#[derive(CandidType, Clone, Debug)]
pub struct HarvestEstimate {
    /// Claimable rewards valued in the base asset via router quotes
    pub expected_gross: Nat,
    /// Share of the fee a harvest caller would receive right now
    pub expected_caller_incentive: Nat,
    /// Share of the fee the treasury would receive right now
    pub expected_treasury_amount: Nat,
    /// Amount that would be compounded back into the position
    pub expected_net_profit: Nat,
}

/// Result of one executed harvest
#[derive(CandidType, Clone, Debug)]
pub struct HarvestSummary {
    /// Base asset received from converting the claimed rewards
    pub gross_converted: Nat,
    /// Fee share transferred to the harvest caller
    pub caller_incentive: Nat,
    /// Fee share transferred to the treasury
    pub treasury_amount: Nat,
    /// Realized change of total value, signed
    pub profit: Int,
    pub tvl_before: Nat,
    pub tvl_after: Nat,
    /// Whether this harvest produced a log entry (cadence gating)
    pub logged: bool,
}
