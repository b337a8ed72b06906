//! Caller-restriction policy.
//!
//! Three gates cover every mutating entry point: the canister controllers
//! administer fees, routes and pause; the configured vault principal moves
//! funds; and harvests accept only self-authenticating principals, which
//! keeps canisters (and composite calls through them) out of the
//! caller-incentive game.

use candid::Principal;
use ic_exports::ic_cdk::api::is_controller;

use crate::{
    state::VAULT_PRINCIPAL,
    utils::error::{StrategyError, StrategyResult},
};

/// Errs with `Unauthorized` unless the caller is a canister controller
pub fn require_owner(caller: &Principal) -> StrategyResult<()> {
    if !is_controller(caller) {
        return Err(StrategyError::Unauthorized);
    }
    Ok(())
}

/// Errs with `Unauthorized` unless the caller is the configured vault
pub fn require_vault(caller: &Principal) -> StrategyResult<()> {
    if *caller != VAULT_PRINCIPAL.get() {
        return Err(StrategyError::Unauthorized);
    }
    Ok(())
}

/// Errs with `Unauthorized` unless the caller is a self-authenticating
/// principal. Canister principals and the anonymous principal fail.
pub fn require_plain_caller(caller: &Principal) -> StrategyResult<()> {
    if !is_self_authenticating(caller) {
        return Err(StrategyError::Unauthorized);
    }
    Ok(())
}

/// Self-authenticating principals are 29 bytes long and end in 0x02
fn is_self_authenticating(principal: &Principal) -> bool {
    let bytes = principal.as_slice();
    bytes.len() == 29 && bytes.last() == Some(&0x02)
}
