//! The strategy's externally owned account.
//!
//! All value held by the strategy sits under this address; every outbound
//! transaction is signed with the canister's threshold key. The nonce is
//! tracked locally and resynced from the chain once when a submission
//! reports a mismatch.

use std::cell::Cell;

use alloy_primitives::{Address, U256};

use crate::{
    constants::SEND_TRANSACTION_CYCLES,
    types::DerivationPath,
    utils::{
        common::get_nonce,
        error::{StrategyError, StrategyResult},
        evm_rpc::{SendRawTransactionStatus, Service},
        transaction_builder::TransactionBuilder,
    },
};

pub struct StrategyAccount {
    pub rpc_canister: Service,
    pub address: Address,
    pub derivation_path: DerivationPath,
    nonce: Cell<u64>,
}

impl StrategyAccount {
    pub fn new(
        rpc_canister: Service,
        address: Address,
        derivation_path: DerivationPath,
        nonce: u64,
    ) -> Self {
        Self {
            rpc_canister,
            address,
            derivation_path,
            nonce: Cell::new(nonce),
        }
    }

    /// The next nonce this account will sign with
    pub fn nonce(&self) -> u64 {
        self.nonce.get()
    }

    /// Re-reads the account nonce from the chain
    pub async fn sync_nonce(&self) -> StrategyResult<()> {
        let nonce = get_nonce(&self.rpc_canister, self.address).await?;
        self.nonce.set(nonce.to::<u64>());
        Ok(())
    }

    /// Signs and submits a transaction from this account.
    pub async fn send(&self, to: Address, data: Vec<u8>, value: U256) -> StrategyResult<()> {
        for attempt in 0..2 {
            let status = TransactionBuilder::default()
                .to(to)
                .from(self.address)
                .data(data.clone())
                .value(value)
                .nonce(self.nonce.get())
                .derivation_path(self.derivation_path.clone())
                .cycles(SEND_TRANSACTION_CYCLES)
                .send(&self.rpc_canister)
                .await?;

            match status {
                SendRawTransactionStatus::Ok(_) => {
                    self.nonce.set(self.nonce.get() + 1);
                    return Ok(());
                }
                SendRawTransactionStatus::InsufficientFunds => {
                    return Err(StrategyError::Custom(
                        "Not enough balance to cover the gas fee.".to_string(),
                    ))
                }
                SendRawTransactionStatus::NonceTooLow | SendRawTransactionStatus::NonceTooHigh => {
                    if attempt == 0 {
                        self.sync_nonce().await?;
                    }
                }
            }
        }

        Err(StrategyError::Custom(
            "Transaction submission kept failing after a nonce resync.".to_string(),
        ))
    }
}
