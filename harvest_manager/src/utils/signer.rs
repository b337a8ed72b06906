//! Threshold-ECDSA signing of strategy transactions and derivation of the
//! strategy account address.

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::signers::k256::{elliptic_curve::sec1::ToEncodedPoint, PublicKey};
use alloy_primitives::{Address, Signature, B256};
use ic_exports::ic_cdk::api::management_canister::ecdsa::{
    ecdsa_public_key, sign_with_ecdsa, EcdsaCurve, EcdsaKeyId, EcdsaPublicKeyArgument,
    SignWithEcdsaArgument,
};

use super::error::{StrategyError, StrategyResult};
use crate::{constants::ECDSA_KEY_NAME, types::DerivationPath};

pub fn ecdsa_key_id() -> EcdsaKeyId {
    EcdsaKeyId {
        curve: EcdsaCurve::Secp256k1,
        name: String::from(ECDSA_KEY_NAME),
    }
}

/// Resolves the EVM address controlled by the canister under the given
/// derivation path.
pub async fn derive_account_address(derivation_path: DerivationPath) -> StrategyResult<Address> {
    let args = EcdsaPublicKeyArgument {
        canister_id: None,
        derivation_path,
        key_id: ecdsa_key_id(),
    };

    let (response,) = ecdsa_public_key(args)
        .await
        .map_err(|(code, message)| StrategyError::CallResult(code, message))?;

    public_key_to_address(&response.public_key)
}

/// Keccak of the uncompressed public key, last 20 bytes.
fn public_key_to_address(public_key: &[u8]) -> StrategyResult<Address> {
    let key = PublicKey::from_sec1_bytes(public_key)
        .map_err(|err| StrategyError::DecodingError(format!("{:#?}", err)))?;
    let point = key.to_encoded_point(false);
    Ok(Address::from_raw_public_key(&point.as_bytes()[1..]))
}

/// Signs an EIP-1559 transaction with the canister's threshold key and
/// returns the raw transaction as a hex string ready for submission.
pub async fn sign_eip1559_transaction(
    transaction: TxEip1559,
    key_id: EcdsaKeyId,
    derivation_path: DerivationPath,
    from: Address,
) -> StrategyResult<String> {
    let prehash = transaction.signature_hash();

    let (response,) = sign_with_ecdsa(SignWithEcdsaArgument {
        message_hash: prehash.to_vec(),
        derivation_path,
        key_id,
    })
    .await
    .map_err(|(code, message)| StrategyError::CallResult(code, message))?;

    let signature = signature_with_recovered_parity(&prehash, &response.signature, from)?;
    let signed = transaction.into_signed(signature);
    let envelope = TxEnvelope::from(signed);

    Ok(format!("0x{}", hex::encode(envelope.encoded_2718())))
}

/// The management canister returns a 64-byte r||s signature without a
/// recovery id; the parity is reconstructed by recovering against the
/// known account address.
fn signature_with_recovered_parity(
    prehash: &B256,
    raw_signature: &[u8],
    from: Address,
) -> StrategyResult<Signature> {
    for parity in [false, true] {
        let signature = Signature::from_bytes_and_parity(raw_signature, parity)
            .map_err(|err| StrategyError::DecodingError(format!("{:#?}", err)))?;

        if let Ok(recovered) = signature.recover_address_from_prehash(prehash) {
            if recovered == from {
                return Ok(signature);
            }
        }
    }

    Err(StrategyError::DecodingError(
        "Neither signature parity recovers the strategy account.".to_string(),
    ))
}
