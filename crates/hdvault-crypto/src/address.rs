//! Receive address encoding.
//!
//! - `legacy`: P2PKH, Base58Check with version byte 0x00
//! - `segwit`: P2WPKH, bech32 witness v0 with the `bc` prefix

use crate::error::DerivationError;
use bip32::{ChildNumber, XPub};
use hdvault_types::DerivationType;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use std::ops::Range;
use std::str::FromStr;

const P2PKH_VERSION: u8 = 0x00;

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&Ripemd160::digest(sha));
    out
}

/// Base58Check P2PKH address of a compressed public key.
pub fn p2pkh_address(public_key: &[u8; 33]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(P2PKH_VERSION);
    payload.extend_from_slice(&hash160(public_key));
    bs58::encode(payload).with_check().into_string()
}

/// Bech32 P2WPKH address of a compressed public key.
pub fn p2wpkh_address(public_key: &[u8; 33]) -> Result<String, DerivationError> {
    let program = hash160(public_key);
    bech32::segwit::encode(bech32::hrp::BC, bech32::segwit::VERSION_0, &program)
        .map_err(|e| DerivationError::AddressEncoding(e.to_string()))
}

/// Address for a public key under a derivation type.
pub fn encode_address(
    derivation_type: DerivationType,
    public_key: &[u8; 33],
) -> Result<String, DerivationError> {
    match derivation_type {
        DerivationType::Legacy => Ok(p2pkh_address(public_key)),
        DerivationType::Segwit => p2wpkh_address(public_key),
    }
}

/// Derive the addresses at `indices` below a chain-level xpub (e.g. the cached
/// receive account).
pub fn derive_receive_addresses(
    chain_xpub: &str,
    derivation_type: DerivationType,
    indices: Range<u32>,
) -> Result<Vec<String>, DerivationError> {
    let chain = XPub::from_str(chain_xpub)
        .map_err(|e| DerivationError::InvalidKey(e.to_string()))?;

    let mut addresses = Vec::with_capacity(indices.len());
    for index in indices {
        let child = chain.derive_child(ChildNumber::new(index, false)?)?;
        addresses.push(encode_address(derivation_type, &child.to_bytes())?);
    }
    Ok(addresses)
}
