//! BIP39 seed and BIP32 master key.
//!
//! Both types hold secret material for the lifetime of a wallet session only.
//! Their `Debug` output is redacted and their bytes are wiped on drop.

use crate::error::DerivationError;
use bip32::{ChildNumber, XPrv};
use bip39::Mnemonic;
use std::fmt;
use zeroize::Zeroizing;

/// Entropy lengths (bytes) BIP39 accepts.
const ENTROPY_LENGTHS: [usize; 5] = [16, 20, 24, 28, 32];

/// Seed lengths (bytes) BIP32 accepts for master key generation.
const MIN_SEED_LEN: usize = 16;
const MAX_SEED_LEN: usize = 64;

/// Wallet seed.
pub struct Seed {
    bytes: Zeroizing<Vec<u8>>,
    entropy: Option<Zeroizing<Vec<u8>>>,
    passphrase: Zeroizing<String>,
}

impl Seed {
    /// Build the seed from the wallet document's `seed_hex` (BIP39 entropy) and passphrase.
    pub fn from_entropy_hex(seed_hex: &str, passphrase: &str) -> Result<Self, DerivationError> {
        let entropy = Zeroizing::new(
            hex::decode(seed_hex.trim())
                .map_err(|e| DerivationError::InvalidSeed(format!("seed hex: {}", e)))?,
        );
        Self::from_entropy(&entropy, passphrase)
    }

    /// Build the seed from raw BIP39 entropy.
    pub fn from_entropy(entropy: &[u8], passphrase: &str) -> Result<Self, DerivationError> {
        if !ENTROPY_LENGTHS.contains(&entropy.len()) {
            return Err(DerivationError::InvalidSeed(format!(
                "entropy must be 16, 20, 24, 28 or 32 bytes, got {}",
                entropy.len()
            )));
        }
        let mnemonic = Mnemonic::from_entropy(entropy)
            .map_err(|e| DerivationError::InvalidSeed(e.to_string()))?;
        let seed = Zeroizing::new(mnemonic.to_seed(passphrase));

        Ok(Self {
            bytes: Zeroizing::new(seed.to_vec()),
            entropy: Some(Zeroizing::new(entropy.to_vec())),
            passphrase: Zeroizing::new(passphrase.to_string()),
        })
    }

    /// Build the seed from a mnemonic phrase.
    pub fn from_mnemonic(phrase: &str, passphrase: &str) -> Result<Self, DerivationError> {
        let mnemonic = Mnemonic::parse(phrase.trim())
            .map_err(|e| DerivationError::InvalidSeed(e.to_string()))?;
        let entropy = Zeroizing::new(mnemonic.to_entropy());
        Self::from_entropy(&entropy, passphrase)
    }

    /// Use already stretched seed bytes directly.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DerivationError> {
        if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&bytes.len()) {
            return Err(DerivationError::InvalidSeed(format!(
                "seed must be {}..={} bytes, got {}",
                MIN_SEED_LEN,
                MAX_SEED_LEN,
                bytes.len()
            )));
        }
        Ok(Self {
            bytes: Zeroizing::new(bytes.to_vec()),
            entropy: None,
            passphrase: Zeroizing::new(String::new()),
        })
    }

    /// Stretched seed bytes (CAUTION: sensitive)
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Entropy as stored in `seed_hex`, when the seed was built from entropy.
    pub fn entropy_hex(&self) -> Option<Zeroizing<String>> {
        self.entropy
            .as_ref()
            .map(|e| Zeroizing::new(hex::encode(e.as_slice())))
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    /// Mnemonic phrase for the seed entropy, when known.
    pub fn mnemonic_phrase(&self) -> Option<Zeroizing<String>> {
        let entropy = self.entropy.as_ref()?;
        Mnemonic::from_entropy(entropy)
            .ok()
            .map(|m| Zeroizing::new(m.to_string()))
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed(<redacted {} bytes>)", self.bytes.len())
    }
}

/// Root extended private key of a seed.
#[derive(Clone)]
pub struct MasterKey {
    root: XPrv,
}

impl MasterKey {
    pub fn from_seed(seed: &Seed) -> Result<Self, DerivationError> {
        let root = XPrv::new(seed.as_bytes())
            .map_err(|e| DerivationError::InvalidSeed(e.to_string()))?;
        Ok(Self { root })
    }

    /// Walk a sequence of child numbers from the root.
    pub(crate) fn derive(&self, path: &[ChildNumber]) -> Result<XPrv, DerivationError> {
        let mut key = self.root.clone();
        for child in path {
            key = key.derive_child(*child)?;
        }
        Ok(key)
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey(<redacted>)")
    }
}
