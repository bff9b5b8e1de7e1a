//! Deterministic HD key derivation - BIP32 / BIP44 / BIP84.
//!
//! Paths have the shape `m/purpose'/coin_type'/account'[/chain[/address_index]]`.
//! Extended keys are serialized with the mainnet `xprv`/`xpub` version bytes for every
//! purpose, which is the format the wallet document stores.

use crate::error::DerivationError;
use crate::seed::{MasterKey, Seed};
use bip32::{ChildNumber, Prefix, XPrv, XPub};
use hdvault_types::{AddressCache, Derivation, DerivationType};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Chain the keys are derived for (SLIP-44 coin type).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Coin {
    #[default]
    Bitcoin,
    BitcoinCash,
}

impl Coin {
    pub const fn coin_type(self) -> u32 {
        match self {
            Coin::Bitcoin => 0,
            Coin::BitcoinCash => 145,
        }
    }
}

/// Receive chain index.
pub const RECEIVE_CHAIN: u32 = 0;
/// Change chain index.
pub const CHANGE_CHAIN: u32 = 1;

/// Location of a key in the HD tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyPath {
    pub purpose: u32,
    pub coin_type: u32,
    pub account: u32,
    pub chain: Option<u32>,
    pub address_index: Option<u32>,
}

impl KeyPath {
    /// Account-level path `m/purpose'/coin_type'/account'`.
    pub fn account(purpose: u32, coin_type: u32, account: u32) -> Self {
        Self {
            purpose,
            coin_type,
            account,
            chain: None,
            address_index: None,
        }
    }

    /// Account-level path for a derivation type on a coin.
    pub fn for_derivation(derivation_type: DerivationType, coin: Coin, account: u32) -> Self {
        Self::account(derivation_type.purpose(), coin.coin_type(), account)
    }

    pub fn with_chain(mut self, chain: u32) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Set the address index. Implies the receive chain when none is set.
    pub fn with_address_index(mut self, index: u32) -> Self {
        self.chain.get_or_insert(RECEIVE_CHAIN);
        self.address_index = Some(index);
        self
    }

    fn child_numbers(&self) -> Result<Vec<ChildNumber>, DerivationError> {
        let mut path = vec![
            ChildNumber::new(self.purpose, true)?,
            ChildNumber::new(self.coin_type, true)?,
            ChildNumber::new(self.account, true)?,
        ];
        if let Some(chain) = self.chain {
            path.push(ChildNumber::new(chain, false)?);
            if let Some(index) = self.address_index {
                path.push(ChildNumber::new(index, false)?);
            }
        }
        Ok(path)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m/{}'/{}'/{}'", self.purpose, self.coin_type, self.account)?;
        if let Some(chain) = self.chain {
            write!(f, "/{}", chain)?;
            if let Some(index) = self.address_index {
                write!(f, "/{}", index)?;
            }
        }
        Ok(())
    }
}

/// Serialized extended key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub xpriv: Zeroizing<String>,
    pub xpub: String,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("xpriv", &"<redacted>")
            .field("xpub", &self.xpub)
            .finish()
    }
}

/// Account keys plus the chain-level cache stored alongside a derivation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountKeys {
    pub derivation_type: DerivationType,
    pub keys: KeyPair,
    pub cache: AddressCache,
}

impl AccountKeys {
    /// Persistable derivation record (without labels).
    pub fn to_derivation(&self) -> Derivation {
        Derivation::new(
            self.derivation_type,
            self.keys.xpriv.as_str(),
            self.keys.xpub.clone(),
            self.cache.clone(),
        )
    }
}

/// Stateless HD key deriver.
pub struct HdKeyDeriver;

impl HdKeyDeriver {
    /// Derive the key pair at `path` from a seed.
    pub fn derive(seed: &Seed, path: &KeyPath) -> Result<KeyPair, DerivationError> {
        Self::check_purpose(path.purpose)?;
        let master = MasterKey::from_seed(seed)?;
        Self::derive_from_master(&master, path)
    }

    /// Derive the key pair at `path` from an already computed master key.
    pub fn derive_from_master(master: &MasterKey, path: &KeyPath) -> Result<KeyPair, DerivationError> {
        let xprv = Self::derive_xprv(master, path)?;
        Ok(key_pair(&xprv))
    }

    /// Derive account keys and address cache for one derivation type.
    pub fn derive_account(
        master: &MasterKey,
        derivation_type: DerivationType,
        coin: Coin,
        account: u32,
    ) -> Result<AccountKeys, DerivationError> {
        let path = KeyPath::for_derivation(derivation_type, coin, account);
        let account_key = Self::derive_xprv(master, &path)?;
        Ok(AccountKeys {
            derivation_type,
            keys: key_pair(&account_key),
            cache: AddressCacheBuilder::build(&account_key)?,
        })
    }

    /// Derive the raw extended private key at `path`.
    pub fn derive_xprv(master: &MasterKey, path: &KeyPath) -> Result<XPrv, DerivationError> {
        Self::check_purpose(path.purpose)?;
        master.derive(&path.child_numbers()?)
    }

    fn check_purpose(purpose: u32) -> Result<(), DerivationError> {
        DerivationType::from_purpose(purpose)
            .map(|_| ())
            .map_err(|_| DerivationError::UnsupportedPurpose(purpose))
    }
}

fn key_pair(xprv: &XPrv) -> KeyPair {
    KeyPair {
        xpriv: xprv.to_string(Prefix::XPRV),
        xpub: xprv.public_key().to_string(Prefix::XPUB),
    }
}

/// Builds the receive/change chain xpubs cached with a derivation.
pub struct AddressCacheBuilder;

impl AddressCacheBuilder {
    /// Cache for an account-level extended private key.
    pub fn build(account_key: &XPrv) -> Result<AddressCache, DerivationError> {
        Self::build_from_public(&account_key.public_key())
    }

    /// Cache for a serialized account-level xpub. Chain keys are non-hardened,
    /// so the private key is not needed.
    pub fn build_from_xpub(account_xpub: &str) -> Result<AddressCache, DerivationError> {
        let xpub = XPub::from_str(account_xpub)
            .map_err(|e| DerivationError::InvalidKey(e.to_string()))?;
        Self::build_from_public(&xpub)
    }

    fn build_from_public(account: &XPub) -> Result<AddressCache, DerivationError> {
        let receive = account.derive_child(ChildNumber::new(RECEIVE_CHAIN, false)?)?;
        let change = account.derive_child(ChildNumber::new(CHANGE_CHAIN, false)?)?;
        Ok(AddressCache::new(
            receive.to_string(Prefix::XPUB),
            change.to_string(Prefix::XPUB),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ZERO_ENTROPY: &str = "00000000000000000000000000000000";

    const LEGACY_XPRV: &str = "xprv9xpXFhFpqdQK3TmytPBqXtGSwS3DLjojFhTGht8gwAAii8py5X6pxeBnQ6ehJiyJ6nDjWGJfZ95WxByFXVkDxHXrqu53WCRGypk2ttuqncb";
    const LEGACY_XPUB: &str = "xpub6BosfCnifzxcFwrSzQiqu2DBVTshkCXacvNsWGYJVVhhawA7d4R5WSWGFNbi8Aw6ZRc1brxMyWMzG3DSSSSoekkudhUd9yLb6qx39T9nMdj";
    const SEGWIT_XPRV: &str = "xprv9ybY78BftS5UGANki6oSifuQEjkpyAC8ZmBvBNTshQnCBcxnefjHS7buPMkkqhcRzmoGZ5bokx7GuyDAiktd5HemohAU4wV1ZPMDRmLpBMm";
    const SEGWIT_RECEIVE: &str = "xpub6FPnz8nd9KHwrramFPiKretTQ6o7o7JdjjjuVgm9ByvK69i9sfZsTgHSr59PqHcg5E4CmCDbpZ1azNws6XaVNs4Tc9cUwgKQqZmUBoK3xUt";
    const SEGWIT_CHANGE: &str = "xpub6FPnz8nd9KHwvCk4KcS6RAqe3odF4cyUV1L2KsnzqyCRUxa7AmWobiftMY1zp1A59UcoVuty6RN4KpnFhCC3yfr1Zr9g3zj5mwpgCdBX6DC";

    fn master() -> MasterKey {
        let seed = Seed::from_entropy_hex(ZERO_ENTROPY, "").unwrap();
        MasterKey::from_seed(&seed).unwrap()
    }

    #[test]
    fn test_bip44_account_vector() {
        let seed = Seed::from_entropy_hex(ZERO_ENTROPY, "").unwrap();
        let keys = HdKeyDeriver::derive(&seed, &KeyPath::account(44, 0, 0)).unwrap();
        assert_eq!(keys.xpriv.as_str(), LEGACY_XPRV);
        assert_eq!(keys.xpub, LEGACY_XPUB);
    }

    #[test]
    fn test_bip84_account_with_cache() {
        let account = HdKeyDeriver::derive_account(&master(), DerivationType::Segwit, Coin::Bitcoin, 0).unwrap();
        assert_eq!(account.keys.xpriv.as_str(), SEGWIT_XPRV);
        assert_eq!(account.cache.receive_account, SEGWIT_RECEIVE);
        assert_eq!(account.cache.change_account, SEGWIT_CHANGE);

        let record = account.to_derivation();
        assert_eq!(record.purpose, 84);
        assert!(record.has_keys());
    }

    #[test]
    fn test_cache_from_xpub_matches_private() {
        let account = HdKeyDeriver::derive_account(&master(), DerivationType::Legacy, Coin::Bitcoin, 0).unwrap();
        let from_public = AddressCacheBuilder::build_from_xpub(&account.keys.xpub).unwrap();
        assert_eq!(from_public, account.cache);
    }

    #[test]
    fn test_chain_level_path_matches_cache() {
        let path = KeyPath::account(84, 0, 0).with_chain(RECEIVE_CHAIN);
        let keys = HdKeyDeriver::derive_from_master(&master(), &path).unwrap();
        assert_eq!(keys.xpub, SEGWIT_RECEIVE);
    }

    #[test]
    fn test_unsupported_purpose() {
        let seed = Seed::from_entropy_hex(ZERO_ENTROPY, "").unwrap();
        let result = HdKeyDeriver::derive(&seed, &KeyPath::account(49, 0, 0));
        assert_eq!(result, Err(DerivationError::UnsupportedPurpose(49)));
    }

    #[test]
    fn test_path_display() {
        assert_eq!(KeyPath::account(84, 0, 3).to_string(), "m/84'/0'/3'");
        assert_eq!(
            KeyPath::account(44, 145, 0).with_address_index(7).to_string(),
            "m/44'/145'/0'/0/7"
        );
        assert_eq!(
            KeyPath::account(44, 0, 0).with_chain(CHANGE_CHAIN).with_address_index(2).to_string(),
            "m/44'/0'/0'/1/2"
        );
    }

    #[test]
    fn test_debug_hides_xpriv() {
        let keys = HdKeyDeriver::derive_from_master(&master(), &KeyPath::account(44, 0, 0)).unwrap();
        let debug = format!("{:?}", keys);
        assert!(!debug.contains("xprv"));
        assert!(debug.contains(LEGACY_XPUB));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_derivation_is_deterministic(
            entropy in proptest::collection::vec(any::<u8>(), 16),
            account in 0u32..20,
            chain in 0u32..2,
            index in 0u32..50,
            segwit in any::<bool>(),
        ) {
            let seed = Seed::from_entropy(&entropy, "").unwrap();
            let purpose = if segwit { 84 } else { 44 };
            let path = KeyPath::account(purpose, 0, account).with_chain(chain).with_address_index(index);
            let first = HdKeyDeriver::derive(&seed, &path).unwrap();
            let second = HdKeyDeriver::derive(&seed, &path).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
