//! Persisted wallet document.
//!
//! `Wrapper` is the decrypted envelope; `NativeWallet` is the wallet payload it carries.
//! Fields this crate does not interpret (`options`, legacy `keys`, `address_book`) are kept
//! as raw JSON so a rewrite never drops them.

use crate::account::Account;
use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Envelope around the wallet payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Wrapper {
    #[serde(rename = "pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,
    pub version: u32,
    #[serde(rename = "payload_checksum", default)]
    pub payload_checksum: String,
    #[serde(default)]
    pub language: String,
    #[serde(rename = "sync_pubkeys", default)]
    pub sync_pubkeys: bool,
    pub wallet: NativeWallet,
}

/// Wallet payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NativeWallet {
    pub guid: String,
    #[serde(rename = "sharedKey")]
    pub shared_key: String,
    #[serde(rename = "double_encryption", default)]
    pub double_encrypted: bool,
    #[serde(rename = "dpasswordhash", default, skip_serializing_if = "Option::is_none")]
    pub double_password_hash: Option<String>,
    #[serde(rename = "metadataHDNode", default, skip_serializing_if = "Option::is_none")]
    pub metadata_hd_node: Option<String>,
    #[serde(default)]
    pub options: Value,
    #[serde(rename = "hd_wallets", default)]
    pub hd_wallets: Vec<HdWallet>,
    #[serde(rename = "keys", default)]
    pub addresses: Vec<Value>,
    #[serde(rename = "tx_notes", default)]
    pub tx_notes: BTreeMap<String, String>,
    #[serde(rename = "address_book", default, skip_serializing_if = "Option::is_none")]
    pub address_book: Option<Value>,
}

/// One HD wallet: a seed and the accounts derived from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdWallet {
    #[serde(rename = "seed_hex")]
    pub seed_hex: String,
    #[serde(default)]
    pub passphrase: String,
    #[serde(rename = "mnemonic_verified", default)]
    pub mnemonic_verified: bool,
    #[serde(rename = "default_account_idx", default)]
    pub default_account_index: u32,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl HdWallet {
    /// Reassign account indices from their position.
    pub fn reindex_accounts(&mut self) {
        for (position, account) in self.accounts.iter_mut().enumerate() {
            account.index = position as u32;
        }
    }

    /// The account `default_account_idx` points at.
    pub fn default_account(&self) -> Option<&Account> {
        self.accounts.get(self.default_account_index as usize)
    }
}

impl NativeWallet {
    /// The first HD wallet; the only one the apps ever create.
    pub fn default_hd_wallet(&self) -> Option<&HdWallet> {
        self.hd_wallets.first()
    }

    pub fn default_hd_wallet_mut(&mut self) -> Option<&mut HdWallet> {
        self.hd_wallets.first_mut()
    }
}

impl Wrapper {
    /// Decode a document and assign positional account indices.
    pub fn from_json(json: &str) -> Result<Self, TypesError> {
        let mut wrapper: Wrapper = serde_json::from_str(json)?;
        for hd_wallet in &mut wrapper.wallet.hd_wallets {
            hd_wallet.reindex_accounts();
        }
        Ok(wrapper)
    }

    /// Encode as compact JSON.
    pub fn to_json(&self) -> Result<String, TypesError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Encode as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, TypesError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Accounts of the default HD wallet.
    pub fn accounts(&self) -> Result<&[Account], TypesError> {
        self.wallet
            .default_hd_wallet()
            .map(|hd| hd.accounts.as_slice())
            .ok_or(TypesError::MissingHdWallet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivation::DerivationType;

    const V4: &str = r#"{
        "pbkdf2_iterations": 5000,
        "version": 4,
        "payload_checksum": "checksum",
        "language": "en",
        "sync_pubkeys": false,
        "wallet": {
            "guid": "50dae286-e42e-4d67-8419-d5dcc563746c",
            "sharedKey": "8a260b2b-5257-4357-ac56-7a7efca323ea",
            "double_encryption": false,
            "options": {"pbkdf2_iterations": 5000, "html5_notifications": false},
            "hd_wallets": [{
                "seed_hex": "6a4d9524d413fdf69ca1b5664d1d6db0",
                "passphrase": "",
                "mnemonic_verified": false,
                "default_account_idx": 0,
                "accounts": [{
                    "label": "Private Key Wallet",
                    "archived": false,
                    "default_derivation": "bech32",
                    "derivations": [{
                        "type": "legacy",
                        "purpose": 44,
                        "xpriv": "xprv9yL1ousLjQQzGNBAYykaT8J3U626NV6zbLYkRv8rvUDpY4f1RnrvAXQneGXC9UNuNvGXX4j6oHBK5KiV2hKevRxY5ntis212oxjEL11ysuG",
                        "xpub": "xpub6CKNDRQEZmyHUrFdf1HapGEn27ramwpqxZUMEJYUUokoQrz9yLBAiKjGVWDuiCT39udj1r3whqQN89Tar5KrojH8oqSy7ytzJKW8gwmhwD3",
                        "address_labels": [{"index": 0, "label": "labeled_address"}],
                        "cache": {
                            "receiveAccount": "xpub6F41z8MqNcJMvKQgAd5QE2QYo32cocYigWp1D8726ykMmaMqvtqLkvuL1NqGuUJvU3aWyJaV2J4V6sD7Pv59J3tYGZdYRSx8gU7EG8ZuPSY",
                            "changeAccount": "xpub6F41z8MqNcJMwmeUExdCv7UXvYBEgQB29SWq9jyxuZ7WefmSTWcwXB6NRAJkGCkB3L1Eu4ttzWnPVKZ6REissrQ4i6p8gTi9j5YwDLxmZ8p"
                        }
                    }]
                }, {
                    "label": "Second",
                    "derivations": []
                }]
            }],
            "keys": [],
            "tx_notes": {"abc": "rent"}
        }
    }"#;

    #[test]
    fn test_decode_v4_document() {
        let wrapper = Wrapper::from_json(V4).unwrap();
        assert_eq!(wrapper.wallet.guid, "50dae286-e42e-4d67-8419-d5dcc563746c");
        assert_eq!(wrapper.wallet.shared_key, "8a260b2b-5257-4357-ac56-7a7efca323ea");

        let hd = wrapper.wallet.default_hd_wallet().unwrap();
        assert_eq!(hd.seed_hex, "6a4d9524d413fdf69ca1b5664d1d6db0");
        assert_eq!(hd.accounts.len(), 2);
        assert_eq!(hd.accounts[1].index, 1);

        let account = hd.default_account().unwrap();
        assert_eq!(account.default_derivation, DerivationType::Segwit);
        let legacy = account.derivation(DerivationType::Legacy).unwrap();
        assert_eq!(legacy.label_for(0), Some("labeled_address"));
        assert!(account.derivation(DerivationType::Segwit).is_none());
    }

    #[test]
    fn test_reencode_is_stable() {
        let wrapper = Wrapper::from_json(V4).unwrap();
        let first = wrapper.to_json().unwrap();
        let second = Wrapper::from_json(&first).unwrap().to_json().unwrap();
        assert_eq!(first, second);
        assert!(first.contains("\"html5_notifications\":false"));
    }

    #[test]
    fn test_missing_hd_wallet() {
        let mut wrapper = Wrapper::from_json(V4).unwrap();
        wrapper.wallet.hd_wallets.clear();
        assert_eq!(wrapper.accounts(), Err(TypesError::MissingHdWallet));
    }
}
