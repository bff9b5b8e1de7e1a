//! Remote metadata payloads.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body stored at the second-password node: the metadata root node the wallet uses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMetadataNodesResponse {
    /// Serialized xpriv of the metadata root node
    #[serde(default)]
    pub metadata: Option<String>,
}

impl RemoteMetadataNodesResponse {
    pub fn new(metadata_xpriv: impl Into<String>) -> Self {
        Self { metadata: Some(metadata_xpriv.into()) }
    }
}

/// Identifier of a metadata entry; the hardened child index of the entry node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryType {
    WhatsNew,
    BuySell,
    Contacts,
    Ethereum,
    Shapeshift,
    BitcoinCash,
    Bitcoin,
    WalletCredentials,
    UserCredentials,
    Stellar,
}

impl EntryType {
    pub const fn id(self) -> u32 {
        match self {
            EntryType::WhatsNew => 2,
            EntryType::BuySell => 3,
            EntryType::Contacts => 4,
            EntryType::Ethereum => 5,
            EntryType::Shapeshift => 6,
            EntryType::BitcoinCash => 7,
            EntryType::Bitcoin => 8,
            EntryType::WalletCredentials => 9,
            EntryType::UserCredentials => 10,
            EntryType::Stellar => 11,
        }
    }
}

/// A payload stored as its own metadata entry.
pub trait MetadataNodeEntry: Serialize + DeserializeOwned + Send + Sync {
    const ENTRY_TYPE: EntryType;
}

/// Ethereum entry: accounts, ERC20 token settings and transaction notes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthereumEntryPayload {
    #[serde(default)]
    pub ethereum: Option<Ethereum>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ethereum {
    pub accounts: Vec<EthereumAccount>,
    #[serde(rename = "default_account_idx", default)]
    pub default_account_index: u32,
    #[serde(default)]
    pub erc20: Option<BTreeMap<String, Erc20>>,
    #[serde(rename = "has_seen")]
    pub has_seen: bool,
    #[serde(rename = "last_tx_timestamp", default)]
    pub last_tx_timestamp: Option<i64>,
    #[serde(rename = "tx_notes", default)]
    pub transaction_notes: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthereumAccount {
    #[serde(rename = "addr")]
    pub address: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default = "default_true")]
    pub correct: bool,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Erc20 {
    pub contract: String,
    #[serde(rename = "has_seen", default)]
    pub has_seen: bool,
    pub label: String,
    #[serde(rename = "tx_notes", default)]
    pub tx_notes: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl MetadataNodeEntry for EthereumEntryPayload {
    const ENTRY_TYPE: EntryType = EntryType::Ethereum;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ethereum_entry_defaults() {
        let json = r#"{
            "ethereum": {
                "accounts": [{"addr": "0xabc", "label": "My Ether Wallet"}],
                "has_seen": true
            }
        }"#;
        let entry: EthereumEntryPayload = serde_json::from_str(json).unwrap();
        let eth = entry.ethereum.unwrap();
        assert_eq!(eth.default_account_index, 0);
        assert!(eth.erc20.is_none());
        assert!(eth.transaction_notes.is_empty());
        assert!(eth.accounts[0].correct);
        assert!(!eth.accounts[0].archived);
        assert_eq!(eth.accounts[0].address, "0xabc");
    }

    #[test]
    fn test_ethereum_entry_with_erc20() {
        let json = r#"{
            "ethereum": {
                "accounts": [{"addr": "0xabc", "label": "a", "correct": false}],
                "default_account_idx": 0,
                "erc20": {"pax": {"contract": "0x8e87", "has_seen": false, "label": "USD Pax", "tx_notes": {}}},
                "has_seen": false,
                "last_tx_timestamp": 1600000000,
                "tx_notes": {"0x01": "coffee"}
            }
        }"#;
        let entry: EthereumEntryPayload = serde_json::from_str(json).unwrap();
        let eth = entry.ethereum.as_ref().unwrap();
        assert_eq!(eth.erc20.as_ref().unwrap()["pax"].label, "USD Pax");
        assert_eq!(eth.transaction_notes["0x01"], "coffee");
        assert!(!eth.accounts[0].correct);
        assert_eq!(EthereumEntryPayload::ENTRY_TYPE.id(), 5);
    }

    #[test]
    fn test_remote_nodes_response() {
        let response: RemoteMetadataNodesResponse =
            serde_json::from_str(r#"{"metadata":"xprv123","mdid":"ignored"}"#).unwrap();
        assert_eq!(response.metadata.as_deref(), Some("xprv123"));

        let empty: RemoteMetadataNodesResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.metadata.is_none());
    }
}
