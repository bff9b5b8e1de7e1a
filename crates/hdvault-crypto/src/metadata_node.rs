//! Metadata node tree.
//!
//! Two independent trees address the remote metadata:
//! - the second-password node, seeded from the wallet credentials, locates the entry that
//!   records which metadata root the wallet uses;
//! - the metadata root, `m/510742'` below the wallet's master key, whose hardened children
//!   hold the per-type entries.
//!
//! Every node exposes an address (where its entry lives) and a symmetric key (how the entry
//! is encrypted). Neither depends on the spending key tree.

use crate::address::p2pkh_address;
use crate::error::DerivationError;
use crate::seed::MasterKey;
use bip32::{ChildNumber, Prefix, XPrv};
use hdvault_types::{EntryType, RemoteMetadataNodesResponse};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Hardened purpose of the metadata root below the master key.
pub const METADATA_PURPOSE: u32 = 510742;

/// Wallet credentials the second-password node is derived from.
#[derive(Clone)]
pub struct Credentials {
    pub guid: String,
    pub shared_key: String,
    pub second_password: Option<Zeroizing<String>>,
}

impl Credentials {
    pub fn new(guid: impl Into<String>, shared_key: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            shared_key: shared_key.into(),
            second_password: None,
        }
    }

    pub fn with_second_password(mut self, password: impl Into<String>) -> Self {
        self.second_password = Some(Zeroizing::new(password.into()));
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("guid", &self.guid)
            .field("second_password", &self.second_password.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

/// A node of the metadata tree.
#[derive(Clone)]
pub struct MetadataNode {
    xprv: XPrv,
}

impl MetadataNode {
    fn new(xprv: XPrv) -> Self {
        Self { xprv }
    }

    /// Parse a node from its serialized xpriv.
    pub fn from_xpriv(xpriv: &str) -> Result<Self, DerivationError> {
        XPrv::from_str(xpriv)
            .map(Self::new)
            .map_err(|e| DerivationError::InvalidKey(e.to_string()))
    }

    /// Serialized xpriv (CAUTION: sensitive)
    pub fn xpriv(&self) -> Zeroizing<String> {
        self.xprv.to_string(Prefix::XPRV)
    }

    /// Address the node's entry is stored under.
    pub fn address(&self) -> String {
        p2pkh_address(&self.xprv.public_key().to_bytes())
    }

    /// Symmetric key for the node's entry: SHA256 of the private key of child `0'`.
    pub fn encryption_key(&self) -> Result<Zeroizing<[u8; 32]>, DerivationError> {
        let child = self.xprv.derive_child(ChildNumber::new(0, true)?)?;
        let secret = Zeroizing::new(child.to_bytes());
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&Sha256::digest(secret.as_slice()));
        Ok(key)
    }

    /// Hardened child node.
    pub fn child(&self, index: u32) -> Result<MetadataNode, DerivationError> {
        Ok(Self::new(self.xprv.derive_child(ChildNumber::new(index, true)?)?))
    }
}

impl PartialEq for MetadataNode {
    fn eq(&self, other: &Self) -> bool {
        self.xpriv() == other.xpriv()
    }
}

impl Eq for MetadataNode {}

impl fmt::Debug for MetadataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MetadataNode({})", self.address())
    }
}

/// Node derived from the wallet credentials; locates the remote metadata root record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecondPasswordNode {
    pub metadata_node: MetadataNode,
}

impl SecondPasswordNode {
    /// Seed a node with SHA256(guid ‖ shared_key ‖ second_password).
    pub fn derive(credentials: &Credentials) -> Result<Self, DerivationError> {
        if credentials.guid.is_empty() {
            return Err(DerivationError::MissingCredentials("guid"));
        }
        if credentials.shared_key.is_empty() {
            return Err(DerivationError::MissingCredentials("shared key"));
        }

        let mut hasher = Sha256::new();
        hasher.update(credentials.guid.as_bytes());
        hasher.update(credentials.shared_key.as_bytes());
        if let Some(password) = &credentials.second_password {
            hasher.update(password.as_bytes());
        }
        let entropy = Zeroizing::new(hasher.finalize().to_vec());

        let xprv = XPrv::new(entropy.as_slice())?;
        Ok(Self {
            metadata_node: MetadataNode::new(xprv),
        })
    }
}

/// The wallet's metadata root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteMetadataNodes {
    pub metadata_node: MetadataNode,
}

impl RemoteMetadataNodes {
    /// Derive the metadata root `m/510742'` from the master key.
    pub fn derive(master: &MasterKey) -> Result<Self, DerivationError> {
        let xprv = master.derive(&[ChildNumber::new(METADATA_PURPOSE, true)?])?;
        Ok(Self {
            metadata_node: MetadataNode::new(xprv),
        })
    }

    /// Rebuild the nodes from a decoded remote response.
    pub fn from_response(response: &RemoteMetadataNodesResponse) -> Result<Self, DerivationError> {
        let xpriv = response
            .metadata
            .as_deref()
            .ok_or_else(|| DerivationError::InvalidKey("response has no metadata node".into()))?;
        Ok(Self {
            metadata_node: MetadataNode::from_xpriv(xpriv)?,
        })
    }

    /// Response body persisted at the second-password node.
    pub fn to_response(&self) -> RemoteMetadataNodesResponse {
        RemoteMetadataNodesResponse::new(self.metadata_node.xpriv().as_str())
    }

    /// Node holding the entry of the given type.
    pub fn entry_node(&self, entry_type: EntryType) -> Result<MetadataNode, DerivationError> {
        self.metadata_node.child(entry_type.id())
    }
}
