//! Hdvault Types - Persisted wallet document and metadata payload types.
//!
//! This crate provides the data model shared by the rest of the workspace:
//! - The wallet document (`Wrapper` → `NativeWallet` → `HdWallet` → `Account` → `Derivation`)
//! - Derivation types and their BIP43 purposes
//! - Remote metadata responses and typed metadata entry payloads
//!
//! Field names follow the persisted JSON format and must not be renamed.

pub mod account;
pub mod derivation;
pub mod wallet;
pub mod metadata;
pub mod error;

pub use account::{Account, DEFAULT_ACCOUNT_LABEL};
pub use derivation::{AddressCache, AddressLabel, Derivation, DerivationType};
pub use wallet::{HdWallet, NativeWallet, Wrapper};
pub use metadata::{
    Erc20, Ethereum, EthereumAccount, EntryType, EthereumEntryPayload, MetadataNodeEntry,
    RemoteMetadataNodesResponse,
};
pub use error::TypesError;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Account, AddressCache, AddressLabel, Derivation, DerivationType,
        HdWallet, NativeWallet, Wrapper,
        EntryType, MetadataNodeEntry, RemoteMetadataNodesResponse,
        TypesError,
    };
}
