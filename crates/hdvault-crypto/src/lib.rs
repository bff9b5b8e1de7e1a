//! Hdvault Crypto - Key material for the hdvault wallet core.
//!
//! This crate provides:
//! - BIP39 seeds and the BIP32 master key (zeroized on drop)
//! - Deterministic BIP44/BIP84 account derivation and address caches
//! - P2PKH / P2WPKH receive address encoding
//! - The metadata node tree (second-password node and metadata root)
//! - The cipher contracts used for remote metadata and double encryption

pub mod seed;
pub mod hd;
pub mod address;
pub mod metadata_node;
pub mod cipher;
pub mod error;

pub use seed::{MasterKey, Seed};
pub use hd::{AccountKeys, AddressCacheBuilder, Coin, HdKeyDeriver, KeyPair, KeyPath};
pub use address::{derive_receive_addresses, encode_address, hash160};
pub use metadata_node::{
    Credentials, MetadataNode, RemoteMetadataNodes, SecondPasswordNode, METADATA_PURPOSE,
};
pub use cipher::{AesGcmCipher, EncryptionContext, MetadataCipher, SecondPasswordEncryption};
pub use error::{CipherError, DerivationError};
