use hdvault_crypto::{CipherError, DerivationError};
use thiserror::Error;

/// Errors raised while repairing a wallet document.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReplenishError {
    #[error("Derivation failed: {0}")]
    Derivation(#[from] DerivationError),

    #[error("Encryption failed: {0}")]
    Encryption(#[from] CipherError),
}

/// Errors reported by a chain address client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

/// Underlying cause of a lookahead failure.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AddressSourceError {
    #[error("chain client: {0}")]
    Client(#[from] ChainClientError),

    #[error("derivation: {0}")]
    Derivation(#[from] DerivationError),
}

/// Errors raised by the address lookahead scanner.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncAddressError {
    #[error("Failure providing addresses: {0}")]
    FailureProvidingAddresses(#[source] AddressSourceError),
}

impl From<ChainClientError> for SyncAddressError {
    fn from(e: ChainClientError) -> Self {
        SyncAddressError::FailureProvidingAddresses(e.into())
    }
}

impl From<DerivationError> for SyncAddressError {
    fn from(e: DerivationError) -> Self {
        SyncAddressError::FailureProvidingAddresses(e.into())
    }
}

/// Errors reported by a metadata transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Entry not found")]
    NotFound,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Errors raised by the encrypted metadata store.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetadataStoreError {
    /// Nothing stored at the node's address yet.
    #[error("Metadata entry not yet created")]
    NotYetCreated,

    #[error("Transport error: {0}")]
    Transport(TransportError),

    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("Key error: {0}")]
    Key(#[from] DerivationError),

    #[error("Invalid payload: {0}")]
    Payload(String),
}

impl From<TransportError> for MetadataStoreError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::NotFound => MetadataStoreError::NotYetCreated,
            other => MetadataStoreError::Transport(other),
        }
    }
}

impl From<serde_json::Error> for MetadataStoreError {
    fn from(e: serde_json::Error) -> Self {
        MetadataStoreError::Payload(e.to_string())
    }
}

/// Failure loading the remote metadata root record.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoadRemoteMetadataError {
    #[error("remote metadata not yet created")]
    NotYetCreated,

    #[error("{0}")]
    Other(TransportError),
}

impl From<TransportError> for LoadRemoteMetadataError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::NotFound => LoadRemoteMetadataError::NotYetCreated,
            other => LoadRemoteMetadataError::Other(other),
        }
    }
}

/// Errors raised while initialising the metadata node tree.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetadataInitialisationError {
    #[error("Failed to derive second password node: {0}")]
    FailedToDeriveSecondPasswordNode(DerivationError),

    #[error("Failed to load remote metadata node: {0}")]
    FailedToLoadRemoteMetadataNode(LoadRemoteMetadataError),

    #[error("Failed to decode remote metadata node: {0}")]
    FailedToDecodeRemoteMetadataNode(String),

    #[error("Failed to generate nodes: {0}")]
    FailedToGenerateNodes(MetadataStoreError),

    #[error("Failed to derive remote metadata node: {0}")]
    FailedToDeriveRemoteMetadataNode(DerivationError),
}

/// Errors raised by typed metadata entry access.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetadataEntryError {
    #[error("Metadata nodes are not loaded")]
    NotLoaded,

    #[error("Failed to derive entry node: {0}")]
    Derivation(#[from] DerivationError),

    #[error(transparent)]
    Store(#[from] MetadataStoreError),
}

/// Work abandoned because its session ended.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session cancelled")]
    Cancelled,
}
