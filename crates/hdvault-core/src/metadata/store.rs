//! Encrypted metadata storage.

use crate::error::{MetadataStoreError, TransportError};
use async_trait::async_trait;
use hdvault_crypto::{MetadataCipher, MetadataNode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Moves metadata ciphertext to and from the remote store.
#[async_trait]
pub trait MetadataTransport: Send + Sync {
    /// Ciphertext stored at `address`; `TransportError::NotFound` when there is none.
    async fn fetch(&self, address: &str) -> Result<String, TransportError>;

    async fn put(&self, address: &str, payload: &str) -> Result<(), TransportError>;
}

/// Transport plus cipher. Entries are addressed by their node's address and encrypted
/// with the node's key.
#[derive(Clone)]
pub struct EncryptedMetadataStore {
    transport: Arc<dyn MetadataTransport>,
    cipher: Arc<dyn MetadataCipher>,
}

impl EncryptedMetadataStore {
    pub fn new(transport: Arc<dyn MetadataTransport>, cipher: Arc<dyn MetadataCipher>) -> Self {
        Self { transport, cipher }
    }

    /// Raw ciphertext at `address`.
    pub async fn get(&self, address: &str) -> Result<String, MetadataStoreError> {
        let ciphertext = self.transport.fetch(address).await?;
        debug!(address, "fetched metadata entry");
        Ok(ciphertext)
    }

    /// Store raw ciphertext at `address`.
    pub async fn put(&self, address: &str, payload: &str) -> Result<(), MetadataStoreError> {
        self.transport.put(address, payload).await?;
        debug!(address, "stored metadata entry");
        Ok(())
    }

    /// Fetch and decrypt the entry of `node`.
    pub async fn read(&self, node: &MetadataNode) -> Result<String, MetadataStoreError> {
        let ciphertext = self.get(&node.address()).await?;
        let key = node.encryption_key()?;
        Ok(self.cipher.decrypt(&key, &ciphertext)?)
    }

    /// Encrypt and store `plaintext` as the entry of `node`.
    pub async fn write(&self, node: &MetadataNode, plaintext: &str) -> Result<(), MetadataStoreError> {
        let key = node.encryption_key()?;
        let ciphertext = self.cipher.encrypt(&key, plaintext)?;
        self.put(&node.address(), &ciphertext).await
    }

    pub async fn read_json<T: DeserializeOwned>(&self, node: &MetadataNode) -> Result<T, MetadataStoreError> {
        let plaintext = self.read(node).await?;
        Ok(serde_json::from_str(&plaintext)?)
    }

    pub async fn write_json<T: Serialize + Sync>(
        &self,
        node: &MetadataNode,
        value: &T,
    ) -> Result<(), MetadataStoreError> {
        let plaintext = serde_json::to_string(value)?;
        self.write(node, &plaintext).await
    }
}
