//! Directory-backed metadata transport.
//!
//! Each entry is one file named after its node address.

use async_trait::async_trait;
use hdvault_core::{MetadataTransport, TransportError};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

pub struct DirectoryTransport {
    root: PathBuf,
}

impl DirectoryTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, address: &str) -> Result<PathBuf, TransportError> {
        if address.is_empty() || !address.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(TransportError::Storage(format!("invalid entry address: {:?}", address)));
        }
        Ok(self.root.join(format!("{}.entry", address)))
    }
}

#[async_trait]
impl MetadataTransport for DirectoryTransport {
    async fn fetch(&self, address: &str) -> Result<String, TransportError> {
        let path = self.entry_path(address)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(payload) => Ok(payload),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(TransportError::NotFound),
            Err(e) => Err(TransportError::Storage(e.to_string())),
        }
    }

    async fn put(&self, address: &str, payload: &str) -> Result<(), TransportError> {
        let path = self.entry_path(address)?;
        let staging = path.with_extension("tmp");
        let storage = |e: std::io::Error| TransportError::Storage(e.to_string());

        tokio::fs::create_dir_all(&self.root).await.map_err(storage)?;
        tokio::fs::write(&staging, payload).await.map_err(storage)?;
        tokio::fs::rename(&staging, &path).await.map_err(storage)?;
        debug!(path = %path.display(), "wrote metadata entry");
        Ok(())
    }
}
