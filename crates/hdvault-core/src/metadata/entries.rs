//! Typed metadata entries.

use crate::error::MetadataEntryError;
use crate::metadata::provider::{MetadataNodeProvider, MetadataState};
use hdvault_crypto::MetadataNode;
use hdvault_types::MetadataNodeEntry;
use tracing::debug;

impl MetadataState {
    /// Node holding entries of type `P`.
    pub fn entry_node<P: MetadataNodeEntry>(&self) -> Result<MetadataNode, MetadataEntryError> {
        Ok(self.metadata_nodes.entry_node(P::ENTRY_TYPE)?)
    }
}

impl MetadataNodeProvider {
    /// Fetch and decode the entry of type `P`.
    pub async fn fetch_entry<P: MetadataNodeEntry>(&self) -> Result<P, MetadataEntryError> {
        let node = self.loaded_state()?.entry_node::<P>()?;
        let entry = self.store().read_json(&node).await?;
        debug!(entry_type = ?P::ENTRY_TYPE, "fetched metadata entry");
        Ok(entry)
    }

    /// Encode and store `payload` as the entry of type `P`.
    pub async fn save_entry<P: MetadataNodeEntry>(&self, payload: &P) -> Result<(), MetadataEntryError> {
        let node = self.loaded_state()?.entry_node::<P>()?;
        self.store().write_json(&node, payload).await?;
        debug!(entry_type = ?P::ENTRY_TYPE, "saved metadata entry");
        Ok(())
    }

    fn loaded_state(&self) -> Result<MetadataState, MetadataEntryError> {
        self.loaded().ok_or(MetadataEntryError::NotLoaded)
    }
}
