//! Remote encrypted metadata.

pub mod entries;
pub mod provider;
pub mod store;

pub use provider::{MetadataNodeProvider, MetadataState, NodeStatus, ProviderState};
pub use store::{EncryptedMetadataStore, MetadataTransport};
