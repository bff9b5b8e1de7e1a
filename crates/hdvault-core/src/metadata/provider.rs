//! Metadata node provider.
//!
//! The second-password node's entry records which metadata root the wallet uses. The
//! provider loads that record, checks it against the root derived from the seed and,
//! when the record is missing or points at a different root, writes a fresh one.
//!
//! ```text
//! Unloaded ──load──▶ Loaded
//!     │                ▲
//!     └──▶ NotYetCreated ──generate + put──┘
//! ```
//!
//! `reset` starts a new epoch. An `initialise` that began in an earlier epoch still
//! returns its result to its caller but never stores it.

use crate::error::{MetadataInitialisationError, MetadataStoreError};
use crate::metadata::store::EncryptedMetadataStore;
use hdvault_crypto::{Credentials, MasterKey, RemoteMetadataNodes, SecondPasswordNode};
use hdvault_types::RemoteMetadataNodesResponse;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// Validated nodes of a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataState {
    pub metadata_nodes: RemoteMetadataNodes,
    pub second_password_node: SecondPasswordNode,
}

/// Result of loading the remote record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeStatus {
    Loaded(RemoteMetadataNodes),
    NotYetCreated,
}

/// Phase of the provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderState {
    Unloaded,
    NotYetCreated,
    Loaded(MetadataState),
}

struct Phase {
    epoch: u64,
    state: ProviderState,
}

pub struct MetadataNodeProvider {
    store: EncryptedMetadataStore,
    phase: Mutex<Phase>,
    init_lock: tokio::sync::Mutex<()>,
}

impl MetadataNodeProvider {
    pub fn new(store: EncryptedMetadataStore) -> Self {
        Self {
            store,
            phase: Mutex::new(Phase {
                epoch: 0,
                state: ProviderState::Unloaded,
            }),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn store(&self) -> &EncryptedMetadataStore {
        &self.store
    }

    pub fn state(&self) -> ProviderState {
        self.phase.lock().state.clone()
    }

    /// Validated nodes, once loaded.
    pub fn loaded(&self) -> Option<MetadataState> {
        match &self.phase.lock().state {
            ProviderState::Loaded(state) => Some(state.clone()),
            _ => None,
        }
    }

    /// Forget the loaded nodes (session change).
    pub fn reset(&self) {
        let mut phase = self.phase.lock();
        phase.epoch += 1;
        phase.state = ProviderState::Unloaded;
        debug!(epoch = phase.epoch, "metadata provider reset");
    }

    /// Store `state` unless the provider was reset since `epoch`.
    fn transition(&self, epoch: u64, state: ProviderState) -> bool {
        let mut phase = self.phase.lock();
        if phase.epoch != epoch {
            return false;
        }
        phase.state = state;
        true
    }

    /// Load the metadata nodes, creating the remote record if needed.
    pub async fn initialise(
        &self,
        credentials: &Credentials,
        master: &MasterKey,
    ) -> Result<MetadataState, MetadataInitialisationError> {
        let _init = self.init_lock.lock().await;
        let epoch = self.phase.lock().epoch;

        let second_password_node = SecondPasswordNode::derive(credentials)
            .map_err(MetadataInitialisationError::FailedToDeriveSecondPasswordNode)?;

        if let Some(state) = self.loaded() {
            let expected = RemoteMetadataNodes::derive(master)
                .map_err(MetadataInitialisationError::FailedToDeriveRemoteMetadataNode)?;
            if state.second_password_node == second_password_node
                && state.metadata_nodes == expected
            {
                return Ok(state);
            }
            debug!("loaded metadata nodes belong to other credentials, reloading");
            self.transition(epoch, ProviderState::Unloaded);
        }

        let metadata_nodes = match self.load_nodes(&second_password_node, master).await? {
            NodeStatus::Loaded(nodes) => nodes,
            NodeStatus::NotYetCreated => {
                self.transition(epoch, ProviderState::NotYetCreated);
                self.generate_nodes(&second_password_node, master).await?
            }
        };

        let state = MetadataState {
            metadata_nodes,
            second_password_node,
        };
        if self.transition(epoch, ProviderState::Loaded(state.clone())) {
            info!("metadata nodes loaded");
        } else {
            warn!("metadata provider was reset during initialisation, result not kept");
        }
        Ok(state)
    }

    /// Load and validate the record stored at the second-password node.
    pub async fn load_nodes(
        &self,
        second_password_node: &SecondPasswordNode,
        master: &MasterKey,
    ) -> Result<NodeStatus, MetadataInitialisationError> {
        let response: RemoteMetadataNodesResponse =
            match self.store.read_json(&second_password_node.metadata_node).await {
                Ok(response) => response,
                Err(MetadataStoreError::NotYetCreated) => {
                    debug!("no remote metadata record");
                    return Ok(NodeStatus::NotYetCreated);
                }
                Err(MetadataStoreError::Transport(e)) => {
                    return Err(MetadataInitialisationError::FailedToLoadRemoteMetadataNode(
                        e.into(),
                    ));
                }
                Err(e) => {
                    return Err(MetadataInitialisationError::FailedToDecodeRemoteMetadataNode(
                        e.to_string(),
                    ));
                }
            };

        let expected = RemoteMetadataNodes::derive(master)
            .map_err(MetadataInitialisationError::FailedToDeriveRemoteMetadataNode)?;
        if response.metadata.as_deref() != Some(expected.metadata_node.xpriv().as_str()) {
            warn!("remote metadata root does not match the seed, regenerating");
            return Ok(NodeStatus::NotYetCreated);
        }

        RemoteMetadataNodes::from_response(&response)
            .map(NodeStatus::Loaded)
            .map_err(MetadataInitialisationError::FailedToDeriveRemoteMetadataNode)
    }

    /// Derive fresh nodes from the seed and store their record.
    pub async fn generate_nodes(
        &self,
        second_password_node: &SecondPasswordNode,
        master: &MasterKey,
    ) -> Result<RemoteMetadataNodes, MetadataInitialisationError> {
        let nodes = RemoteMetadataNodes::derive(master)
            .map_err(|e| MetadataInitialisationError::FailedToGenerateNodes(e.into()))?;
        self.store
            .write_json(&second_password_node.metadata_node, &nodes.to_response())
            .await
            .map_err(MetadataInitialisationError::FailedToGenerateNodes)?;
        info!(
            address = %second_password_node.metadata_node.address(),
            "stored new metadata root record"
        );
        Ok(nodes)
    }
}
