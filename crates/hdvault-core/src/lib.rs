//! Hdvault Core - Wallet maintenance services.
//!
//! This crate provides:
//! - Account derivation repair for persisted wallet documents
//! - Receive address lookahead against a chain backend
//! - The metadata node provider and encrypted metadata store
//! - A keyed single-flight cache and the session it is scoped to

pub mod cache;
pub mod error;
pub mod lookahead;
pub mod metadata;
pub mod replenish;
pub mod session;

pub use cache::{CacheConfiguration, CachedValue, Clock, EntryState, RefreshControl, TokioClock};
pub use error::{
    AddressSourceError, ChainClientError, LoadRemoteMetadataError, MetadataEntryError,
    MetadataInitialisationError, MetadataStoreError, ReplenishError, SessionError,
    SyncAddressError, TransportError,
};
pub use lookahead::{
    AddressLookaheadScanner, AddressWindow, ChainAddressClient, MultiAddressItem,
    DEFAULT_GAP_LIMIT,
};
pub use metadata::{
    EncryptedMetadataStore, MetadataNodeProvider, MetadataState, MetadataTransport, NodeStatus,
    ProviderState,
};
pub use replenish::{
    check_address_cache_legitimacy, check_address_labels, needs_replenishment,
    replenish_in_session, AccountDerivationRepository, DuplicateAddressLabel, IllegitimateCache,
    ReplenishOutcome, ReplenishReport,
};
pub use session::{Session, SessionEvent};
