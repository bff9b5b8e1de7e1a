//! Receive address lookahead.
//!
//! For each account the chain reports how far its default derivation has been used; the
//! scanner derives the next `gap_limit` receive addresses from that point so incoming
//! payments to any of them are noticed.

use crate::error::{ChainClientError, SyncAddressError};
use async_trait::async_trait;
use futures::future::try_join_all;
use hdvault_crypto::{
    derive_receive_addresses, AccountKeys, Coin, DerivationError, HdKeyDeriver, MasterKey,
};
use hdvault_types::{Account, DerivationType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Addresses derived past the last used receive index.
pub const DEFAULT_GAP_LIMIT: u32 = 10;

/// Separator of the address list sent to the subscription endpoint.
const ADDRESS_SEPARATOR: &str = "|";

/// One xpub entry of a multi-address response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiAddressItem {
    #[serde(rename = "address")]
    pub xpub: String,
    /// Next unused receive index on the xpub's chain
    pub account_index: u32,
}

/// Chain backend answering multi-address queries.
#[async_trait]
pub trait ChainAddressClient: Send + Sync {
    async fn fetch_multi_address(
        &self,
        xpubs: &[String],
    ) -> Result<Vec<MultiAddressItem>, ChainClientError>;
}

/// Candidate receive addresses of one account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressWindow {
    pub account_index: u32,
    pub derivation_type: DerivationType,
    pub receive_index: u32,
    pub addresses: Vec<String>,
}

pub struct AddressLookaheadScanner {
    client: Arc<dyn ChainAddressClient>,
    gap_limit: u32,
    coin: Coin,
}

impl AddressLookaheadScanner {
    pub fn new(client: Arc<dyn ChainAddressClient>) -> Self {
        Self {
            client,
            gap_limit: DEFAULT_GAP_LIMIT,
            coin: Coin::Bitcoin,
        }
    }

    pub fn with_gap_limit(mut self, gap_limit: u32) -> Self {
        self.gap_limit = gap_limit;
        self
    }

    pub fn with_coin(mut self, coin: Coin) -> Self {
        self.coin = coin;
        self
    }

    /// Windows for every account, scanned concurrently.
    pub async fn scan(
        &self,
        master: &MasterKey,
        accounts: &[Account],
    ) -> Result<Vec<AddressWindow>, SyncAddressError> {
        try_join_all(accounts.iter().map(|account| self.scan_account(master, account))).await
    }

    /// Window for one account, from a single multi-address response.
    pub async fn scan_account(
        &self,
        master: &MasterKey,
        account: &Account,
    ) -> Result<AddressWindow, SyncAddressError> {
        let keys = DerivationType::REQUIRED
            .iter()
            .map(|t| HdKeyDeriver::derive_account(master, *t, self.coin, account.index))
            .collect::<Result<Vec<AccountKeys>, _>>()?;
        let xpubs: Vec<String> = keys.iter().map(|k| k.keys.xpub.clone()).collect();

        let default_keys = keys
            .iter()
            .find(|k| k.derivation_type == account.default_derivation)
            .ok_or(DerivationError::UnsupportedPurpose(account.default_derivation.purpose()))?;

        let items = self.client.fetch_multi_address(&xpubs).await?;
        let receive_index = receive_index(&items, &default_keys.keys.xpub);

        let window = receive_index..receive_index.saturating_add(self.gap_limit);
        let addresses = derive_receive_addresses(
            &default_keys.cache.receive_account,
            default_keys.derivation_type,
            window,
        )?;

        debug!(
            account = account.index,
            derivation = %default_keys.derivation_type,
            receive_index,
            count = addresses.len(),
            "derived lookahead window"
        );

        Ok(AddressWindow {
            account_index: account.index,
            derivation_type: default_keys.derivation_type,
            receive_index,
            addresses,
        })
    }

    /// `active` addresses followed by every account window, joined with `|`.
    pub async fn provide_addresses(
        &self,
        master: &MasterKey,
        active: &[String],
        accounts: &[Account],
    ) -> Result<String, SyncAddressError> {
        let windows = self.scan(master, accounts).await?;
        let all: Vec<&str> = active
            .iter()
            .map(String::as_str)
            .chain(windows.iter().flat_map(|w| w.addresses.iter().map(String::as_str)))
            .collect();
        Ok(all.join(ADDRESS_SEPARATOR))
    }
}

/// Receive index reported for `xpub`, or 0 when the chain does not know it yet.
pub fn receive_index(items: &[MultiAddressItem], xpub: &str) -> u32 {
    items
        .iter()
        .find(|item| item.xpub == xpub)
        .map(|item| item.account_index)
        .unwrap_or(0)
}
