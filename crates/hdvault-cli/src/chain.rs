//! Chain backends for the `addresses` command.

use async_trait::async_trait;
use hdvault_core::{
    CacheConfiguration, CachedValue, ChainAddressClient, ChainClientError, MultiAddressItem,
};
use std::sync::Arc;
use std::time::Duration;

/// Reports the same receive index for every xpub. Stands in for a chain backend
/// when the index is already known.
pub struct StaticChainClient {
    receive_index: u32,
}

impl StaticChainClient {
    pub fn new(receive_index: u32) -> Self {
        Self { receive_index }
    }
}

#[async_trait]
impl ChainAddressClient for StaticChainClient {
    async fn fetch_multi_address(
        &self,
        xpubs: &[String],
    ) -> Result<Vec<MultiAddressItem>, ChainClientError> {
        Ok(xpubs
            .iter()
            .map(|xpub| MultiAddressItem {
                xpub: xpub.clone(),
                account_index: self.receive_index,
            })
            .collect())
    }
}

/// Memoizes multi-address responses per xpub set.
#[derive(Clone)]
pub struct CachingChainClient {
    cache: CachedValue<Vec<String>, Vec<MultiAddressItem>, ChainClientError>,
}

impl CachingChainClient {
    pub fn new(inner: Arc<dyn ChainAddressClient>, refresh: Duration) -> Self {
        let cache = CachedValue::new(CacheConfiguration::periodic(refresh), move |xpubs: Vec<String>| {
            let inner = inner.clone();
            async move { inner.fetch_multi_address(&xpubs).await }
        });
        Self { cache }
    }

    pub fn cache(&self) -> &CachedValue<Vec<String>, Vec<MultiAddressItem>, ChainClientError> {
        &self.cache
    }
}

#[async_trait]
impl ChainAddressClient for CachingChainClient {
    async fn fetch_multi_address(
        &self,
        xpubs: &[String],
    ) -> Result<Vec<MultiAddressItem>, ChainClientError> {
        self.cache.get(xpubs.to_vec()).await
    }
}
