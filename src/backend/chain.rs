use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use url::Url;

use super::Probe;

/// One JSON-RPC node of the target chain.
#[derive(Clone, Debug)]
pub struct ChainBackend {
    url: Url,
    provider: Arc<Provider<Http>>,
}

impl ChainBackend {
    pub fn new(url: Url) -> Self {
        let provider =
            Provider::new(Http::new(url.clone())).interval(Duration::from_millis(500));
        Self {
            url,
            provider: Arc::new(provider),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn provider(&self) -> Arc<Provider<Http>> {
        Arc::clone(&self.provider)
    }
}

#[async_trait]
impl Probe for ChainBackend {
    async fn is_up(&self) -> bool {
        self.provider.get_chainid().await.is_ok()
    }
}
