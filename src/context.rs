use std::sync::Arc;
use std::time::Duration;

use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use tracing::info;

use crate::backend::{BackendPool, ChainBackend, GraphqlBackend, IpfsBackend};
use crate::chain::EthersChain;
use crate::config::{AgoraConfig, ConfigError, validate_endpoint_url};
use crate::encoding::strip_0x;
use crate::indexer::IndexerModule;
use crate::ipfs::IpfsModule;

/// Addresses of the deployed protocol contracts the client talks to.
#[derive(Clone, Debug, Default)]
pub struct DeployedContracts {
    dao_factory: Option<Address>,
    multisig_repo: Option<Address>,
    token_voting_repo: Option<Address>,
    admin_repo: Option<Address>,
}

impl DeployedContracts {
    pub fn dao_factory(&self) -> Result<Address, ConfigError> {
        self.dao_factory
            .ok_or(ConfigError::MissingContract("contracts.dao_factory"))
    }

    pub fn multisig_repo(&self) -> Result<Address, ConfigError> {
        self.multisig_repo
            .ok_or(ConfigError::MissingContract("contracts.multisig_repo"))
    }

    pub fn token_voting_repo(&self) -> Result<Address, ConfigError> {
        self.token_voting_repo
            .ok_or(ConfigError::MissingContract("contracts.token_voting_repo"))
    }

    pub fn admin_repo(&self) -> Result<Address, ConfigError> {
        self.admin_repo
            .ok_or(ConfigError::MissingContract("contracts.admin_repo"))
    }
}

/// Assembled client context: signer, the three backend pools and the
/// configuration every module reads from.
///
/// One logical caller is expected to drive a context at a time; the pools'
/// active-backend selection is shared session state (see `backend`).
pub struct Context {
    chain_id: u64,
    signer: Option<LocalWallet>,
    chain_pool: Arc<BackendPool<ChainBackend>>,
    ipfs_pool: Arc<BackendPool<IpfsBackend>>,
    graphql_pool: Arc<BackendPool<GraphqlBackend>>,
    contracts: DeployedContracts,
    gas_fee_estimation_factor: f64,
    confirm_interval: Duration,
    confirm_timeout: Duration,
}

impl Context {
    pub fn from_config(config: &AgoraConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let request_timeout = Duration::from_millis(config.global.request_timeout_ms);
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| {
                ConfigError::InvalidConfiguration(format!("failed to build http client: {err}"))
            })?;

        let signer = parse_wallet(&config.global.wallet.private_key)?;

        let mut chain_backends = Vec::with_capacity(config.global.rpc_urls().len());
        for raw in config.global.rpc_urls() {
            let url = validate_endpoint_url(raw, config.global.testing)?;
            chain_backends.push(ChainBackend::new(url));
        }

        let mut ipfs_backends = Vec::with_capacity(config.ipfs.nodes.len());
        for node in &config.ipfs.nodes {
            let url = validate_endpoint_url(&node.url, config.global.testing)?;
            let headers: Vec<(String, String)> = node
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            let backend = IpfsBackend::new(http.clone(), url, &headers, request_timeout)
                .map_err(|err| ConfigError::InvalidConfiguration(err.to_string()))?;
            ipfs_backends.push(backend);
        }

        let mut graphql_backends = Vec::with_capacity(config.graphql.urls.len());
        for raw in &config.graphql.urls {
            let url = validate_endpoint_url(raw, config.global.testing)?;
            graphql_backends.push(GraphqlBackend::new(http.clone(), url, request_timeout));
        }

        let contracts = DeployedContracts {
            dao_factory: parse_contract(&config.contracts.dao_factory)?,
            multisig_repo: parse_contract(&config.contracts.multisig_repo)?,
            token_voting_repo: parse_contract(&config.contracts.token_voting_repo)?,
            admin_repo: parse_contract(&config.contracts.admin_repo)?,
        };

        info!(
            target: "context",
            chain_id = config.global.chain_id,
            rpc_backends = chain_backends.len(),
            ipfs_backends = ipfs_backends.len(),
            graphql_backends = graphql_backends.len(),
            has_signer = signer.is_some(),
            "client context assembled"
        );

        Ok(Self {
            chain_id: config.global.chain_id,
            signer,
            chain_pool: Arc::new(BackendPool::new("web3", chain_backends)),
            ipfs_pool: Arc::new(BackendPool::new("ipfs", ipfs_backends)),
            graphql_pool: Arc::new(BackendPool::new("graphql", graphql_backends)),
            contracts,
            gas_fee_estimation_factor: config.fees.gas_fee_estimation_factor,
            confirm_interval: Duration::from_millis(config.confirm.interval_ms),
            confirm_timeout: Duration::from_millis(config.confirm.timeout_ms),
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn signer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(|wallet| wallet.address())
    }

    pub fn contracts(&self) -> &DeployedContracts {
        &self.contracts
    }

    pub fn gas_fee_estimation_factor(&self) -> f64 {
        self.gas_fee_estimation_factor
    }

    pub fn chain_pool(&self) -> &Arc<BackendPool<ChainBackend>> {
        &self.chain_pool
    }

    pub fn ipfs_pool(&self) -> &Arc<BackendPool<IpfsBackend>> {
        &self.ipfs_pool
    }

    pub fn graphql_pool(&self) -> &Arc<BackendPool<GraphqlBackend>> {
        &self.graphql_pool
    }

    /// Chain handle bound to this context's pool and signer.
    pub fn chain(&self) -> EthersChain {
        EthersChain::new(
            Arc::clone(&self.chain_pool),
            self.signer.clone(),
            self.chain_id,
            self.confirm_interval,
            self.confirm_timeout,
        )
    }

    pub fn ipfs(&self) -> IpfsModule {
        IpfsModule::new(Arc::clone(&self.ipfs_pool))
    }

    pub fn indexer(&self) -> IndexerModule {
        IndexerModule::new(Arc::clone(&self.graphql_pool))
    }
}

fn parse_wallet(private_key: &str) -> Result<Option<LocalWallet>, ConfigError> {
    let trimmed = private_key.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    strip_0x(trimmed)
        .parse::<LocalWallet>()
        .map(Some)
        .map_err(|err| {
            ConfigError::InvalidConfiguration(format!("wallet private key is invalid: {err}"))
        })
}

fn parse_contract(raw: &str) -> Result<Option<Address>, ConfigError> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<Address>().map(Some).map_err(|_| {
        ConfigError::InvalidConfiguration(format!("`{raw}` is not a valid contract address"))
    })
}
