use std::collections::BTreeMap;

use serde::Deserialize;
use url::Url;

use super::loader::ConfigError;

/// Schemes a backend endpoint may use. The insecure scheme is only accepted
/// when the configuration runs in testing mode.
const SECURE_SCHEMES: &[&str] = &["https"];
const TESTING_SCHEMES: &[&str] = &["http"];

#[derive(Debug, Clone, Deserialize)]
pub struct AgoraConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub ipfs: IpfsConfig,
    #[serde(default)]
    pub graphql: GraphqlConfig,
    #[serde(default)]
    pub fees: FeesConfig,
    #[serde(default)]
    pub confirm: ConfirmConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    #[serde(default, deserialize_with = "super::deserialize_url_list")]
    pub rpc_urls: Vec<String>,
    #[serde(default = "super::default_chain_id")]
    pub chain_id: u64,
    /// Testing mode widens the endpoint scheme allow-list to plain http.
    #[serde(default)]
    pub testing: bool,
    #[serde(default = "super::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GlobalConfig {
    pub fn rpc_urls(&self) -> &[String] {
        &self.rpc_urls
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub private_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

/// Deployed protocol contracts, hex addresses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContractsConfig {
    #[serde(default)]
    pub dao_factory: String,
    #[serde(default)]
    pub multisig_repo: String,
    #[serde(default)]
    pub token_voting_repo: String,
    #[serde(default)]
    pub admin_repo: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpfsConfig {
    #[serde(default)]
    pub nodes: Vec<IpfsNodeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpfsNodeConfig {
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphqlConfig {
    #[serde(default, deserialize_with = "super::deserialize_url_list")]
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeesConfig {
    /// Expected fraction of the worst-case fee a transaction actually costs,
    /// within (0, 1].
    #[serde(default = "super::default_gas_fee_estimation_factor")]
    pub gas_fee_estimation_factor: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmConfig {
    #[serde(default = "super::default_confirm_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "super::default_confirm_timeout_ms")]
    pub timeout_ms: u64,
}

impl AgoraConfig {
    /// Fails fast on malformed endpoints or an out-of-range fee factor,
    /// before any network activity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for raw in self.global.rpc_urls() {
            validate_endpoint_url(raw, self.global.testing)?;
        }
        for node in &self.ipfs.nodes {
            validate_endpoint_url(&node.url, self.global.testing)?;
        }
        for raw in &self.graphql.urls {
            validate_endpoint_url(raw, self.global.testing)?;
        }

        let factor = self.fees.gas_fee_estimation_factor;
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(ConfigError::InvalidConfiguration(format!(
                "gas fee estimation factor {factor} is outside (0, 1]"
            )));
        }

        for (name, raw) in [
            ("contracts.dao_factory", &self.contracts.dao_factory),
            ("contracts.multisig_repo", &self.contracts.multisig_repo),
            (
                "contracts.token_voting_repo",
                &self.contracts.token_voting_repo,
            ),
            ("contracts.admin_repo", &self.contracts.admin_repo),
        ] {
            if !raw.is_empty() && raw.parse::<ethers::types::Address>().is_err() {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "{name} is not a valid address: `{raw}`"
                )));
            }
        }

        Ok(())
    }
}

pub fn validate_endpoint_url(raw: &str, testing: bool) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|err| {
        ConfigError::InvalidConfiguration(format!("endpoint `{raw}` is not a valid url: {err}"))
    })?;
    let scheme = url.scheme();
    let allowed =
        SECURE_SCHEMES.contains(&scheme) || (testing && TESTING_SCHEMES.contains(&scheme));
    if !allowed {
        return Err(ConfigError::InvalidConfiguration(format!(
            "endpoint `{raw}` uses unsupported scheme `{scheme}`"
        )));
    }
    Ok(url)
}
