use std::collections::HashSet;

use serde::Deserialize;
use serde::de::Deserializer;

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

use self::types as cfg;

pub(crate) fn default_chain_id() -> u64 {
    1
}

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}

pub(crate) fn default_request_timeout_ms() -> u64 {
    10_000
}

pub(crate) fn default_gas_fee_estimation_factor() -> f64 {
    0.625
}

pub(crate) fn default_confirm_interval_ms() -> u64 {
    1_000
}

pub(crate) fn default_confirm_timeout_ms() -> u64 {
    120_000
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UrlField {
    Single(String),
    Multiple(Vec<String>),
}

pub(crate) fn deserialize_url_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let helper = Option::<UrlField>::deserialize(deserializer)?;
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    let values = match helper {
        Some(UrlField::Single(url)) => vec![url],
        Some(UrlField::Multiple(list)) => list,
        None => Vec::new(),
    };

    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            urls.push(trimmed.to_string());
        }
    }

    Ok(urls)
}

impl Default for cfg::AgoraConfig {
    fn default() -> Self {
        Self {
            global: cfg::GlobalConfig::default(),
            contracts: cfg::ContractsConfig::default(),
            ipfs: cfg::IpfsConfig::default(),
            graphql: cfg::GraphqlConfig::default(),
            fees: cfg::FeesConfig::default(),
            confirm: cfg::ConfirmConfig::default(),
        }
    }
}

impl Default for cfg::GlobalConfig {
    fn default() -> Self {
        Self {
            rpc_urls: Vec::new(),
            chain_id: default_chain_id(),
            testing: false,
            request_timeout_ms: default_request_timeout_ms(),
            wallet: cfg::WalletConfig::default(),
            logging: cfg::LoggingConfig::default(),
        }
    }
}

impl Default for cfg::WalletConfig {
    fn default() -> Self {
        Self {
            private_key: String::new(),
        }
    }
}

impl Default for cfg::LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_logging_level(),
            json: false,
        }
    }
}

impl Default for cfg::FeesConfig {
    fn default() -> Self {
        Self {
            gas_fee_estimation_factor: default_gas_fee_estimation_factor(),
        }
    }
}

impl Default for cfg::ConfirmConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_confirm_interval_ms(),
            timeout_ms: default_confirm_timeout_ms(),
        }
    }
}
