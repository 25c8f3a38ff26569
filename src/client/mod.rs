use std::sync::Arc;

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::chain::{EthersChain, GovernanceChain};
use crate::config::AgoraConfig;
use crate::context::Context;
use crate::error::ClientResult;
use crate::fees::{self, GasEstimate};
use crate::indexer::SubgraphTokenBalance;
use crate::plugins::{AdminClient, MultisigClient, TokenVotingClient};
use crate::staged::{
    CreateDaoParams, CreateDaoWorkflow, DepositParams, DepositWorkflow, SetAllowanceParams,
    SetAllowanceWorkflow, StagedOperation,
};

/// Organization metadata as pinned to the content store.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DaoMetadata {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub links: Vec<DaoMetadataLink>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DaoMetadataLink {
    pub name: String,
    pub url: String,
}

/// Client facade over one governance protocol deployment. Methods are thin
/// delegations into the backend pools, the action codec and the staged
/// workflows; plugin-specific vocabularies live behind [`DaoClient::multisig`],
/// [`DaoClient::token_voting`] and [`DaoClient::admin`].
pub struct DaoClient {
    context: Arc<Context>,
}

impl DaoClient {
    pub fn new(context: Context) -> Self {
        Self {
            context: Arc::new(context),
        }
    }

    pub fn from_config(config: &AgoraConfig) -> ClientResult<Self> {
        Ok(Self::new(Context::from_config(config)?))
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn multisig(&self, plugin: Address) -> MultisigClient {
        MultisigClient::new(Arc::clone(&self.context), plugin)
    }

    pub fn token_voting(&self, plugin: Address) -> TokenVotingClient {
        TokenVotingClient::new(Arc::clone(&self.context), plugin)
    }

    pub fn admin(&self, plugin: Address) -> AdminClient {
        AdminClient::new(Arc::clone(&self.context), plugin)
    }

    /// Creates an organization through the configured factory.
    pub fn create_dao(
        &self,
        params: CreateDaoParams,
    ) -> ClientResult<StagedOperation<CreateDaoWorkflow<EthersChain>>> {
        let factory = self.context.contracts().dao_factory()?;
        Ok(CreateDaoWorkflow::new(self.context.chain(), factory, params)?)
    }

    /// Deposits the native asset or an ERC-20 token into an organization
    /// treasury.
    pub fn deposit(
        &self,
        params: DepositParams,
    ) -> ClientResult<StagedOperation<DepositWorkflow<EthersChain>>> {
        Ok(DepositWorkflow::new(self.context.chain(), params)?)
    }

    pub fn set_allowance(
        &self,
        params: SetAllowanceParams,
    ) -> ClientResult<StagedOperation<SetAllowanceWorkflow<EthersChain>>> {
        Ok(SetAllowanceWorkflow::new(self.context.chain(), params)?)
    }

    /// Pins metadata to the content store and returns its `ipfs://` URI.
    pub async fn pin_metadata(&self, metadata: &DaoMetadata) -> ClientResult<String> {
        Ok(self.context.ipfs().pin_metadata(metadata).await?)
    }

    /// Fetches previously pinned metadata content by URI or bare identifier.
    pub async fn fetch_metadata(&self, uri: &str) -> ClientResult<String> {
        let cid = uri.strip_prefix("ipfs://").unwrap_or(uri);
        Ok(self.context.ipfs().fetch_string(cid).await?)
    }

    /// Quotes the fee for a deposit without submitting anything.
    pub async fn estimate_deposit(&self, params: &DepositParams) -> ClientResult<GasEstimate> {
        let chain = self.context.chain();
        let data = crate::staged::deposit::deposit_call_data(params)?;
        let value = if params.token.is_none() {
            params.amount
        } else {
            U256::zero()
        };
        let gas_units = chain.estimate_gas(params.dao, value, data).await?;
        Ok(fees::estimate(&chain, gas_units, self.context.gas_fee_estimation_factor()).await?)
    }

    /// Treasury balances of an organization as the indexer reports them.
    pub async fn balances(&self, dao: Address) -> ClientResult<Vec<SubgraphTokenBalance>> {
        Ok(self.context.indexer().dao_balances(dao).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staged::StagedError;
    use crate::error::ClientError;

    #[test]
    fn staged_methods_validate_before_any_network_call() {
        let client = DaoClient::from_config(&AgoraConfig::default()).expect("client");
        // no signer configured: every workflow refuses synchronously
        let err = client
            .deposit(DepositParams {
                dao: Address::from([0xda; 20]),
                token: None,
                amount: U256::from(5u64),
                reference: String::new(),
            })
            .expect_err("no signer");
        assert!(matches!(
            err,
            ClientError::Staged(StagedError::Precondition(_))
        ));
    }

    #[test]
    fn create_dao_needs_a_configured_factory() {
        let client = DaoClient::from_config(&AgoraConfig::default()).expect("client");
        let err = client
            .create_dao(CreateDaoParams {
                trusted_forwarder: Address::zero(),
                dao_uri: String::new(),
                subdomain: "treasury".to_string(),
                metadata: Default::default(),
                plugins: Vec::new(),
            })
            .expect_err("factory unset");
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn metadata_serializes_without_empty_avatar() {
        let metadata = DaoMetadata {
            name: "Treasury".to_string(),
            description: "Shared treasury".to_string(),
            avatar: None,
            links: vec![DaoMetadataLink {
                name: "site".to_string(),
                url: "https://dao.example".to_string(),
            }],
        };
        let json = serde_json::to_value(&metadata).expect("serialize");
        assert!(json.get("avatar").is_none());
        assert_eq!(json["links"][0]["url"], "https://dao.example");
    }
}
