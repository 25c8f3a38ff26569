use std::sync::Arc;

use ethers::types::Address;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::backend::{BackendPool, GraphqlBackend, PoolError};

pub mod queries;

pub use queries::{
    ProposalQueryParams, SubgraphProposal, SubgraphToken, SubgraphTokenBalance,
};

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("indexer request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("indexer endpoint {endpoint} answered with status {status}")]
    Status { endpoint: String, status: StatusCode },
    #[error("indexer rejected the query: {0}")]
    Query(String),
    #[error("malformed indexer response: {0}")]
    Schema(String),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

pub type IndexerResult<T> = Result<T, IndexerError>;

/// Structured queries over indexed historical state.
pub struct IndexerModule {
    pool: Arc<BackendPool<GraphqlBackend>>,
}

impl IndexerModule {
    pub fn new(pool: Arc<BackendPool<GraphqlBackend>>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &BackendPool<GraphqlBackend> {
        &self.pool
    }

    pub async fn ensure_online(&self) -> IndexerResult<()> {
        self.pool.ensure_online().await?;
        Ok(())
    }

    /// Runs a query against a live endpoint and deserializes the `data`
    /// payload into `T`.
    pub async fn request<T>(&self, query: &str, variables: Value) -> IndexerResult<T>
    where
        T: DeserializeOwned,
    {
        let backend = self.pool.ensure_online().await?;
        let data = backend.request(query, variables).await?;
        serde_json::from_value(data).map_err(|err| IndexerError::Schema(err.to_string()))
    }

    /// Fetches one proposal by its composite id, `None` when the indexer does
    /// not know it.
    pub async fn proposal(&self, proposal_id: &str) -> IndexerResult<Option<SubgraphProposal>> {
        #[derive(serde::Deserialize)]
        struct Response {
            proposal: Option<SubgraphProposal>,
        }
        let response: Response = self
            .request(
                queries::PROPOSAL_QUERY,
                json!({ "proposalId": proposal_id.to_lowercase() }),
            )
            .await?;
        debug!(
            target: "indexer",
            proposal_id,
            found = response.proposal.is_some(),
            "proposal lookup finished"
        );
        Ok(response.proposal)
    }

    pub async fn proposals(
        &self,
        params: &ProposalQueryParams,
    ) -> IndexerResult<Vec<SubgraphProposal>> {
        #[derive(serde::Deserialize)]
        struct Response {
            proposals: Vec<SubgraphProposal>,
        }
        let response: Response = self
            .request(queries::PROPOSALS_QUERY, params.to_variables())
            .await?;
        Ok(response.proposals)
    }

    pub async fn dao_balances(
        &self,
        dao: Address,
    ) -> IndexerResult<Vec<SubgraphTokenBalance>> {
        #[derive(serde::Deserialize)]
        struct Response {
            #[serde(rename = "tokenBalances")]
            token_balances: Vec<SubgraphTokenBalance>,
        }
        let response: Response = self
            .request(
                queries::DAO_BALANCES_QUERY,
                json!({ "address": format!("{dao:#x}") }),
            )
            .await?;
        Ok(response.token_balances)
    }
}
