use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use url::Url;

use crate::indexer::IndexerError;

use super::Probe;

const STATUS_QUERY: &str = "query Status { _meta { deployment } }";

/// One indexer endpoint answering GraphQL queries over historical state.
#[derive(Clone, Debug)]
pub struct GraphqlBackend {
    url: Url,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl GraphqlBackend {
    pub fn new(http: reqwest::Client, url: Url, request_timeout: Duration) -> Self {
        Self {
            url,
            http,
            request_timeout,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Runs one query and returns the `data` payload.
    pub async fn request(&self, query: &str, variables: Value) -> Result<Value, IndexerError> {
        let response = self
            .http
            .post(self.url.clone())
            .timeout(self.request_timeout)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(IndexerError::Status {
                endpoint: self.url.to_string(),
                status: response.status(),
            });
        }
        let body: Value = response
            .json()
            .await
            .map_err(|err| IndexerError::Schema(format!("malformed response body: {err}")))?;
        if let Some(errors) = body.get("errors").filter(|v| !v.is_null()) {
            return Err(IndexerError::Query(errors.to_string()));
        }
        body.get("data")
            .cloned()
            .ok_or_else(|| IndexerError::Schema("response carries no data field".to_string()))
    }
}

#[async_trait]
impl Probe for GraphqlBackend {
    async fn is_up(&self) -> bool {
        match self.request(STATUS_QUERY, Value::Null).await {
            Ok(data) => data
                .pointer("/_meta/deployment")
                .map(|deployment| !deployment.is_null())
                .unwrap_or(false),
            Err(_) => false,
        }
    }
}
