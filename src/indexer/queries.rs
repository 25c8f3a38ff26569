use ethers::types::{Address, U256};
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};

pub const PROPOSAL_QUERY: &str = r#"query Proposal($proposalId: ID!) {
  proposal(id: $proposalId) {
    id
    creator
    metadata
    startDate
    endDate
    executed
    yes
    no
    abstain
  }
}"#;

pub const PROPOSALS_QUERY: &str = r#"query Proposals($where: Proposal_filter!, $limit: Int!, $skip: Int!, $direction: OrderDirection!) {
  proposals(where: $where, first: $limit, skip: $skip, orderDirection: $direction, orderBy: startDate) {
    id
    creator
    metadata
    startDate
    endDate
    executed
    yes
    no
    abstain
  }
}"#;

pub const DAO_BALANCES_QUERY: &str = r#"query DaoBalances($address: ID!) {
  tokenBalances(where: { dao: $address }) {
    balance
    token {
      id
      name
      symbol
      decimals
    }
  }
}"#;

/// Pagination and filtering for proposal listings.
#[derive(Clone, Debug)]
pub struct ProposalQueryParams {
    pub plugin: Option<Address>,
    pub skip: u64,
    pub limit: u64,
    pub ascending: bool,
}

impl Default for ProposalQueryParams {
    fn default() -> Self {
        Self {
            plugin: None,
            skip: 0,
            limit: 10,
            ascending: false,
        }
    }
}

impl ProposalQueryParams {
    pub(crate) fn to_variables(&self) -> Value {
        let mut filter = json!({});
        if let Some(plugin) = self.plugin {
            filter["plugin"] = json!(format!("{plugin:#x}"));
        }
        json!({
            "where": filter,
            "limit": self.limit,
            "skip": self.skip,
            "direction": if self.ascending { "asc" } else { "desc" },
        })
    }
}

/// Proposal row as the indexer stores it: timestamps and tallies arrive as
/// decimal strings.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphProposal {
    pub id: String,
    pub creator: String,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(deserialize_with = "u64_from_string")]
    pub start_date: u64,
    #[serde(deserialize_with = "u64_from_string")]
    pub end_date: u64,
    pub executed: bool,
    #[serde(default, deserialize_with = "u256_from_string")]
    pub yes: U256,
    #[serde(default, deserialize_with = "u256_from_string")]
    pub no: U256,
    #[serde(default, deserialize_with = "u256_from_string")]
    pub abstain: U256,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SubgraphToken {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub decimals: u8,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SubgraphTokenBalance {
    #[serde(deserialize_with = "u256_from_string")]
    pub balance: U256,
    pub token: SubgraphToken,
}

fn u64_from_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
    }
}

fn u256_from_string<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(U256::from(value)),
        Raw::Text(text) => U256::from_dec_str(&text).map_err(serde::de::Error::custom),
    }
}
