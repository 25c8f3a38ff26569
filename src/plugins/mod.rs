use std::time::{SystemTime, UNIX_EPOCH};

use ethers::abi::Token;
use tracing::debug;

use crate::codec::Action;
use crate::context::Context;
use crate::error::ClientResult;
use crate::status::{ProposalStatus, ProposalTally, resolve};

pub mod admin;
pub mod multisig;
pub mod token_voting;

pub use admin::AdminClient;
pub use multisig::MultisigClient;
pub use token_voting::TokenVotingClient;

/// Proposal view the voting plugins report: indexed row, resolved status and
/// best-effort metadata content.
#[derive(Clone, Debug)]
pub struct Proposal {
    pub id: String,
    pub creator: String,
    pub metadata_uri: Option<String>,
    pub metadata: Option<String>,
    pub start_date: u64,
    pub end_date: u64,
    pub executed: bool,
    pub tally: ProposalTally,
    pub status: ProposalStatus,
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Packs `(to, value, data)` actions into the ABI tuple array proposals
/// carry.
pub(crate) fn action_tokens(actions: &[Action]) -> Token {
    Token::Array(
        actions
            .iter()
            .map(|action| {
                Token::Tuple(vec![
                    Token::Address(action.to),
                    Token::Uint(action.value),
                    Token::Bytes(action.data.to_vec()),
                ])
            })
            .collect(),
    )
}

/// Loads one proposal from the indexer and resolves its status. Metadata
/// content is fetched best-effort: a dead content-store never fails the
/// lookup.
pub(crate) async fn load_proposal(
    context: &Context,
    proposal_id: &str,
) -> ClientResult<Option<Proposal>> {
    let Some(row) = context.indexer().proposal(proposal_id).await? else {
        return Ok(None);
    };

    let status = resolve(
        unix_now(),
        row.start_date,
        row.end_date,
        row.executed,
        row.yes,
        row.no,
    );

    let metadata = match row.metadata.as_deref().and_then(|uri| uri.strip_prefix("ipfs://")) {
        Some(cid) => match context.ipfs().fetch_string(cid).await {
            Ok(content) => Some(content),
            Err(err) => {
                debug!(
                    target: "plugins",
                    proposal_id,
                    error = %err,
                    "metadata fetch failed, reporting the proposal without it"
                );
                None
            }
        },
        None => None,
    };

    Ok(Some(Proposal {
        id: row.id,
        creator: row.creator,
        metadata_uri: row.metadata,
        metadata,
        start_date: row.start_date,
        end_date: row.end_date,
        executed: row.executed,
        tally: ProposalTally {
            yes: row.yes,
            no: row.no,
            abstain: row.abstain,
        },
        status,
    }))
}
