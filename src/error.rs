use thiserror::Error;

use crate::backend::PoolError;
use crate::chain::ChainError;
use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::encoding::EncodingError;
use crate::indexer::IndexerError;
use crate::ipfs::IpfsError;
use crate::staged::StagedError;

/// Top-level error for the client facade; module errors pass through
/// unchanged so callers can match on the concrete failure.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Staged(#[from] StagedError),
    #[error(transparent)]
    Ipfs(#[from] IpfsError),
    #[error(transparent)]
    Indexer(#[from] IndexerError),
    #[error("proposal {proposal_id} belongs to plugin {expected}, not this client")]
    ForeignProposal {
        proposal_id: String,
        expected: String,
    },
}

pub type ClientResult<T> = Result<T, ClientError>;
