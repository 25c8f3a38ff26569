//! Client library for an on-chain governance protocol: pooled chain /
//! content-store / indexer backends, a selector-matched action codec and
//! staged multi-transaction workflows.

pub mod backend;
pub mod chain;
pub mod client;
pub mod codec;
pub mod config;
pub mod context;
pub mod encoding;
pub mod error;
pub mod fees;
pub mod indexer;
pub mod ipfs;
pub mod plugins;
pub mod staged;
pub mod status;

pub use backend::{BackendPool, PoolError, Probe};
pub use chain::{ChainError, EthersChain, GovernanceChain};
pub use client::{DaoClient, DaoMetadata, DaoMetadataLink};
pub use codec::{Action, CodecError, FunctionDescriptor, FunctionRegistry};
pub use config::{AgoraConfig, ConfigError, load_config};
pub use context::Context;
pub use error::{ClientError, ClientResult};
pub use fees::GasEstimate;
pub use plugins::{AdminClient, MultisigClient, Proposal, TokenVotingClient};
pub use staged::{StagedError, StagedOperation, Workflow};
pub use status::{ProposalStatus, ProposalTally, ProposalTiming, resolve};
