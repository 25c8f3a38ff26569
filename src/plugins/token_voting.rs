use std::sync::Arc;

use ethers::abi::Token;
use ethers::types::{Address, U256};

use crate::chain::EthersChain;
use crate::codec::{Action, CodecError, FunctionDescriptor, FunctionRegistry, registries};
use crate::context::Context;
use crate::encoding::{decode_proposal_id, decode_ratio, encode_ratio};
use crate::error::{ClientError, ClientResult};
use crate::indexer::ProposalQueryParams;
use crate::staged::{
    CreateProposalWorkflow, ExecuteWorkflow, StagedOperation, VoteWorkflow,
};

use super::Proposal;

/// On-chain ratios (support threshold, participation) use 6 decimal digits.
const RATIO_DIGITS: u32 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteOption {
    Abstain,
    Yes,
    No,
}

impl VoteOption {
    fn value(self) -> u8 {
        match self {
            VoteOption::Abstain => 1,
            VoteOption::Yes => 2,
            VoteOption::No => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VotingMode {
    Standard,
    EarlyExecution,
    VoteReplacement,
}

impl VotingMode {
    fn value(self) -> u8 {
        match self {
            VotingMode::Standard => 0,
            VotingMode::EarlyExecution => 1,
            VotingMode::VoteReplacement => 2,
        }
    }

    fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(VotingMode::Standard),
            1 => Some(VotingMode::EarlyExecution),
            2 => Some(VotingMode::VoteReplacement),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VotingSettings {
    pub voting_mode: VotingMode,
    pub support_threshold: f64,
    pub min_participation: f64,
    pub min_duration_secs: u64,
    pub min_proposer_voting_power: U256,
}

#[derive(Clone, Debug)]
pub struct CreateTokenVotingProposalParams {
    pub metadata_uri: String,
    pub actions: Vec<Action>,
    pub allow_failure_map: U256,
    pub start_date: u64,
    pub end_date: u64,
    pub creator_vote: Option<VoteOption>,
    pub execute_on_pass: bool,
}

/// 面向单个代币投票插件实例的客户端。
pub struct TokenVotingClient {
    context: Arc<Context>,
    plugin: Address,
}

impl TokenVotingClient {
    pub(crate) fn new(context: Arc<Context>, plugin: Address) -> Self {
        Self { context, plugin }
    }

    pub fn plugin(&self) -> Address {
        self.plugin
    }

    fn registry() -> &'static FunctionRegistry {
        registries::token_voting()
    }

    pub fn update_settings_action(&self, settings: &VotingSettings) -> ClientResult<Action> {
        let support = encode_ratio(settings.support_threshold, RATIO_DIGITS)?;
        let participation = encode_ratio(settings.min_participation, RATIO_DIGITS)?;
        Ok(Self::registry().encode_action(
            self.plugin,
            U256::zero(),
            "updateVotingSettings",
            &[Token::Tuple(vec![
                Token::Uint(U256::from(settings.voting_mode.value())),
                Token::Uint(U256::from(support)),
                Token::Uint(U256::from(participation)),
                Token::Uint(U256::from(settings.min_duration_secs)),
                Token::Uint(settings.min_proposer_voting_power),
            ])],
        )?)
    }

    pub fn decode_update_settings_action(&self, data: &[u8]) -> ClientResult<VotingSettings> {
        let (descriptor, mut args) = Self::registry().decode(data)?;
        if descriptor.name() != "updateVotingSettings" {
            return Err(CodecError::UnknownFunctionSelector(descriptor.selector()).into());
        }
        let Some(Token::Tuple(fields)) = args.pop() else {
            return Err(CodecError::MalformedPayload.into());
        };
        match (&fields[0], &fields[1], &fields[2], &fields[3], &fields[4]) {
            (
                Token::Uint(mode),
                Token::Uint(support),
                Token::Uint(participation),
                Token::Uint(duration),
                Token::Uint(power),
            ) => Ok(VotingSettings {
                voting_mode: VotingMode::from_value(mode.as_u32() as u8)
                    .ok_or(CodecError::MalformedPayload)?,
                support_threshold: decode_ratio(support.as_u128(), RATIO_DIGITS)?,
                min_participation: decode_ratio(participation.as_u128(), RATIO_DIGITS)?,
                min_duration_secs: duration.as_u64(),
                min_proposer_voting_power: *power,
            }),
            _ => Err(CodecError::MalformedPayload.into()),
        }
    }

    /// 给治理代币增发的动作，目标是代币合约本身。
    pub fn mint_action(
        &self,
        token: Address,
        to: Address,
        amount: U256,
    ) -> ClientResult<Action> {
        Ok(Self::registry().encode_action(
            token,
            U256::zero(),
            "mint",
            &[Token::Address(to), Token::Uint(amount)],
        )?)
    }

    pub fn identify_action(&self, data: &[u8]) -> Option<&'static FunctionDescriptor> {
        Self::registry().identify(data)
    }

    pub fn create_proposal(
        &self,
        params: &CreateTokenVotingProposalParams,
    ) -> ClientResult<StagedOperation<CreateProposalWorkflow<EthersChain>>> {
        let creator_vote = params.creator_vote.map(VoteOption::value).unwrap_or(0);
        let data = Self::registry().encode(
            "createProposal",
            &[
                Token::Bytes(params.metadata_uri.as_bytes().to_vec()),
                super::action_tokens(&params.actions),
                Token::Uint(params.allow_failure_map),
                Token::Uint(U256::from(params.start_date)),
                Token::Uint(U256::from(params.end_date)),
                Token::Uint(U256::from(creator_vote)),
                Token::Bool(params.execute_on_pass),
            ],
        )?;
        Ok(CreateProposalWorkflow::new(
            self.context.chain(),
            self.plugin,
            data,
        )?)
    }

    pub fn vote(
        &self,
        proposal_id: &str,
        option: VoteOption,
    ) -> ClientResult<StagedOperation<VoteWorkflow<EthersChain>>> {
        let nonce = self.own_nonce(proposal_id)?;
        let data = Self::registry().encode(
            "vote",
            &[
                Token::Uint(U256::from(nonce)),
                Token::Uint(U256::from(option.value())),
                Token::Bool(false),
            ],
        )?;
        Ok(VoteWorkflow::new(self.context.chain(), self.plugin, data)?)
    }

    pub fn execute(
        &self,
        proposal_id: &str,
    ) -> ClientResult<StagedOperation<ExecuteWorkflow<EthersChain>>> {
        let nonce = self.own_nonce(proposal_id)?;
        let data = Self::registry().encode("execute", &[Token::Uint(U256::from(nonce))])?;
        Ok(ExecuteWorkflow::new(
            self.context.chain(),
            self.plugin,
            data,
        )?)
    }

    pub async fn proposal(&self, proposal_id: &str) -> ClientResult<Option<Proposal>> {
        self.own_nonce(proposal_id)?;
        super::load_proposal(&self.context, proposal_id).await
    }

    pub async fn proposals(&self, skip: u64, limit: u64) -> ClientResult<Vec<Proposal>> {
        let params = ProposalQueryParams {
            plugin: Some(self.plugin),
            skip,
            limit,
            ascending: false,
        };
        let rows = self.context.indexer().proposals(&params).await?;
        let mut proposals = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(proposal) = super::load_proposal(&self.context, &row.id).await? {
                proposals.push(proposal);
            }
        }
        Ok(proposals)
    }

    fn own_nonce(&self, proposal_id: &str) -> ClientResult<u64> {
        let (plugin, nonce) = decode_proposal_id(proposal_id)?;
        if plugin != self.plugin {
            return Err(ClientError::ForeignProposal {
                proposal_id: proposal_id.to_string(),
                expected: format!("{plugin:#x}"),
            });
        }
        Ok(nonce)
    }
}
