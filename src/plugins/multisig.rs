use std::sync::Arc;

use ethers::abi::Token;
use ethers::types::{Address, U256};

use crate::chain::EthersChain;
use crate::codec::{Action, FunctionDescriptor, FunctionRegistry, registries};
use crate::context::Context;
use crate::encoding::decode_proposal_id;
use crate::error::{ClientError, ClientResult};
use crate::indexer::ProposalQueryParams;
use crate::staged::{
    ApproveWorkflow, CreateProposalWorkflow, ExecuteWorkflow, StagedOperation,
};

use super::Proposal;

/// 多签插件的治理开关。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MultisigVotingSettings {
    pub only_listed: bool,
    pub min_approvals: u16,
}

#[derive(Clone, Debug)]
pub struct CreateMultisigProposalParams {
    pub metadata_uri: String,
    pub actions: Vec<Action>,
    pub allow_failure_map: U256,
    pub approve: bool,
    pub try_execution: bool,
    pub start_date: u64,
    pub end_date: u64,
}

/// 面向单个多签插件实例的客户端：动作编解码、分阶段的
/// 建提案 / 批准 / 执行，以及经索引器的提案查询。
pub struct MultisigClient {
    context: Arc<Context>,
    plugin: Address,
}

impl MultisigClient {
    pub(crate) fn new(context: Arc<Context>, plugin: Address) -> Self {
        Self { context, plugin }
    }

    pub fn plugin(&self) -> Address {
        self.plugin
    }

    fn registry() -> &'static FunctionRegistry {
        registries::multisig()
    }

    pub fn add_members_action(&self, members: &[Address]) -> ClientResult<Action> {
        Ok(Self::registry().encode_action(
            self.plugin,
            U256::zero(),
            "addAddresses",
            &[Token::Array(
                members.iter().copied().map(Token::Address).collect(),
            )],
        )?)
    }

    pub fn remove_members_action(&self, members: &[Address]) -> ClientResult<Action> {
        Ok(Self::registry().encode_action(
            self.plugin,
            U256::zero(),
            "removeAddresses",
            &[Token::Array(
                members.iter().copied().map(Token::Address).collect(),
            )],
        )?)
    }

    pub fn update_settings_action(
        &self,
        settings: &MultisigVotingSettings,
    ) -> ClientResult<Action> {
        Ok(Self::registry().encode_action(
            self.plugin,
            U256::zero(),
            "updateMultisigSettings",
            &[Token::Tuple(vec![
                Token::Bool(settings.only_listed),
                Token::Uint(U256::from(settings.min_approvals)),
            ])],
        )?)
    }

    pub fn decode_add_members_action(&self, data: &[u8]) -> ClientResult<Vec<Address>> {
        decode_members(data, "addAddresses")
    }

    pub fn decode_remove_members_action(&self, data: &[u8]) -> ClientResult<Vec<Address>> {
        decode_members(data, "removeAddresses")
    }

    pub fn decode_update_settings_action(
        &self,
        data: &[u8],
    ) -> ClientResult<MultisigVotingSettings> {
        let descriptor = Self::registry().descriptor("updateMultisigSettings")?;
        let (decoded, mut args) = Self::registry().decode(data)?;
        if decoded.selector() != descriptor.selector() {
            return Err(
                crate::codec::CodecError::UnknownFunctionSelector(decoded.selector()).into(),
            );
        }
        match args.pop() {
            Some(Token::Tuple(fields)) => match (&fields[0], &fields[1]) {
                (Token::Bool(only_listed), Token::Uint(min_approvals)) => {
                    Ok(MultisigVotingSettings {
                        only_listed: *only_listed,
                        min_approvals: min_approvals.as_u32() as u16,
                    })
                }
                _ => Err(crate::codec::CodecError::MalformedPayload.into()),
            },
            _ => Err(crate::codec::CodecError::MalformedPayload.into()),
        }
    }

    /// 尽力识别任意动作数据；不在多签词汇表内时返回 `None`。
    pub fn identify_action(&self, data: &[u8]) -> Option<&'static FunctionDescriptor> {
        Self::registry().identify(data)
    }

    pub fn create_proposal(
        &self,
        params: &CreateMultisigProposalParams,
    ) -> ClientResult<StagedOperation<CreateProposalWorkflow<EthersChain>>> {
        let data = Self::registry().encode(
            "createProposal",
            &[
                Token::Bytes(params.metadata_uri.as_bytes().to_vec()),
                super::action_tokens(&params.actions),
                Token::Uint(params.allow_failure_map),
                Token::Bool(params.approve),
                Token::Bool(params.try_execution),
                Token::Uint(U256::from(params.start_date)),
                Token::Uint(U256::from(params.end_date)),
            ],
        )?;
        Ok(CreateProposalWorkflow::new(
            self.context.chain(),
            self.plugin,
            data,
        )?)
    }

    pub fn approve(
        &self,
        proposal_id: &str,
        try_execution: bool,
    ) -> ClientResult<StagedOperation<ApproveWorkflow<EthersChain>>> {
        let nonce = self.own_nonce(proposal_id)?;
        let data = Self::registry().encode(
            "approve",
            &[Token::Uint(U256::from(nonce)), Token::Bool(try_execution)],
        )?;
        Ok(ApproveWorkflow::new(
            self.context.chain(),
            self.plugin,
            data,
        )?)
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

fn decode_members(data: &[u8], expected: &str) -> ClientResult<Vec<Address>> {
    let registry = registries::multisig();
    let (descriptor, mut args) = registry.decode(data)?;
    if descriptor.name() != expected {
        return Err(
            crate::codec::CodecError::UnknownFunctionSelector(descriptor.selector()).into(),
        );
    }
    match args.pop() {
        Some(Token::Array(members)) => members
            .into_iter()
            .map(|token| match token {
                Token::Address(address) => Ok(address),
                _ => Err(crate::codec::CodecError::MalformedPayload.into()),
            })
            .collect(),
        _ => Err(crate::codec::CodecError::MalformedPayload.into()),
    }
}
