use std::sync::Arc;

use ethers::abi::Token;
use ethers::types::{Address, U256};

use crate::chain::EthersChain;
use crate::codec::{Action, FunctionDescriptor, FunctionRegistry, registries};
use crate::context::Context;
use crate::error::ClientResult;
use crate::staged::{ExecuteWorkflow, StagedOperation};

/// 管理员插件：无表决流程，提案直接执行。
pub struct AdminClient {
    context: Arc<Context>,
    plugin: Address,
}

#[derive(Clone, Debug)]
pub struct ExecuteAdminProposalParams {
    pub metadata_uri: String,
    pub actions: Vec<Action>,
    pub allow_failure_map: U256,
}

impl AdminClient {
    pub(crate) fn new(context: Arc<Context>, plugin: Address) -> Self {
        Self { context, plugin }
    }

    pub fn plugin(&self) -> Address {
        self.plugin
    }

    fn registry() -> &'static FunctionRegistry {
        registries::admin()
    }

    pub fn execute_proposal(
        &self,
        params: &ExecuteAdminProposalParams,
    ) -> ClientResult<StagedOperation<ExecuteWorkflow<EthersChain>>> {
        let data = Self::registry().encode(
            "executeProposal",
            &[
                Token::Bytes(params.metadata_uri.as_bytes().to_vec()),
                super::action_tokens(&params.actions),
                Token::Uint(params.allow_failure_map),
            ],
        )?;
        Ok(ExecuteWorkflow::new(
            self.context.chain(),
            self.plugin,
            data,
        )?)
    }

    pub fn identify_action(&self, data: &[u8]) -> Option<&'static FunctionDescriptor> {
        Self::registry().identify(data)
    }
}
