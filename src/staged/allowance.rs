use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, H256, U256};

use crate::chain::{self, GovernanceChain, event_topic, find_log};
use crate::codec::registries;

use super::{StagedError, StagedOperation, StagedResult, Workflow};

#[derive(Clone, Debug)]
pub struct SetAllowanceParams {
    pub token: Address,
    pub spender: Address,
    pub amount: U256,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetAllowanceStep {
    SettingAllowance { tx_hash: H256 },
    AllowanceSet { allowance: U256 },
}

enum State {
    Submit,
    Confirm { tx_hash: H256 },
    Finished,
}

/// 独立的授权工作流：提交 approve，再核对 Approval 事件。
pub struct SetAllowanceWorkflow<C> {
    chain: C,
    params: SetAllowanceParams,
    state: State,
}

impl<C> SetAllowanceWorkflow<C>
where
    C: GovernanceChain,
{
    pub fn new(chain: C, params: SetAllowanceParams) -> StagedResult<StagedOperation<Self>> {
        chain
            .ready()
            .map_err(|err| StagedError::Precondition(err.to_string()))?;
        Ok(StagedOperation::new(Self {
            chain,
            params,
            state: State::Submit,
        }))
    }
}

#[async_trait::async_trait]
impl<C> Workflow for SetAllowanceWorkflow<C>
where
    C: GovernanceChain,
{
    type Step = SetAllowanceStep;

    async fn advance(&mut self) -> StagedResult<Option<SetAllowanceStep>> {
        match std::mem::replace(&mut self.state, State::Finished) {
            State::Submit => {
                let data = registries::erc20().encode(
                    "approve",
                    &[
                        Token::Address(self.params.spender),
                        Token::Uint(self.params.amount),
                    ],
                )?;
                let tx_hash = self.chain.submit(self.params.token, U256::zero(), data).await?;
                self.state = State::Confirm { tx_hash };
                Ok(Some(SetAllowanceStep::SettingAllowance { tx_hash }))
            }
            State::Confirm { tx_hash } => {
                let receipt = self.chain.confirm(tx_hash).await?;
                let log = find_log(
                    &receipt,
                    Some(self.params.token),
                    event_topic(chain::events::APPROVAL),
                )
                .ok_or_else(|| {
                    StagedError::PostConditionMismatch(
                        "授权交易回执中缺少 Approval 事件".to_string(),
                    )
                })?;
                let mut tokens = abi::decode(&[ParamType::Uint(256)], &log.data)?;
                let approved = match tokens.pop() {
                    Some(Token::Uint(value)) => value,
                    _ => {
                        return Err(StagedError::PostConditionMismatch(
                            "Approval 事件数据无法解析".to_string(),
                        ));
                    }
                };
                if approved < self.params.amount {
                    return Err(StagedError::PostConditionMismatch(format!(
                        "授权额度 {approved} 低于请求的 {}",
                        self.params.amount
                    )));
                }
                self.state = State::Finished;
                Ok(Some(SetAllowanceStep::AllowanceSet {
                    allowance: self.params.amount,
                }))
            }
            State::Finished => Ok(None),
        }
    }
}
