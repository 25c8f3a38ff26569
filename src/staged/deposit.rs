use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, H256, U256};
use tracing::debug;

use crate::chain::{self, GovernanceChain, erc20_allowance, event_topic, find_log};
use crate::codec::registries;

use super::{StagedError, StagedOperation, StagedResult, Workflow};

/// 入金参数。`token` 为空表示链原生资产。
#[derive(Clone, Debug)]
pub struct DepositParams {
    pub dao: Address,
    pub token: Option<Address>,
    pub amount: U256,
    pub reference: String,
}

/// 入金工作流的里程碑。授权相关的三步只在入金资产不是原生资产、
/// 且当前授权额度不足时出现。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DepositStep {
    CheckedAllowance { allowance: U256 },
    UpdatingAllowance { tx_hash: H256 },
    UpdatedAllowance { allowance: U256 },
    Depositing { tx_hash: H256 },
    Done { amount: U256 },
}

enum State {
    CheckAllowance { token: Address },
    RaiseAllowance { token: Address },
    ConfirmAllowance { token: Address, tx_hash: H256 },
    SubmitDeposit,
    ConfirmDeposit { tx_hash: H256 },
    Finished,
}

/// 把一次入金拆成逐笔可观测的链上交互：
/// 查授权 → （必要时）提额并等确认 → 提交入金 → 核对回执。
pub struct DepositWorkflow<C> {
    chain: C,
    params: DepositParams,
    state: State,
}

impl<C> DepositWorkflow<C>
where
    C: GovernanceChain,
{
    /// 构造时同步校验前置条件，不产生任何网络请求。
    pub fn new(chain: C, params: DepositParams) -> StagedResult<StagedOperation<Self>> {
        chain
            .ready()
            .map_err(|err| StagedError::Precondition(err.to_string()))?;
        let state = match params.token {
            Some(token) => State::CheckAllowance { token },
            None => State::SubmitDeposit,
        };
        Ok(StagedOperation::new(Self {
            chain,
            params,
            state,
        }))
    }
}

/// 入金调用数据；估费路径也会用到，保持与工作流一致。
pub(crate) fn deposit_call_data(params: &DepositParams) -> StagedResult<Bytes> {
    let token = params.token.unwrap_or_else(Address::zero);
    Ok(registries::dao().encode(
        "deposit",
        &[
            Token::Address(token),
            Token::Uint(params.amount),
            Token::String(params.reference.clone()),
        ],
    )?)
}

#[async_trait::async_trait]
impl<C> Workflow for DepositWorkflow<C>
where
    C: GovernanceChain,
{
    type Step = DepositStep;

    async fn advance(&mut self) -> StagedResult<Option<DepositStep>> {
        match std::mem::replace(&mut self.state, State::Finished) {
            State::CheckAllowance { token } => {
                let owner = self.chain.sender()?;
                let allowance =
                    erc20_allowance(&self.chain, token, owner, self.params.dao).await?;
                debug!(
                    target: "staged::deposit",
                    token = %token,
                    allowance = %allowance,
                    required = %self.params.amount,
                    "已读取当前授权额度"
                );
                self.state = if allowance < self.params.amount {
                    State::RaiseAllowance { token }
                } else {
                    State::SubmitDeposit
                };
                Ok(Some(DepositStep::CheckedAllowance { allowance }))
            }
            State::RaiseAllowance { token } => {
                let data = registries::erc20().encode(
                    "approve",
                    &[
                        Token::Address(self.params.dao),
                        Token::Uint(self.params.amount),
                    ],
                )?;
                let tx_hash = self.chain.submit(token, U256::zero(), data).await?;
                self.state = State::ConfirmAllowance { token, tx_hash };
                Ok(Some(DepositStep::UpdatingAllowance { tx_hash }))
            }
            State::ConfirmAllowance { token, tx_hash } => {
                let receipt = self.chain.confirm(tx_hash).await?;
                let log = find_log(
                    &receipt,
                    Some(token),
                    event_topic(chain::events::APPROVAL),
                )
                .ok_or_else(|| {
                    StagedError::PostConditionMismatch(
                        "授权交易回执中缺少 Approval 事件".to_string(),
                    )
                })?;
                let approved = decode_uint(&log.data)?;
                if approved < self.params.amount {
                    return Err(StagedError::PostConditionMismatch(format!(
                        "授权额度 {approved} 低于请求的 {}",
                        self.params.amount
                    )));
                }
                self.state = State::SubmitDeposit;
                Ok(Some(DepositStep::UpdatedAllowance {
                    allowance: self.params.amount,
                }))
            }
            State::SubmitDeposit => {
                let value = if self.params.token.is_none() {
                    self.params.amount
                } else {
                    U256::zero()
                };
                let data = deposit_call_data(&self.params)?;
                let tx_hash = self.chain.submit(self.params.dao, value, data).await?;
                self.state = State::ConfirmDeposit { tx_hash };
                Ok(Some(DepositStep::Depositing { tx_hash }))
            }
            State::ConfirmDeposit { tx_hash } => {
                let receipt = self.chain.confirm(tx_hash).await?;
                let log = find_log(
                    &receipt,
                    Some(self.params.dao),
                    event_topic(chain::events::DEPOSITED),
                )
                .ok_or_else(|| {
                    StagedError::PostConditionMismatch(
                        "入金交易回执中缺少 Deposited 事件".to_string(),
                    )
                })?;
                let mut tokens =
                    abi::decode(&[ParamType::Uint(256), ParamType::String], &log.data)?;
                let observed = match tokens.drain(..).next() {
                    Some(Token::Uint(amount)) => amount,
                    _ => {
                        return Err(StagedError::PostConditionMismatch(
                            "Deposited 事件数据无法解析".to_string(),
                        ));
                    }
                };
                if observed != self.params.amount {
                    return Err(StagedError::PostConditionMismatch(format!(
                        "链上入金金额 {observed} 与请求的 {} 不一致",
                        self.params.amount
                    )));
                }
                self.state = State::Finished;
                Ok(Some(DepositStep::Done { amount: observed }))
            }
            State::Finished => Ok(None),
        }
    }
}

fn decode_uint(data: &[u8]) -> StagedResult<U256> {
    let mut tokens = abi::decode(&[ParamType::Uint(256)], data)?;
    match tokens.pop() {
        Some(Token::Uint(value)) => Ok(value),
        _ => Err(StagedError::PostConditionMismatch(
            "事件数据无法解析为 uint256".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::FakeChain;
    use super::*;

    fn params(token: Option<Address>, amount: u64) -> DepositParams {
        DepositParams {
            dao: Address::from([0xda; 20]),
            token,
            amount: U256::from(amount),
            reference: String::new(),
        }
    }

    #[tokio::test]
    async fn native_deposit_skips_the_allowance_steps() {
        let chain = FakeChain::new();
        let op = DepositWorkflow::new(chain, params(None, 5)).expect("preconditions hold");
        let steps = op.drive().await.expect("workflow completes");
        assert_eq!(steps.len(), 2);
        assert!(matches!(steps[0], DepositStep::Depositing { .. }));
        assert_eq!(
            steps[1],
            DepositStep::Done {
                amount: U256::from(5u64)
            }
        );
    }

    #[tokio::test]
    async fn insufficient_allowance_yields_the_full_sequence() {
        let token = Address::from([0x70; 20]);
        let chain = FakeChain::new();
        let mut op =
            DepositWorkflow::new(chain, params(Some(token), 5)).expect("preconditions hold");

        let step = op.next_step().await.expect("step").expect("ok");
        assert_eq!(
            step,
            DepositStep::CheckedAllowance {
                allowance: U256::zero()
            }
        );
        let step = op.next_step().await.expect("step").expect("ok");
        let approve_hash = match step {
            DepositStep::UpdatingAllowance { tx_hash } => tx_hash,
            other => panic!("unexpected step {other:?}"),
        };
        let step = op.next_step().await.expect("step").expect("ok");
        assert_eq!(
            step,
            DepositStep::UpdatedAllowance {
                allowance: U256::from(5u64)
            }
        );
        let step = op.next_step().await.expect("step").expect("ok");
        let deposit_hash = match step {
            DepositStep::Depositing { tx_hash } => tx_hash,
            other => panic!("unexpected step {other:?}"),
        };
        assert_ne!(approve_hash, deposit_hash);
        let step = op.next_step().await.expect("step").expect("ok");
        assert_eq!(
            step,
            DepositStep::Done {
                amount: U256::from(5u64)
            }
        );
        assert!(op.next_step().await.is_none());
    }

    #[tokio::test]
    async fn sufficient_allowance_goes_straight_to_the_deposit() {
        let token = Address::from([0x70; 20]);
        let chain = FakeChain::new();
        let dao = params(Some(token), 5).dao;
        chain.set_allowance(token, dao, U256::from(10u64));
        let op = DepositWorkflow::new(chain, params(Some(token), 5)).expect("preconditions hold");
        let steps = op.drive().await.expect("workflow completes");
        assert_eq!(steps.len(), 3);
        assert_eq!(
            steps[0],
            DepositStep::CheckedAllowance {
                allowance: U256::from(10u64)
            }
        );
        assert!(matches!(steps[1], DepositStep::Depositing { .. }));
        assert!(matches!(steps[2], DepositStep::Done { .. }));
    }

    #[tokio::test]
    async fn amount_mismatch_fails_after_the_submit_step() {
        let chain = FakeChain::new();
        chain.override_deposited_amount(U256::from(4u64));
        let mut op = DepositWorkflow::new(chain, params(None, 5)).expect("preconditions hold");

        // The submit milestone stands as an observed fact.
        assert!(matches!(
            op.next_step().await.expect("step").expect("ok"),
            DepositStep::Depositing { .. }
        ));
        let err = op
            .next_step()
            .await
            .expect("step")
            .expect_err("observed amount differs");
        assert!(matches!(err, StagedError::PostConditionMismatch(_)));
        assert!(op.next_step().await.is_none());
    }

    #[tokio::test]
    async fn missing_deposited_event_is_a_post_condition_failure() {
        let chain = FakeChain::new();
        chain.omit_deposit_log();
        let mut op = DepositWorkflow::new(chain, params(None, 5)).expect("preconditions hold");
        assert!(matches!(
            op.next_step().await.expect("step").expect("ok"),
            DepositStep::Depositing { .. }
        ));
        let err = op.next_step().await.expect("step").expect_err("log absent");
        assert!(matches!(err, StagedError::PostConditionMismatch(_)));
    }

    #[tokio::test]
    async fn missing_signer_fails_before_any_step() {
        let chain = FakeChain::without_signer();
        let err = DepositWorkflow::new(chain, params(None, 5)).expect_err("no signer");
        assert!(matches!(err, StagedError::Precondition(_)));
    }
}
