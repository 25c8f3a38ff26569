use ethers::types::{Address, Bytes, H256, U256};

use crate::chain::{self, GovernanceChain, event_topic, find_log};
use crate::encoding::encode_proposal_id;

use super::{StagedError, StagedOperation, StagedResult, Workflow};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreateProposalStep {
    Creating { tx_hash: H256 },
    Done { proposal_id: String },
}

enum TxState {
    Submit,
    Confirm { tx_hash: H256 },
    Finished,
}

/// 建提案工作流。调用数据由各插件客户端经注册表编码后传入，
/// 提案编号从插件发出的 ProposalCreated 事件里取回。
pub struct CreateProposalWorkflow<C> {
    chain: C,
    plugin: Address,
    data: Bytes,
    state: TxState,
}

impl<C> CreateProposalWorkflow<C>
where
    C: GovernanceChain,
{
    pub fn new(chain: C, plugin: Address, data: Bytes) -> StagedResult<StagedOperation<Self>> {
        chain
            .ready()
            .map_err(|err| StagedError::Precondition(err.to_string()))?;
        Ok(StagedOperation::new(Self {
            chain,
            plugin,
            data,
            state: TxState::Submit,
        }))
    }
}

#[async_trait::async_trait]
impl<C> Workflow for CreateProposalWorkflow<C>
where
    C: GovernanceChain,
{
    type Step = CreateProposalStep;

    async fn advance(&mut self) -> StagedResult<Option<CreateProposalStep>> {
        match std::mem::replace(&mut self.state, TxState::Finished) {
            TxState::Submit => {
                let tx_hash = self
                    .chain
                    .submit(self.plugin, U256::zero(), self.data.clone())
                    .await?;
                self.state = TxState::Confirm { tx_hash };
                Ok(Some(CreateProposalStep::Creating { tx_hash }))
            }
            TxState::Confirm { tx_hash } => {
                let receipt = self.chain.confirm(tx_hash).await?;
                let log = find_log(
                    &receipt,
                    Some(self.plugin),
                    event_topic(chain::events::PROPOSAL_CREATED),
                )
                .ok_or_else(|| {
                    StagedError::PostConditionMismatch(
                        "建提案回执中缺少 ProposalCreated 事件".to_string(),
                    )
                })?;
                let nonce = log.topics.get(1).ok_or_else(|| {
                    StagedError::PostConditionMismatch(
                        "ProposalCreated 事件缺少提案编号".to_string(),
                    )
                })?;
                let nonce = U256::from_big_endian(nonce.as_bytes()).as_u64();
                self.state = TxState::Finished;
                Ok(Some(CreateProposalStep::Done {
                    proposal_id: encode_proposal_id(self.plugin, nonce),
                }))
            }
            TxState::Finished => Ok(None),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoteStep {
    Voting { tx_hash: H256 },
    Done,
}

/// 投票工作流：提交 vote 并等待确认。
pub struct VoteWorkflow<C> {
    chain: C,
    to: Address,
    data: Bytes,
    state: TxState,
}

impl<C> VoteWorkflow<C>
where
    C: GovernanceChain,
{
    pub fn new(chain: C, to: Address, data: Bytes) -> StagedResult<StagedOperation<Self>> {
        chain
            .ready()
            .map_err(|err| StagedError::Precondition(err.to_string()))?;
        Ok(StagedOperation::new(Self {
            chain,
            to,
            data,
            state: TxState::Submit,
        }))
    }
}

#[async_trait::async_trait]
impl<C> Workflow for VoteWorkflow<C>
where
    C: GovernanceChain,
{
    type Step = VoteStep;

    async fn advance(&mut self) -> StagedResult<Option<VoteStep>> {
        match std::mem::replace(&mut self.state, TxState::Finished) {
            TxState::Submit => {
                let tx_hash = self
                    .chain
                    .submit(self.to, U256::zero(), self.data.clone())
                    .await?;
                self.state = TxState::Confirm { tx_hash };
                Ok(Some(VoteStep::Voting { tx_hash }))
            }
            TxState::Confirm { tx_hash } => {
                self.chain.confirm(tx_hash).await?;
                self.state = TxState::Finished;
                Ok(Some(VoteStep::Done))
            }
            TxState::Finished => Ok(None),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApproveStep {
    Approving { tx_hash: H256 },
    Done,
}

/// 多签批准工作流：提交 approve 并等待确认。
pub struct ApproveWorkflow<C> {
    chain: C,
    to: Address,
    data: Bytes,
    state: TxState,
}

impl<C> ApproveWorkflow<C>
where
    C: GovernanceChain,
{
    pub fn new(chain: C, to: Address, data: Bytes) -> StagedResult<StagedOperation<Self>> {
        chain
            .ready()
            .map_err(|err| StagedError::Precondition(err.to_string()))?;
        Ok(StagedOperation::new(Self {
            chain,
            to,
            data,
            state: TxState::Submit,
        }))
    }
}

#[async_trait::async_trait]
impl<C> Workflow for ApproveWorkflow<C>
where
    C: GovernanceChain,
{
    type Step = ApproveStep;

    async fn advance(&mut self) -> StagedResult<Option<ApproveStep>> {
        match std::mem::replace(&mut self.state, TxState::Finished) {
            TxState::Submit => {
                let tx_hash = self
                    .chain
                    .submit(self.to, U256::zero(), self.data.clone())
                    .await?;
                self.state = TxState::Confirm { tx_hash };
                Ok(Some(ApproveStep::Approving { tx_hash }))
            }
            TxState::Confirm { tx_hash } => {
                self.chain.confirm(tx_hash).await?;
                self.state = TxState::Finished;
                Ok(Some(ApproveStep::Done))
            }
            TxState::Finished => Ok(None),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecuteStep {
    Executing { tx_hash: H256 },
    Done,
}

/// 执行工作流：提交 execute 并等待确认。
pub struct ExecuteWorkflow<C> {
    chain: C,
    to: Address,
    data: Bytes,
    state: TxState,
}

impl<C> ExecuteWorkflow<C>
where
    C: GovernanceChain,
{
    pub fn new(chain: C, to: Address, data: Bytes) -> StagedResult<StagedOperation<Self>> {
        chain
            .ready()
            .map_err(|err| StagedError::Precondition(err.to_string()))?;
        Ok(StagedOperation::new(Self {
            chain,
            to,
            data,
            state: TxState::Submit,
        }))
    }
}

#[async_trait::async_trait]
impl<C> Workflow for ExecuteWorkflow<C>
where
    C: GovernanceChain,
{
    type Step = ExecuteStep;

    async fn advance(&mut self) -> StagedResult<Option<ExecuteStep>> {
        match std::mem::replace(&mut self.state, TxState::Finished) {
            TxState::Submit => {
                let tx_hash = self
                    .chain
                    .submit(self.to, U256::zero(), self.data.clone())
                    .await?;
                self.state = TxState::Confirm { tx_hash };
                Ok(Some(ExecuteStep::Executing { tx_hash }))
            }
            TxState::Confirm { tx_hash } => {
                self.chain.confirm(tx_hash).await?;
                self.state = TxState::Finished;
                Ok(Some(ExecuteStep::Done))
            }
            TxState::Finished => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use ethers::abi::Token;

    use super::super::testing::FakeChain;
    use super::*;
    use crate::codec::registries;

    #[tokio::test]
    async fn create_proposal_reports_the_composite_id() {
        let chain = FakeChain::new();
        let plugin = Address::from([0x31; 20]);
        let data = registries::multisig()
            .encode(
                "createProposal",
                &[
                    Token::Bytes(vec![0x01]),
                    Token::Array(Vec::new()),
                    Token::Uint(U256::zero()),
                    Token::Bool(false),
                    Token::Bool(false),
                    Token::Uint(U256::from(10u64)),
                    Token::Uint(U256::from(20u64)),
                ],
            )
            .expect("encode");
        let op = CreateProposalWorkflow::new(chain, plugin, data).expect("preconditions hold");
        let steps = op.drive().await.expect("workflow completes");
        assert_eq!(steps.len(), 2);
        assert!(matches!(steps[0], CreateProposalStep::Creating { .. }));
        match &steps[1] {
            CreateProposalStep::Done { proposal_id } => {
                assert_eq!(proposal_id, &encode_proposal_id(plugin, 1));
            }
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[tokio::test]
    async fn vote_runs_submit_then_confirm() {
        let chain = FakeChain::new();
        let plugin = Address::from([0x31; 20]);
        let data = registries::token_voting()
            .encode(
                "vote",
                &[
                    Token::Uint(U256::from(1u64)),
                    Token::Uint(U256::from(2u64)),
                    Token::Bool(false),
                ],
            )
            .expect("encode");
        let op = VoteWorkflow::new(chain, plugin, data).expect("preconditions hold");
        let steps = op.drive().await.expect("workflow completes");
        assert_eq!(steps.len(), 2);
        assert!(matches!(steps[0], VoteStep::Voting { .. }));
        assert_eq!(steps[1], VoteStep::Done);
    }

    #[tokio::test]
    async fn execute_runs_submit_then_confirm() {
        let chain = FakeChain::new();
        let plugin = Address::from([0x31; 20]);
        let data = registries::multisig()
            .encode("execute", &[Token::Uint(U256::from(1u64))])
            .expect("encode");
        let op = ExecuteWorkflow::new(chain, plugin, data).expect("preconditions hold");
        let steps = op.drive().await.expect("workflow completes");
        assert_eq!(steps.len(), 2);
        assert!(matches!(steps[0], ExecuteStep::Executing { .. }));
        assert_eq!(steps[1], ExecuteStep::Done);
    }

    #[tokio::test]
    async fn missing_signer_blocks_construction() {
        let chain = FakeChain::without_signer();
        let plugin = Address::from([0x31; 20]);
        let err = ExecuteWorkflow::new(chain, plugin, Bytes::new()).expect_err("no signer");
        assert!(matches!(err, StagedError::Precondition(_)));
    }
}
