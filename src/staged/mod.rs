use async_trait::async_trait;
use thiserror::Error;

use crate::chain::ChainError;
use crate::codec::CodecError;

pub mod allowance;
pub mod dao;
pub mod deposit;
pub mod proposal;
#[cfg(test)]
pub(crate) mod testing;

pub use allowance::{SetAllowanceParams, SetAllowanceStep, SetAllowanceWorkflow};
pub use dao::{CreateDaoParams, CreateDaoStep, CreateDaoWorkflow, PluginInstallRef};
pub use deposit::{DepositParams, DepositStep, DepositWorkflow};
pub use proposal::{
    ApproveStep, ApproveWorkflow, CreateProposalStep, CreateProposalWorkflow, ExecuteStep,
    ExecuteWorkflow, VoteStep, VoteWorkflow,
};

#[derive(Debug, Error)]
pub enum StagedError {
    #[error("前置条件不满足: {0}")]
    Precondition(String),
    #[error("链上观测结果与预期不符: {0}")]
    PostConditionMismatch(String),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("ABI 解码失败: {0}")]
    Abi(#[from] ethers::abi::Error),
}

pub type StagedResult<T> = Result<T, StagedError>;

/// 一个多交易工作流的状态机。每次 `advance` 至多发起一次挂起的网络
/// 调用，并产出一个里程碑；返回 `None` 表示上一步已是终点。
#[async_trait]
pub trait Workflow: Send {
    type Step: Send + std::fmt::Debug;

    async fn advance(&mut self) -> StagedResult<Option<Self::Step>>;
}

/// 拉取式的分阶段操作序列。单消费者、无预取：
/// 消费者不拉取，生产者就不做任何工作。
///
/// 终止或出错后序列熔断，后续拉取一律返回 `None`；
/// 已产出的里程碑是既成事实，失败不回滚（见各工作流的后置校验）。
pub struct StagedOperation<W: Workflow> {
    workflow: W,
    finished: bool,
}

impl<W: Workflow> std::fmt::Debug for StagedOperation<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedOperation")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<W: Workflow> StagedOperation<W> {
    pub(crate) fn new(workflow: W) -> Self {
        Self {
            workflow,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 拉取下一个里程碑。
    pub async fn next_step(&mut self) -> Option<StagedResult<W::Step>> {
        if self.finished {
            return None;
        }
        match self.workflow.advance().await {
            Ok(Some(step)) => Some(Ok(step)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }

    /// 一路拉到终点，收集全部里程碑。调用方若需要逐步上报进度，
    /// 应改用 [`StagedOperation::next_step`]。
    pub async fn drive(mut self) -> StagedResult<Vec<W::Step>> {
        let mut steps = Vec::new();
        while let Some(step) = self.next_step().await {
            steps.push(step?);
        }
        Ok(steps)
    }
}
