use async_trait::async_trait;
use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;
use thiserror::Error;

use crate::backend::PoolError;
use crate::codec::{CodecError, registries};

pub mod evm;

pub use evm::EthersChain;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("未配置签名密钥")]
    NoSigner,
    #[error("RPC 请求失败: {0}")]
    Provider(String),
    #[error("交易 {tx_hash:#x} 在 {timeout_ms} 毫秒内未确认")]
    ConfirmationTimeout { tx_hash: H256, timeout_ms: u64 },
    #[error("交易 {0:#x} 执行回滚")]
    Reverted(H256),
    #[error("链上费率数据不可用")]
    FeeDataUnavailable,
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("ABI 解码失败: {0}")]
    Abi(#[from] ethers::abi::Error),
}

pub type ChainResult<T> = Result<T, ChainError>;

/// 已确认交易携带的单条日志。
#[derive(Clone, Debug)]
pub struct TxLog {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
}

/// 确认回执，只保留工作流需要核对的部分。
#[derive(Clone, Debug)]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub logs: Vec<TxLog>,
}

/// 到链的最小交互面。工作流只依赖这个 trait，
/// 测试用脚本化实现替换真实后端。
#[async_trait]
pub trait GovernanceChain: Send + Sync {
    /// 同步前置检查：签名者与后端配置齐备才允许启动工作流。
    /// 不发起任何网络请求。
    fn ready(&self) -> ChainResult<()> {
        self.sender().map(|_| ())
    }

    /// 已配置签名者的地址。
    fn sender(&self) -> ChainResult<Address>;

    /// 只读合约调用，返回原始返回值字节。
    async fn call(&self, to: Address, data: Bytes) -> ChainResult<Bytes>;

    /// 签名并提交一笔交易，返回交易哈希。
    async fn submit(&self, to: Address, value: U256, data: Bytes) -> ChainResult<H256>;

    /// 等待交易确认并返回回执。
    async fn confirm(&self, tx_hash: H256) -> ChainResult<TxReceipt>;

    /// 预估一笔交易的 gas 用量。
    async fn estimate_gas(&self, to: Address, value: U256, data: Bytes) -> ChainResult<U256>;

    /// 当前网络的最大单位费率。
    async fn max_fee_per_gas(&self) -> ChainResult<U256>;
}

/// Canonical event signatures the workflows verify receipts against.
pub mod events {
    pub const DEPOSITED: &str = "Deposited(address,address,uint256,string)";
    pub const APPROVAL: &str = "Approval(address,address,uint256)";
    pub const DAO_REGISTERED: &str = "DAORegistered(address,address,string)";
    pub const INSTALLATION_APPLIED: &str =
        "InstallationApplied(address,address,bytes32,bytes32)";
    pub const PROPOSAL_CREATED: &str =
        "ProposalCreated(uint256,address,uint64,uint64,bytes,(address,uint256,bytes)[],uint256)";
}

pub fn event_topic(signature: &str) -> H256 {
    H256::from(keccak256(signature.as_bytes()))
}

/// 在回执中查找指定合约发出的指定事件。
pub fn find_log<'a>(
    receipt: &'a TxReceipt,
    emitter: Option<Address>,
    topic0: H256,
) -> Option<&'a TxLog> {
    receipt.logs.iter().find(|log| {
        log.topics.first() == Some(&topic0)
            && emitter.map(|address| log.address == address).unwrap_or(true)
    })
}

pub fn topic_to_address(topic: &H256) -> Address {
    Address::from_slice(&topic.as_bytes()[12..])
}

/// 查询 ERC-20 授权额度，经由动作编解码器构造调用数据。
pub async fn erc20_allowance<C>(
    chain: &C,
    token: Address,
    owner: Address,
    spender: Address,
) -> ChainResult<U256>
where
    C: GovernanceChain + ?Sized,
{
    let data = registries::erc20().encode(
        "allowance",
        &[Token::Address(owner), Token::Address(spender)],
    )?;
    let raw = chain.call(token, data).await?;
    let mut tokens = abi::decode(&[ParamType::Uint(256)], &raw)?;
    match tokens.pop() {
        Some(Token::Uint(allowance)) => Ok(allowance),
        _ => Err(ChainError::Abi(ethers::abi::Error::InvalidData)),
    }
}
