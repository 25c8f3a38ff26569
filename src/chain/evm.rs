use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::Middleware;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, H256, U256};
use tracing::{debug, info};

use crate::backend::{BackendPool, ChainBackend};

use super::{ChainError, ChainResult, GovernanceChain, TxLog, TxReceipt};

/// 基于 ethers Provider 的链交互实现。每次调用都先经由后端池
/// 选中一个存活节点，再在其上发起请求。
pub struct EthersChain {
    pool: Arc<BackendPool<ChainBackend>>,
    wallet: Option<LocalWallet>,
    chain_id: u64,
    confirm_interval: Duration,
    confirm_timeout: Duration,
}

impl EthersChain {
    pub fn new(
        pool: Arc<BackendPool<ChainBackend>>,
        wallet: Option<LocalWallet>,
        chain_id: u64,
        confirm_interval: Duration,
        confirm_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            wallet,
            chain_id,
            confirm_interval,
            confirm_timeout,
        }
    }

    fn wallet(&self) -> ChainResult<LocalWallet> {
        self.wallet
            .as_ref()
            .map(|wallet| wallet.clone().with_chain_id(self.chain_id))
            .ok_or(ChainError::NoSigner)
    }

    fn request(&self, to: Address, value: U256, data: Bytes) -> Eip1559TransactionRequest {
        let mut request = Eip1559TransactionRequest::new().to(to).data(data);
        if !value.is_zero() {
            request = request.value(value);
        }
        request
    }
}

#[async_trait]
impl GovernanceChain for EthersChain {
    fn ready(&self) -> ChainResult<()> {
        self.pool.current()?;
        self.sender()?;
        Ok(())
    }

    fn sender(&self) -> ChainResult<Address> {
        self.wallet
            .as_ref()
            .map(|wallet| wallet.address())
            .ok_or(ChainError::NoSigner)
    }

    async fn call(&self, to: Address, data: Bytes) -> ChainResult<Bytes> {
        let backend = self.pool.ensure_online().await?;
        let tx: TypedTransaction = self.request(to, U256::zero(), data).into();
        backend
            .provider()
            .call(&tx, None)
            .await
            .map_err(|err| ChainError::Provider(err.to_string()))
    }

    async fn submit(&self, to: Address, value: U256, data: Bytes) -> ChainResult<H256> {
        let backend = self.pool.ensure_online().await?;
        let wallet = self.wallet()?;
        let client = SignerMiddleware::new(backend.provider().as_ref().clone(), wallet);
        let request = self.request(to, value, data).from(self.sender()?);
        let pending = client
            .send_transaction(request, None)
            .await
            .map_err(|err| ChainError::Provider(err.to_string()))?;
        let tx_hash = *pending;
        info!(
            target: "chain::evm",
            endpoint = %backend.url(),
            to = %to,
            tx_hash = ?tx_hash,
            "交易已提交"
        );
        Ok(tx_hash)
    }

    async fn confirm(&self, tx_hash: H256) -> ChainResult<TxReceipt> {
        let backend = self.pool.ensure_online().await?;
        let provider = backend.provider();
        let deadline = Instant::now() + self.confirm_timeout;
        loop {
            let receipt = provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|err| ChainError::Provider(err.to_string()))?;
            if let Some(receipt) = receipt {
                if receipt.status != Some(1u64.into()) {
                    return Err(ChainError::Reverted(tx_hash));
                }
                debug!(
                    target: "chain::evm",
                    tx_hash = ?tx_hash,
                    block = receipt.block_number.map(|n| n.as_u64()).unwrap_or_default(),
                    logs = receipt.logs.len(),
                    "交易已确认"
                );
                return Ok(TxReceipt {
                    tx_hash,
                    logs: receipt
                        .logs
                        .into_iter()
                        .map(|log| TxLog {
                            address: log.address,
                            topics: log.topics,
                            data: log.data.to_vec(),
                        })
                        .collect(),
                });
            }
            if Instant::now() > deadline {
                return Err(ChainError::ConfirmationTimeout {
                    tx_hash,
                    timeout_ms: self.confirm_timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.confirm_interval).await;
        }
    }

    async fn estimate_gas(&self, to: Address, value: U256, data: Bytes) -> ChainResult<U256> {
        let backend = self.pool.ensure_online().await?;
        let mut request = self.request(to, value, data);
        if let Ok(sender) = self.sender() {
            request = request.from(sender);
        }
        let tx: TypedTransaction = request.into();
        backend
            .provider()
            .estimate_gas(&tx, None)
            .await
            .map_err(|err| ChainError::Provider(err.to_string()))
    }

    async fn max_fee_per_gas(&self) -> ChainResult<U256> {
        let backend = self.pool.ensure_online().await?;
        let (max_fee, _priority_fee) = backend
            .provider()
            .estimate_eip1559_fees(None)
            .await
            .map_err(|_| ChainError::FeeDataUnavailable)?;
        Ok(max_fee)
    }
}
