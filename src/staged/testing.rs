//! Scripted chain double for workflow tests: replays submissions as receipts
//! with the logs a live node would attach, decoding the payloads through the
//! same registries the workflows encode with.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, H256, U256};

use crate::chain::{
    ChainError, ChainResult, GovernanceChain, TxLog, TxReceipt, event_topic, events,
};
use crate::codec::registries;

struct Submission {
    to: Address,
    data: Bytes,
}

struct Inner {
    signer: Option<Address>,
    allowances: Mutex<HashMap<(Address, Address), U256>>,
    submissions: Mutex<HashMap<H256, Submission>>,
    next_tx: AtomicU64,
    proposal_nonce: AtomicU64,
    deposited_override: Mutex<Option<U256>>,
    omit_deposit_log: AtomicBool,
    fee_data_unavailable: AtomicBool,
}

#[derive(Clone)]
pub(crate) struct FakeChain {
    inner: Arc<Inner>,
}

impl FakeChain {
    pub(crate) fn new() -> Self {
        Self::with_signer(Some(Address::from([0x5e; 20])))
    }

    pub(crate) fn without_signer() -> Self {
        Self::with_signer(None)
    }

    fn with_signer(signer: Option<Address>) -> Self {
        Self {
            inner: Arc::new(Inner {
                signer,
                allowances: Mutex::new(HashMap::new()),
                submissions: Mutex::new(HashMap::new()),
                next_tx: AtomicU64::new(1),
                proposal_nonce: AtomicU64::new(1),
                deposited_override: Mutex::new(None),
                omit_deposit_log: AtomicBool::new(false),
                fee_data_unavailable: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn set_allowance(&self, token: Address, spender: Address, amount: U256) {
        self.inner
            .allowances
            .lock()
            .expect("lock")
            .insert((token, spender), amount);
    }

    pub(crate) fn override_deposited_amount(&self, amount: U256) {
        *self.inner.deposited_override.lock().expect("lock") = Some(amount);
    }

    pub(crate) fn omit_deposit_log(&self) {
        self.inner.omit_deposit_log.store(true, Ordering::Relaxed);
    }

    pub(crate) fn set_fee_data_unavailable(&self) {
        self.inner
            .fee_data_unavailable
            .store(true, Ordering::Relaxed);
    }

    fn topic_of(address: Address) -> H256 {
        let mut raw = [0u8; 32];
        raw[12..].copy_from_slice(address.as_bytes());
        H256::from(raw)
    }

    fn receipt_for(&self, tx_hash: H256, submission: &Submission) -> ChainResult<TxReceipt> {
        let sender = self.sender()?;
        let data = submission.data.as_ref();

        if let Some(descriptor) = registries::erc20().identify(data) {
            if descriptor.name() == "approve" {
                let (_, args) = registries::erc20().decode(data)?;
                let (spender, amount) = match (&args[0], &args[1]) {
                    (Token::Address(spender), Token::Uint(amount)) => (*spender, *amount),
                    _ => unreachable!("approve args"),
                };
                self.set_allowance(submission.to, spender, amount);
                return Ok(TxReceipt {
                    tx_hash,
                    logs: vec![TxLog {
                        address: submission.to,
                        topics: vec![
                            event_topic(events::APPROVAL),
                            Self::topic_of(sender),
                            Self::topic_of(spender),
                        ],
                        data: abi::encode(&[Token::Uint(amount)]),
                    }],
                });
            }
        }

        if let Some(descriptor) = registries::dao().identify(data) {
            if descriptor.name() == "deposit" {
                if self.inner.omit_deposit_log.load(Ordering::Relaxed) {
                    return Ok(TxReceipt {
                        tx_hash,
                        logs: Vec::new(),
                    });
                }
                let (_, args) = registries::dao().decode(data)?;
                let (token, amount, reference) = match (&args[0], &args[1], &args[2]) {
                    (Token::Address(token), Token::Uint(amount), Token::String(reference)) => {
                        (*token, *amount, reference.clone())
                    }
                    _ => unreachable!("deposit args"),
                };
                let reported = self
                    .inner
                    .deposited_override
                    .lock()
                    .expect("lock")
                    .unwrap_or(amount);
                return Ok(TxReceipt {
                    tx_hash,
                    logs: vec![TxLog {
                        address: submission.to,
                        topics: vec![
                            event_topic(events::DEPOSITED),
                            Self::topic_of(sender),
                            Self::topic_of(token),
                        ],
                        data: abi::encode(&[Token::Uint(reported), Token::String(reference)]),
                    }],
                });
            }
        }

        let is_create_proposal = [registries::multisig(), registries::token_voting()]
            .iter()
            .any(|registry| {
                registry
                    .identify(data)
                    .map(|descriptor| descriptor.name() == "createProposal")
                    .unwrap_or(false)
            });
        if is_create_proposal {
            let nonce = self.inner.proposal_nonce.fetch_add(1, Ordering::Relaxed);
            return Ok(TxReceipt {
                tx_hash,
                logs: vec![TxLog {
                    address: submission.to,
                    topics: vec![
                        event_topic(events::PROPOSAL_CREATED),
                        H256::from_low_u64_be(nonce),
                        Self::topic_of(sender),
                    ],
                    data: Vec::new(),
                }],
            });
        }

        if let Some(descriptor) = registries::dao_factory().identify(data) {
            if descriptor.name() == "createDao" {
                let (_, args) = registries::dao_factory().decode(data)?;
                let plugin_count = match &args[1] {
                    Token::Array(plugins) => plugins.len(),
                    _ => 0,
                };
                let dao = Address::from([0xd0; 20]);
                let mut logs = vec![TxLog {
                    address: submission.to,
                    topics: vec![
                        event_topic(events::DAO_REGISTERED),
                        Self::topic_of(dao),
                        Self::topic_of(sender),
                    ],
                    data: Vec::new(),
                }];
                for index in 0..plugin_count {
                    let plugin = Address::from([0xe0 + index as u8; 20]);
                    logs.push(TxLog {
                        address: submission.to,
                        topics: vec![
                            event_topic(events::INSTALLATION_APPLIED),
                            Self::topic_of(dao),
                            Self::topic_of(plugin),
                        ],
                        data: Vec::new(),
                    });
                }
                return Ok(TxReceipt { tx_hash, logs });
            }
        }

        // vote / approve / execute and anything else confirm without logs the
        // workflows need to re-check
        Ok(TxReceipt {
            tx_hash,
            logs: Vec::new(),
        })
    }
}

#[async_trait]
impl GovernanceChain for FakeChain {
    fn ready(&self) -> ChainResult<()> {
        self.sender().map(|_| ())
    }

    fn sender(&self) -> ChainResult<Address> {
        self.inner.signer.ok_or(ChainError::NoSigner)
    }

    async fn call(&self, to: Address, data: Bytes) -> ChainResult<Bytes> {
        if let Some(descriptor) = registries::erc20().identify(data.as_ref()) {
            if descriptor.name() == "allowance" {
                let (_, args) = registries::erc20().decode(data.as_ref())?;
                let spender = match &args[1] {
                    Token::Address(spender) => *spender,
                    _ => unreachable!("allowance args"),
                };
                let allowance = self
                    .inner
                    .allowances
                    .lock()
                    .expect("lock")
                    .get(&(to, spender))
                    .copied()
                    .unwrap_or_default();
                return Ok(Bytes::from(abi::encode(&[Token::Uint(allowance)])));
            }
            if descriptor.name() == "balanceOf" {
                return Ok(Bytes::from(abi::encode(&[Token::Uint(U256::zero())])));
            }
        }
        Err(ChainError::Provider(format!(
            "unscripted call to {to:#x}"
        )))
    }

    async fn submit(&self, to: Address, _value: U256, data: Bytes) -> ChainResult<H256> {
        self.sender()?;
        let id = self.inner.next_tx.fetch_add(1, Ordering::Relaxed);
        let tx_hash = H256::from_low_u64_be(id);
        self.inner
            .submissions
            .lock()
            .expect("lock")
            .insert(tx_hash, Submission { to, data });
        Ok(tx_hash)
    }

    async fn confirm(&self, tx_hash: H256) -> ChainResult<TxReceipt> {
        let submissions = self.inner.submissions.lock().expect("lock");
        let submission = submissions
            .get(&tx_hash)
            .ok_or_else(|| ChainError::Provider(format!("unknown transaction {tx_hash:#x}")))?;
        let receipt = self.receipt_for(tx_hash, submission);
        drop(submissions);
        receipt
    }

    async fn estimate_gas(&self, _to: Address, _value: U256, _data: Bytes) -> ChainResult<U256> {
        Ok(U256::from(100_000u64))
    }

    async fn max_fee_per_gas(&self) -> ChainResult<U256> {
        if self.inner.fee_data_unavailable.load(Ordering::Relaxed) {
            return Err(ChainError::FeeDataUnavailable);
        }
        Ok(U256::from(2_000_000_000u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fees;

    #[tokio::test]
    async fn fee_estimate_honors_the_unavailable_flag() {
        let chain = FakeChain::new();
        let quote = fees::estimate(&chain, U256::from(100u64), 0.5)
            .await
            .expect("fee data available");
        assert!(quote.average <= quote.max);

        chain.set_fee_data_unavailable();
        let err = fees::estimate(&chain, U256::from(100u64), 0.5)
            .await
            .expect_err("fee data gone");
        assert!(matches!(err, ChainError::FeeDataUnavailable));
    }
}
