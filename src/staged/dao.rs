use ethers::abi::Token;
use ethers::types::{Address, Bytes, H256, U256};
use tracing::info;

use crate::chain::{self, GovernanceChain, event_topic, find_log, topic_to_address};
use crate::codec::registries;

use super::{StagedError, StagedOperation, StagedResult, Workflow};

/// 要随组织一起安装的治理插件版本引用。
#[derive(Clone, Debug)]
pub struct PluginInstallRef {
    pub repo: Address,
    pub release: u8,
    pub build: u16,
    pub data: Bytes,
}

#[derive(Clone, Debug)]
pub struct CreateDaoParams {
    pub trusted_forwarder: Address,
    pub dao_uri: String,
    pub subdomain: String,
    pub metadata: Bytes,
    pub plugins: Vec<PluginInstallRef>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreateDaoStep {
    Creating {
        tx_hash: H256,
    },
    Done {
        dao: Address,
        plugins: Vec<Address>,
    },
}

enum State {
    Submit,
    Confirm { tx_hash: H256 },
    Finished,
}

/// 建组织工作流：提交 createDao，随后从注册事件里取回新组织地址
/// 与已安装插件地址。
pub struct CreateDaoWorkflow<C> {
    chain: C,
    factory: Address,
    params: CreateDaoParams,
    state: State,
}

impl<C> CreateDaoWorkflow<C>
where
    C: GovernanceChain,
{
    pub fn new(
        chain: C,
        factory: Address,
        params: CreateDaoParams,
    ) -> StagedResult<StagedOperation<Self>> {
        chain
            .ready()
            .map_err(|err| StagedError::Precondition(err.to_string()))?;
        if params.plugins.is_empty() {
            return Err(StagedError::Precondition(
                "至少需要安装一个治理插件".to_string(),
            ));
        }
        Ok(StagedOperation::new(Self {
            chain,
            factory,
            params,
            state: State::Submit,
        }))
    }

    fn payload(&self) -> StagedResult<Bytes> {
        let settings = Token::Tuple(vec![
            Token::Address(self.params.trusted_forwarder),
            Token::String(self.params.dao_uri.clone()),
            Token::String(self.params.subdomain.clone()),
            Token::Bytes(self.params.metadata.to_vec()),
        ]);
        let plugins = Token::Array(
            self.params
                .plugins
                .iter()
                .map(|plugin| {
                    Token::Tuple(vec![
                        Token::Tuple(vec![
                            Token::Tuple(vec![
                                Token::Uint(U256::from(plugin.release)),
                                Token::Uint(U256::from(plugin.build)),
                            ]),
                            Token::Address(plugin.repo),
                        ]),
                        Token::Bytes(plugin.data.to_vec()),
                    ])
                })
                .collect(),
        );
        Ok(registries::dao_factory().encode("createDao", &[settings, plugins])?)
    }
}

#[async_trait::async_trait]
impl<C> Workflow for CreateDaoWorkflow<C>
where
    C: GovernanceChain,
{
    type Step = CreateDaoStep;

    async fn advance(&mut self) -> StagedResult<Option<CreateDaoStep>> {
        match std::mem::replace(&mut self.state, State::Finished) {
            State::Submit => {
                let data = self.payload()?;
                let tx_hash = self.chain.submit(self.factory, U256::zero(), data).await?;
                self.state = State::Confirm { tx_hash };
                Ok(Some(CreateDaoStep::Creating { tx_hash }))
            }
            State::Confirm { tx_hash } => {
                let receipt = self.chain.confirm(tx_hash).await?;
                let registered = find_log(
                    &receipt,
                    None,
                    event_topic(chain::events::DAO_REGISTERED),
                )
                .ok_or_else(|| {
                    StagedError::PostConditionMismatch(
                        "建组织回执中缺少 DAORegistered 事件".to_string(),
                    )
                })?;
                let dao = registered
                    .topics
                    .get(1)
                    .map(topic_to_address)
                    .ok_or_else(|| {
                        StagedError::PostConditionMismatch(
                            "DAORegistered 事件缺少组织地址".to_string(),
                        )
                    })?;

                let installed_topic = event_topic(chain::events::INSTALLATION_APPLIED);
                let plugins: Vec<Address> = receipt
                    .logs
                    .iter()
                    .filter(|log| log.topics.first() == Some(&installed_topic))
                    .filter_map(|log| log.topics.get(2).map(topic_to_address))
                    .collect();
                if plugins.len() != self.params.plugins.len() {
                    return Err(StagedError::PostConditionMismatch(format!(
                        "插件安装事件数量 {} 与请求的 {} 不一致",
                        plugins.len(),
                        self.params.plugins.len()
                    )));
                }
                info!(
                    target: "staged::dao",
                    dao = %dao,
                    plugins = plugins.len(),
                    "组织创建完成"
                );
                self.state = State::Finished;
                Ok(Some(CreateDaoStep::Done { dao, plugins }))
            }
            State::Finished => Ok(None),
        }
    }
}
