use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::backend::{BackendPool, IpfsBackend, PoolError};

#[derive(Debug, Error)]
pub enum IpfsError {
    #[error("内容存储请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("内容存储节点 {endpoint} 返回状态码 {status}")]
    Status { endpoint: String, status: StatusCode },
    #[error("解析内容存储响应失败: {0}")]
    Schema(String),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl IpfsError {
    /// 传输层错误和 5xx 视作节点问题，允许换节点重试；
    /// 其余错误由请求本身造成，立即上抛。
    fn is_retryable(&self) -> bool {
        match self {
            IpfsError::Http(_) => true,
            IpfsError::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

pub type IpfsResult<T> = Result<T, IpfsError>;

/// 在池内逐节点重试一次操作，至多一整圈；不可重试的错误直接上抛。
pub(crate) async fn run_with_rotation<B, T, F>(pool: &BackendPool<B>, op: F) -> IpfsResult<T>
where
    F: for<'a> Fn(&'a B) -> BoxFuture<'a, IpfsResult<T>>,
{
    let attempts = pool.len();
    let mut last_error: Option<IpfsError> = None;
    for _ in 0..attempts {
        let backend = pool.current()?;
        match op(backend).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                warn!(target: "ipfs", error = %err, "内容存储节点请求失败，尝试下一个");
                last_error = Some(err);
                if pool.len() > 1 {
                    pool.rotate()?;
                }
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        // attempts == 0 时 current() 已经报过错，这里只剩空池一种可能
        PoolError::NoBackendConfigured("ipfs").into()
    }))
}

/// 内容寻址存储模块：上传、固定与取回元数据。
pub struct IpfsModule {
    pool: Arc<BackendPool<IpfsBackend>>,
}

impl IpfsModule {
    pub fn new(pool: Arc<BackendPool<IpfsBackend>>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &BackendPool<IpfsBackend> {
        &self.pool
    }

    pub async fn ensure_online(&self) -> IpfsResult<()> {
        self.pool.ensure_online().await?;
        Ok(())
    }

    pub async fn add(&self, payload: Vec<u8>) -> IpfsResult<String> {
        run_with_rotation(&self.pool, |backend| Box::pin(backend.add(payload.clone()))).await
    }

    pub async fn pin(&self, cid: &str) -> IpfsResult<Vec<String>> {
        run_with_rotation(&self.pool, |backend| {
            let cid = cid.to_owned();
            Box::pin(async move { backend.pin(&cid).await })
        })
        .await
    }

    pub async fn fetch_bytes(&self, cid: &str) -> IpfsResult<Vec<u8>> {
        run_with_rotation(&self.pool, |backend| {
            let cid = cid.to_owned();
            Box::pin(async move { backend.cat(&cid).await })
        })
        .await
    }

    pub async fn fetch_string(&self, cid: &str) -> IpfsResult<String> {
        let bytes = self.fetch_bytes(cid).await?;
        String::from_utf8(bytes)
            .map_err(|err| IpfsError::Schema(format!("内容不是合法的 UTF-8: {err}")))
    }

    /// 序列化元数据，上传并固定，返回 `ipfs://<cid>` 形式的 URI。
    pub async fn pin_metadata<T>(&self, metadata: &T) -> IpfsResult<String>
    where
        T: Serialize,
    {
        let payload = serde_json::to_vec(metadata)
            .map_err(|err| IpfsError::Schema(format!("元数据序列化失败: {err}")))?;
        let cid = self.add(payload).await?;
        self.pin(&cid).await?;
        Ok(format!("ipfs://{cid}"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct ScriptedBackend {
        /// 前几次调用失败（可重试）。
        failures_before_success: usize,
        retryable: bool,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn run(&self) -> IpfsResult<&'static str> {
            let call = self.calls.fetch_add(1, Ordering::Relaxed);
            if call < self.failures_before_success {
                if self.retryable {
                    Err(IpfsError::Status {
                        endpoint: "http://node.invalid/api/v0/add".to_string(),
                        status: StatusCode::BAD_GATEWAY,
                    })
                } else {
                    Err(IpfsError::Status {
                        endpoint: "http://node.invalid/api/v0/add".to_string(),
                        status: StatusCode::BAD_REQUEST,
                    })
                }
            } else {
                Ok("QmScripted")
            }
        }
    }

    fn pool_of(backends: Vec<ScriptedBackend>) -> BackendPool<ScriptedBackend> {
        BackendPool::with_start_index("ipfs", backends, 0)
    }

    #[tokio::test]
    async fn rotation_retries_server_failures_once_per_backend() {
        let pool = pool_of(vec![
            ScriptedBackend {
                failures_before_success: 1,
                retryable: true,
                calls: AtomicUsize::new(0),
            },
            ScriptedBackend {
                failures_before_success: 0,
                retryable: true,
                calls: AtomicUsize::new(0),
            },
        ]);
        let result = run_with_rotation(&pool, |backend| {
            Box::pin(async move { backend.run() })
        })
        .await
        .expect("second backend answers");
        assert_eq!(result, "QmScripted");
        assert_eq!(pool.active_index(), Some(1));
    }

    #[tokio::test]
    async fn rotation_stops_after_one_full_cycle() {
        let pool = pool_of(vec![
            ScriptedBackend {
                failures_before_success: 9,
                retryable: true,
                calls: AtomicUsize::new(0),
            },
            ScriptedBackend {
                failures_before_success: 9,
                retryable: true,
                calls: AtomicUsize::new(0),
            },
        ]);
        let err = run_with_rotation(&pool, |backend| {
            Box::pin(async move { backend.run() })
        })
        .await
        .expect_err("every backend fails");
        assert!(matches!(err, IpfsError::Status { .. }));
        // one attempt per backend, no second cycle
        for backend in [pool.current().expect("backend")] {
            assert!(backend.calls.load(Ordering::Relaxed) <= 1);
        }
    }

    #[tokio::test]
    async fn client_errors_surface_without_rotation() {
        let pool = pool_of(vec![
            ScriptedBackend {
                failures_before_success: 1,
                retryable: false,
                calls: AtomicUsize::new(0),
            },
            ScriptedBackend {
                failures_before_success: 0,
                retryable: true,
                calls: AtomicUsize::new(0),
            },
        ]);
        let err = run_with_rotation(&pool, |backend| {
            Box::pin(async move { backend.run() })
        })
        .await
        .expect_err("4xx is not retried");
        assert!(matches!(
            err,
            IpfsError::Status { status, .. } if status == StatusCode::BAD_REQUEST
        ));
        assert_eq!(pool.active_index(), Some(0));
    }

    #[tokio::test]
    async fn empty_pool_reports_configuration_error() {
        let pool: BackendPool<ScriptedBackend> = BackendPool::new("ipfs", Vec::new());
        let err = run_with_rotation(&pool, |backend| Box::pin(async move { backend.run() }))
            .await
            .expect_err("no backend configured");
        assert!(matches!(
            err,
            IpfsError::Pool(PoolError::NoBackendConfigured("ipfs"))
        ));
    }
}
