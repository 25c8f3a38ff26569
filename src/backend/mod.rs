use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;
use tracing::debug;

pub mod chain;
pub mod graphql;
pub mod ipfs;

pub use chain::ChainBackend;
pub use graphql::GraphqlBackend;
pub use ipfs::IpfsBackend;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("未配置任何 {0} 后端")]
    NoBackendConfigured(&'static str),
    #[error("{0} 后端不足两个，无法轮换")]
    NoOtherBackend(&'static str),
    #[error("一整轮探测后没有可用的 {0} 后端")]
    NoBackendAvailable(&'static str),
}

pub type PoolResult<T> = Result<T, PoolError>;

/// 后端存活探测。探测失败一律折算为 `false`，不向外抛错。
#[async_trait]
pub trait Probe {
    async fn is_up(&self) -> bool;
}

/// 同类后端的有序集合，对外表现为单个逻辑句柄。
///
/// 活跃下标是会话级共享状态，只有 [`BackendPool::rotate`] 会修改它；
/// 设计假定同一时刻只有一个逻辑调用方驱动同一个客户端实例，
/// 因此这里不加锁（见 `ensure_online` 的粘性线性扫描）。
pub struct BackendPool<B> {
    label: &'static str,
    backends: Vec<B>,
    active: AtomicUsize,
}

impl<B> BackendPool<B> {
    pub fn new(label: &'static str, backends: Vec<B>) -> Self {
        let start = if backends.is_empty() {
            0
        } else {
            rand::rng().random_range(0..backends.len())
        };
        Self {
            label,
            backends,
            active: AtomicUsize::new(start),
        }
    }

    /// 固定起始下标的构造，轮换语义不变。
    pub fn with_start_index(label: &'static str, backends: Vec<B>, start: usize) -> Self {
        let start = if backends.is_empty() {
            0
        } else {
            start % backends.len()
        };
        Self {
            label,
            backends,
            active: AtomicUsize::new(start),
        }
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn active_index(&self) -> Option<usize> {
        if self.backends.is_empty() {
            None
        } else {
            Some(self.active.load(Ordering::Relaxed))
        }
    }

    /// 当前活跃后端。
    pub fn current(&self) -> PoolResult<&B> {
        if self.backends.is_empty() {
            return Err(PoolError::NoBackendConfigured(self.label));
        }
        let index = self.active.load(Ordering::Relaxed);
        Ok(&self.backends[index])
    }

    /// 切换到下一个后端，按插入顺序取模回绕。
    pub fn rotate(&self) -> PoolResult<()> {
        if self.backends.is_empty() {
            return Err(PoolError::NoBackendConfigured(self.label));
        }
        if self.backends.len() < 2 {
            return Err(PoolError::NoOtherBackend(self.label));
        }
        let previous = self.active.load(Ordering::Relaxed);
        let next = (previous + 1) % self.backends.len();
        self.active.store(next, Ordering::Relaxed);
        debug!(
            target: "backend::pool",
            pool = self.label,
            from = previous,
            to = next,
            "已轮换到下一个后端"
        );
        Ok(())
    }
}

impl<B> BackendPool<B>
where
    B: Probe + Sync,
{
    /// 从当前位置开始线性探测，至多一整圈；全部失败则报
    /// [`PoolError::NoBackendAvailable`]。成功选中的下标在后续调用间保留。
    pub async fn ensure_online(&self) -> PoolResult<&B> {
        if self.backends.is_empty() {
            return Err(PoolError::NoBackendConfigured(self.label));
        }
        for _ in 0..self.backends.len() {
            let backend = self.current()?;
            if backend.is_up().await {
                return self.current();
            }
            if self.backends.len() > 1 {
                self.rotate()?;
            }
        }
        Err(PoolError::NoBackendAvailable(self.label))
    }
}
