//! 同時実行数の制御
//!
//! tokio の Semaphore は公平（FIFO）なので、待ちは投入順に解放される。
//! 完了順は保証しない。

use crate::error::{HalfPortionError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

/// クローズ済みのリミッタに投入された
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterClosed;

impl ConcurrencyLimiter {
    pub fn new(max_concurrent: usize) -> Result<Self> {
        if max_concurrent == 0 {
            return Err(HalfPortionError::Config(
                "max_concurrent は1以上を指定してください".into(),
            ));
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// 実行中の件数
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.semaphore.available_permits()
    }

    /// 枠が空くまで待ってから `task` を実行する
    pub async fn run<F>(&self, task: F) -> std::result::Result<F::Output, LimiterClosed>
    where
        F: Future,
    {
        let _permit = self.semaphore.acquire().await.map_err(|_| LimiterClosed)?;
        Ok(task.await)
    }

    /// 以降の投入と待機中のタスクを打ち切る（実行中のものはそのまま完了する）
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}
