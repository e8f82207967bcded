//! 指数バックオフ付きリトライポリシー

use super::ClassifyError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 一時的エラーを含む総試行回数の上限
    pub max_attempts: u32,
    /// レスポンス形式エラーに許す試行回数
    pub format_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// 待ち時間に掛ける揺らぎ幅（0.1 = ±10%）
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            format_attempts: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// 待ち時間なしのポリシー
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
            ..Default::default()
        }
    }

    /// `attempt` 回目の失敗後の待ち時間（揺らぎなし）。1回目は base_delay
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// 揺らぎを加えた待ち時間
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        if self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }

        let spread = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        delay.mul_f64((1.0 + spread).max(0.0))
    }

    /// `attempts` 回試行した後のエラーが再試行対象か
    ///
    /// 形式エラーは `format_attempts` の枠内でのみ再試行し、総試行回数は常に `max_attempts` 以下
    pub fn should_retry(&self, err: &ClassifyError, attempts: u32, format_failures: u32) -> bool {
        if !err.is_retryable() || attempts >= self.max_attempts {
            return false;
        }
        match err {
            ClassifyError::ResponseFormat(_) => format_failures < self.format_attempts,
            _ => true,
        }
    }

    /// 操作をポリシーに従って実行する。引数は1始まりの試行番号
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ClassifyError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ClassifyError>>,
    {
        let mut attempts = 0;
        let mut format_failures = 0;

        loop {
            attempts += 1;
            let err = match op(attempts).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if matches!(err, ClassifyError::ResponseFormat(_)) {
                format_failures += 1;
            }

            if !self.should_retry(&err, attempts, format_failures) {
                return Err(err);
            }

            let wait = self.delay_for(attempts);
            tracing::warn!(
                attempt = attempts,
                wait_ms = wait.as_millis() as u64,
                error = %err,
                "再試行します"
            );
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }
    }
}
