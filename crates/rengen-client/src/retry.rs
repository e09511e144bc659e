//! 请求重试策略
//!
//! 指数退避：默认最多3次尝试，间隔从1秒开始翻倍。
//! 只读请求在传输失败和5xx时重试；修改请求只在没有收到任何响应时重试，
//! 服务器已经拒绝的请求（包括校验错误）不会再次发送。

use rengen_core::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 总尝试次数（含第一次）
    pub max_attempts: u32,
    /// 第一次重试前的等待时间
    pub initial_delay: Duration,
    /// 每次重试的等待倍数
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, multiplier: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            multiplier: multiplier.max(1),
        }
    }

    /// 不重试
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, 1)
    }

    /// 第 `retry` 次重试（从0开始）之前的等待时间
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.initial_delay
            .saturating_mul(self.multiplier.saturating_pow(retry))
    }

    /// 按策略执行操作
    ///
    /// `operation` 收到当前尝试序号（从1开始），`on_retry` 在每次重试前调用。
    pub async fn run<T, F, Fut, R>(&self, idempotent: bool, mut operation: F, mut on_retry: R) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        R: FnMut(u32),
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && e.is_retryable(idempotent) => {
                    let delay = self.delay_for(attempt - 1);
                    warn!(
                        "Attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, self.max_attempts, e, delay
                    );
                    on_retry(attempt);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rengen_core::RengenError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::ZERO, 2)
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_read_retries_server_errors() {
        let calls = AtomicU32::new(0);
        let mut retries = 0;
        let result: Result<u32> = fast_policy()
            .run(
                true,
                |attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt < 3 {
                            Err(RengenError::Server { status: 502, detail: None })
                        } else {
                            Ok(attempt)
                        }
                    }
                },
                |_| retries += 1,
            )
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(retries, 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast_policy()
            .run(
                true,
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(RengenError::Transport("refused".to_string())) }
                },
                |_| {},
            )
            .await;

        assert!(matches!(result, Err(RengenError::Transport(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_mutation_not_retried_after_server_response() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast_policy()
            .run(
                false,
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(RengenError::Server { status: 500, detail: None }) }
                },
                |_| {},
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_validation_errors_never_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast_policy()
            .run(
                true,
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(RengenError::Server { status: 400, detail: Some("bad".to_string()) }) }
                },
                |_| {},
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
