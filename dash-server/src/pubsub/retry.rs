//! 统一重连策略
//!
//! 启动连接、发布时的懒连接、relay 消费连接都使用同一个 [`RetryPolicy`]。

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// 固定间隔、有上限的重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
}

impl RetryPolicy {
    /// `max_attempts` 为 0 时按 1 次处理
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 执行 `op` 直到成功或用尽次数
    ///
    /// 每次尝试都会记录日志；两次尝试之间休眠 `interval`，最后一次失败后不再休眠。
    /// 失败时返回最后一次的错误和实际尝试次数。
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, (E, u32)>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            tracing::info!(
                attempt,
                max_attempts = self.max_attempts,
                "{} attempt",
                what
            );
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "{} succeeded after retry", what);
                    }
                    return Ok(value);
                }
                Err(e) if attempt >= self.max_attempts => {
                    tracing::error!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "{} failed, giving up",
                        what
                    );
                    return Err((e, attempt));
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        retry_in_ms = self.interval.as_millis() as u64,
                        error = %e,
                        "{} failed",
                        what
                    );
                    tokio::time::sleep(self.interval).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(3000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_on_nth_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<u32, (String, u32)> = policy
            .run("test", move |attempt| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if attempt < 3 {
                        Err(format!("refused #{attempt}"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let policy = RetryPolicy::new(4, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), (&str, u32)> = policy
            .run("test", move |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("refused")
                }
            })
            .await;
        assert_eq!(result.unwrap_err(), ("refused", 4));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }
}
