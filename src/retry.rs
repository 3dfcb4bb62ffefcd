//! 远程调用重试
//!
//! 翻译客户端本身不重试；流水线在调用客户端时按配置包一层指数退避重试，
//! 只对可重试的错误生效。

// 标准库导入
use std::future::Future;
use std::time::Duration;

// 第三方crate导入
use tokio::time::sleep;
use tracing::{debug, warn};

/// 重试配置
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// 最大尝试次数（包括第一次）
    pub max_attempts: u32,
    /// 第一次重试前的等待时间
    pub initial_delay: Duration,
    /// 两次重试之间的最长等待
    pub max_delay: Duration,
    /// 指数退避倍数
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// 创建重试配置
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }

    /// 根据“额外重试次数”创建：`0` 表示只调用一次
    ///
    /// 等待时间依次为 1s、2s、4s，上限 5s。
    pub fn with_retries(retries: usize) -> Self {
        let attempts = u32::try_from(retries).unwrap_or(u32::MAX).saturating_add(1);
        Self::new(attempts, Duration::from_secs(1))
    }

    /// 不重试
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// 计算第 `attempt` 次尝试（从0开始）前的等待时间
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);

        Duration::from_millis(delay_ms as u64).min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::none()
    }
}

/// 执行异步操作，失败且 `should_retry` 返回 true 时按配置重试
///
/// 返回成功结果，或最后一次的错误。
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let delay = config.delay_for_attempt(attempt);
        if !delay.is_zero() {
            debug!(
                "{}: 第 {}/{} 次尝试，等待 {:?}",
                operation_name,
                attempt + 1,
                max_attempts,
                delay
            );
            sleep(delay).await;
        }

        let error = match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{}: 第 {} 次尝试成功", operation_name, attempt + 1);
                }
                return Ok(result);
            }
            Err(e) => e,
        };

        if !should_retry(&error) {
            debug!("{}: 错误不可重试，立即失败: {}", operation_name, error);
            return Err(error);
        }

        let remaining = max_attempts - attempt - 1;
        if remaining == 0 {
            warn!(
                "{}: 全部 {} 次尝试失败，最后错误: {}",
                operation_name, max_attempts, error
            );
            return Err(error);
        }

        warn!(
            "🔄 {}: 第 {}/{} 次尝试失败 ({})，还剩 {} 次重试",
            operation_name,
            attempt + 1,
            max_attempts,
            error,
            remaining
        );
        attempt += 1;
    }
}
