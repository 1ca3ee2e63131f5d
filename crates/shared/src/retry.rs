//! 重试策略与执行器
//!
//! 提供指数退避重试机制，用于瞬时故障（可串行化事务冲突、连接池抖动等）
//! 的自动恢复。业务逻辑错误不应被重试——由调用方通过 `is_retryable` 闭包控制。

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// 重试策略配置
///
/// 使用指数退避避免重试风暴。默认值面向数据库事务冲突场景：
/// 冲突通常在毫秒级窗口内消散，等待过长反而放大尾延迟。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大重试次数（不含首次执行）
    pub max_retries: u32,
    /// 首次重试前的等待时间
    pub initial_delay: Duration,
    /// 退避时间上限
    pub max_delay: Duration,
    /// 每次重试的退避倍数
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// 计算第 N 次重试的等待时间（attempt 从 0 开始）
    ///
    /// 公式: initial_delay * multiplier^attempt，结果不超过 max_delay。
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let delay_ms = base_ms * self.multiplier.powi(attempt as i32);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// 是否应继续重试
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// 带重试的异步执行器
///
/// 对任意异步操作应用重试策略。仅在 `is_retryable` 判定为真的错误上重试，
/// 其余错误直接向上传播。
pub async fn retry_with_policy<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) && policy.should_retry(attempt) => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "操作失败，准备重试"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
