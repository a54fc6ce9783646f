use crate::config::PollingConfig;
use crate::error::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 重试判定函数
pub type RetryPredicate = fn(&AppError) -> bool;

/// 默认重试判定：无响应、超时、5xx、429 可重试
pub fn default_should_retry(error: &AppError) -> bool {
    error.is_retryable()
}

/// 指数退避：`min(base * 2^exponent, cap)`
pub fn capped_backoff(base: Duration, exponent: u32, cap: Duration) -> Duration {
    let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(cap)
}

/// 等待指定时长，取消时立即返回 `Cancelled`
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> AppResult<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        _ = sleep(delay) => Ok(()),
    }
}

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 首次失败后的最大重试次数
    pub max_retries: u32,
    /// 初始退避时间
    pub base_delay: Duration,
    /// 退避上限
    pub max_delay: Duration,
    /// 单次尝试超时
    pub attempt_timeout: Option<Duration>,
    /// 添加随机抖动以避免惊群效应
    pub jitter: bool,
    /// 判定错误是否可重试
    pub should_retry: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&PollingConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &PollingConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
            max_delay: config.reconnect_delay_cap(),
            attempt_timeout: Some(config.request_timeout()),
            jitter: config.jitter,
            should_retry: default_should_retry,
        }
    }

    pub fn with_predicate(mut self, should_retry: RetryPredicate) -> Self {
        self.should_retry = should_retry;
        self
    }

    /// 第 `retry_index` 次重试前的等待时间（从0开始）
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        capped_backoff(self.base_delay, retry_index, self.max_delay)
    }
}

/// 单次执行的重试上下文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryContext {
    /// 当前尝试序号（从1开始）
    pub attempt: u32,
    /// 最大尝试次数（含首次）
    pub max_attempts: u32,
    /// 下次重试前的等待时间
    pub delay: Duration,
}

/// 通用的重试执行器
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 执行带重试的异步操作
    ///
    /// 不可重试的错误原样返回；重试次数耗尽时返回 `RetriesExhausted`，
    /// 其中携带最后一次的错误。
    pub async fn execute<F, Fut, T>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        operation: F,
    ) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        self.execute_with_policy(label, &self.policy, cancel, operation)
            .await
    }

    /// 使用单次调用指定的策略执行
    pub async fn execute_with_policy<F, Fut, T>(
        &self,
        label: &str,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut ctx = RetryContext {
            attempt: 1,
            max_attempts: policy.max_retries.saturating_add(1),
            delay: policy.base_delay.min(policy.max_delay),
        };

        loop {
            debug!(
                label,
                attempt = ctx.attempt,
                max_attempts = ctx.max_attempts,
                "开始执行"
            );

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                result = run_attempt(policy.attempt_timeout, operation()) => result,
            };

            let error = match outcome {
                Ok(value) => {
                    if ctx.attempt > 1 {
                        info!(label, attempt = ctx.attempt, "在第 {} 次尝试后成功", ctx.attempt);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !(policy.should_retry)(&error) {
                warn!(label, attempt = ctx.attempt, error = %error, "遇到不可重试错误");
                return Err(error);
            }

            if ctx.attempt >= ctx.max_attempts {
                error!(
                    label,
                    attempts = ctx.attempt,
                    error = %error,
                    "达到最大重试次数，最终失败"
                );
                return Err(AppError::RetriesExhausted {
                    attempts: ctx.attempt,
                    source: Box::new(error),
                });
            }

            let delay = if policy.jitter {
                add_jitter(ctx.delay).min(policy.max_delay)
            } else {
                ctx.delay
            };

            warn!(
                label,
                attempt = ctx.attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "尝试失败，稍后重试"
            );

            sleep_or_cancel(delay, cancel).await?;

            ctx.delay = policy.delay_for(ctx.attempt);
            ctx.attempt += 1;
        }
    }
}

async fn run_attempt<Fut, T>(limit: Option<Duration>, attempt: Fut) -> AppResult<T>
where
    Fut: Future<Output = AppResult<T>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, attempt).await {
            Ok(result) => result,
            Err(_) => Err(AppError::timeout(limit)),
        },
        None => attempt.await,
    }
}

fn add_jitter(base: Duration) -> Duration {
    let jitter_range = base.as_millis() as f64 * 0.1; // 10% 抖动
    let jitter = rand::random::<f64>() * jitter_range.max(1.0);
    base + Duration::from_millis(jitter as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            attempt_timeout: Some(Duration::from_secs(5)),
            jitter: false,
            should_retry: default_should_retry,
        }
    }

    #[test]
    fn test_capped_backoff() {
        let base = Duration::from_secs(1);
        let cap = Duration::from_secs(30);
        assert_eq!(capped_backoff(base, 0, cap), Duration::from_secs(1));
        assert_eq!(capped_backoff(base, 1, cap), Duration::from_secs(2));
        assert_eq!(capped_backoff(base, 4, cap), Duration::from_secs(16));
        assert_eq!(capped_backoff(base, 5, cap), cap);
        assert_eq!(capped_backoff(base, 40, cap), cap);
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let base = Duration::from_millis(1000);
        for _ in 0..100 {
            let jittered = add_jitter(base);
            assert!(jittered >= base);
            assert!(jittered <= Duration::from_millis(1100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_jittered_delay_never_exceeds_cap() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(RetryPolicy {
            max_delay: Duration::from_millis(1000),
            jitter: true,
            ..policy(3)
        });
        let started = tokio::time::Instant::now();

        let result: AppResult<()> = executor
            .execute("jitter", &CancellationToken::new(), || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::network("connection reset"))
                }
            })
            .await;

        assert!(matches!(result, Err(AppError::RetriesExhausted { attempts: 4, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 3 次退避都被限制在 1s 以内
        assert!(started.elapsed() <= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_call_policy_overrides_default() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(policy(3));

        let result: AppResult<()> = executor
            .execute_with_policy("single-shot", &policy(0), &CancellationToken::new(), || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::from_status(502, "bad gateway"))
                }
            })
            .await;

        assert!(matches!(result, Err(AppError::RetriesExhausted { attempts: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(executor.policy().max_retries, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_attempts_max_retries_plus_one() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(policy(3).with_predicate(|_| true));

        let result: AppResult<()> = executor
            .execute("permanent", &CancellationToken::new(), || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::validation("always broken"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(AppError::RetriesExhausted { attempts, source }) => {
                assert_eq!(attempts, 4);
                assert!(matches!(*source, AppError::Validation(_)));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(policy(3));

        let result: AppResult<()> = executor
            .execute("not-found", &CancellationToken::new(), || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::from_status(404, "no such endpoint"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(AppError::RemoteClient { status: 404, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_between_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(policy(3));
        let started = tokio::time::Instant::now();

        let result = executor
            .execute("flaky", &CancellationToken::new(), || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 4 {
                        Err(AppError::from_status(503, "busy"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 4);
        // 1s + 2s + 4s
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(policy(3));

        let result = executor
            .execute("rate-limited", &CancellationToken::new(), || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(AppError::from_status(429, "slow down"))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_is_retryable() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(policy(1));

        let result: AppResult<()> = executor
            .execute("hanging", &CancellationToken::new(), || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        match result {
            Err(AppError::RetriesExhausted { source, .. }) => {
                assert!(matches!(*source, AppError::Timeout { timeout_ms: 5000 }));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_pending_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(policy(10));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(1500)).await;
            trigger.cancel();
        });

        let result: AppResult<()> = executor
            .execute("cancelled", &cancel, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::network("connection refused"))
                }
            })
            .await;

        assert!(matches!(result, Err(AppError::Cancelled)));
        // 第一次失败后等待1秒，第二次失败后在2秒退避中被取消
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_operation() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: AppResult<()> = RetryExecutor::new(policy(3))
            .execute("skipped", &cancel, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert!(matches!(result, Err(AppError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
