use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::cache_store::CacheStore;
use super::connection_state::ConnectionStateManager;
use super::retry_executor::{RetryExecutor, RetryPolicy, capped_backoff, sleep_or_cancel};
use crate::config::PollingConfig;
use crate::error::{AppError, AppResult};
use crate::models::{ConnectionStatus, ServiceStatus};
use crate::provider::StatusProvider;

/// 服务状态轮询器
///
/// 先查缓存，未命中时通过重试执行器访问状态提供者。重试耗尽后
/// 服务转为离线，并按退避间隔重新发起整轮查询，直到超过重连上限。
pub struct StatusPoller {
    provider: Arc<dyn StatusProvider>,
    cache: CacheStore<ServiceStatus>,
    connections: ConnectionStateManager,
    executor: RetryExecutor,
    reconnect_base_delay: Duration,
    reconnect_delay_cap: Duration,
    service_ttls: HashMap<String, Duration>,
}

impl StatusPoller {
    pub fn new(provider: Arc<dyn StatusProvider>, config: &PollingConfig) -> Self {
        Self {
            provider,
            cache: CacheStore::new(config.status_ttl()),
            connections: ConnectionStateManager::new(config.max_reconnect_attempts),
            executor: RetryExecutor::new(RetryPolicy::from_config(config)),
            reconnect_base_delay: config.base_delay(),
            reconnect_delay_cap: config.reconnect_delay_cap(),
            service_ttls: HashMap::new(),
        }
    }

    /// 使用外部共享的连接状态管理器
    pub fn with_connections(mut self, connections: ConnectionStateManager) -> Self {
        self.connections = connections;
        self
    }

    /// 为单个服务覆盖状态缓存时长
    pub fn with_service_ttl<T: Into<String>>(mut self, service_id: T, ttl: Duration) -> Self {
        self.service_ttls.insert(service_id.into(), ttl);
        self
    }

    pub fn cache(&self) -> &CacheStore<ServiceStatus> {
        &self.cache
    }

    pub fn connections(&self) -> &ConnectionStateManager {
        &self.connections
    }

    fn ttl_for(&self, service_id: &str) -> Duration {
        self.service_ttls
            .get(service_id)
            .copied()
            .unwrap_or_else(|| self.cache.default_ttl())
    }

    /// 丢弃服务的缓存状态，下次查询强制访问远端
    pub async fn invalidate(&self, service_id: &str) {
        self.cache.delete(service_id).await;
    }

    /// 查询服务状态
    pub async fn get_status(&self, service_id: &str, use_cache: bool) -> AppResult<ServiceStatus> {
        self.get_status_with_cancel(service_id, use_cache, &CancellationToken::new())
            .await
    }

    /// 查询服务状态，取消令牌触发时中止重试与重连等待
    pub async fn get_status_with_cancel(
        &self,
        service_id: &str,
        use_cache: bool,
        cancel: &CancellationToken,
    ) -> AppResult<ServiceStatus> {
        if use_cache {
            if let Some(status) = self.cache.get(service_id).await {
                debug!(service = %service_id, "命中状态缓存");
                return Ok(status);
            }
            debug!(service = %service_id, "状态缓存未命中");
        }

        loop {
            let provider = Arc::clone(&self.provider);
            let id = service_id.to_string();
            let result = self
                .executor
                .execute(service_id, cancel, move || {
                    let provider = Arc::clone(&provider);
                    let id = id.clone();
                    async move { provider.get_status(&id).await }
                })
                .await;

            let error = match result {
                Ok(status) => {
                    self.cache
                        .set(service_id, status.clone(), Some(self.ttl_for(service_id)))
                        .await;
                    self.connections
                        .set_state(service_id, ConnectionStatus::Online)
                        .await;
                    return Ok(status);
                }
                Err(error @ AppError::RetriesExhausted { .. }) => error,
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(error) => {
                    // 不可重试的错误只记录，不触发重连
                    self.connections
                        .record_error(service_id, &error.to_string())
                        .await;
                    return Err(error);
                }
            };

            self.connections
                .mark_offline(service_id, &error.root_cause().to_string())
                .await;

            if !self.connections.should_attempt_reconnect(service_id).await {
                let attempts = self
                    .connections
                    .snapshot(service_id)
                    .await
                    .map(|state| state.reconnect_attempts)
                    .unwrap_or_default();
                error!(service = %service_id, attempts, error = %error, "重连次数耗尽，服务保持离线");
                return Err(AppError::ReconnectExhausted {
                    service: service_id.to_string(),
                    attempts,
                    source: Box::new(error),
                });
            }

            let attempts = self.connections.increment_attempts(service_id).await;
            let delay = capped_backoff(self.reconnect_base_delay, attempts, self.reconnect_delay_cap);
            warn!(
                service = %service_id,
                attempt = attempts,
                max_attempts = self.connections.max_reconnect_attempts(),
                delay_ms = delay.as_millis() as u64,
                "服务离线，计划重连"
            );

            sleep_or_cancel(delay, cancel).await?;
            info!(service = %service_id, attempt = attempts, "开始重连");
        }
    }
}

impl std::fmt::Debug for StatusPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPoller")
            .field("connections", &self.connections)
            .field("executor", &self.executor)
            .field("reconnect_base_delay", &self.reconnect_base_delay)
            .field("reconnect_delay_cap", &self.reconnect_delay_cap)
            .field("service_ttls", &self.service_ttls)
            .finish_non_exhaustive()
    }
}
