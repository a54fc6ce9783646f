use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::models::{ConnectionState, ConnectionStatus};

/// 默认最大重连次数
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// 服务连接状态管理器
///
/// 为每个服务维护 Online/Offline 状态与重连计数。状态在首次访问时创建，
/// 进入 Online 时重连计数清零。管理器本身不会报错，达到上限时
/// 只通过 `should_attempt_reconnect` 返回 false 告知调用方。
#[derive(Debug, Clone)]
pub struct ConnectionStateManager {
    states: Arc<RwLock<HashMap<String, ConnectionState>>>,
    max_reconnect_attempts: u32,
}

impl Default for ConnectionStateManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECONNECT_ATTEMPTS)
    }
}

impl ConnectionStateManager {
    pub fn new(max_reconnect_attempts: u32) -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            max_reconnect_attempts,
        }
    }

    pub fn max_reconnect_attempts(&self) -> u32 {
        self.max_reconnect_attempts
    }

    /// 设置服务状态；进入 Online 时清零重连计数和最近错误
    pub async fn set_state(&self, service: &str, status: ConnectionStatus) {
        let mut states = self.states.write().await;
        let state = states
            .entry(service.to_string())
            .or_insert_with(|| ConnectionState::new(service));

        let previous = state.status;
        state.status = status;
        state.updated_at = Utc::now();

        if status == ConnectionStatus::Online {
            state.reconnect_attempts = 0;
            state.last_error = None;
        }

        if previous != status {
            info!(service, from = %previous, to = %status, "服务连接状态变更");
        }
    }

    /// 获取服务状态，未出现过的服务视为 Offline
    pub async fn get_state(&self, service: &str) -> ConnectionStatus {
        let states = self.states.read().await;
        states
            .get(service)
            .map(|state| state.status)
            .unwrap_or(ConnectionStatus::Offline)
    }

    /// 获取服务的完整状态记录
    pub async fn snapshot(&self, service: &str) -> Option<ConnectionState> {
        let states = self.states.read().await;
        states.get(service).cloned()
    }

    /// 所有已知服务的状态
    pub async fn all_states(&self) -> Vec<ConnectionState> {
        let states = self.states.read().await;
        let mut all: Vec<_> = states.values().cloned().collect();
        all.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        all
    }

    /// 增加重连计数并返回新值，计数不会超过上限
    pub async fn increment_attempts(&self, service: &str) -> u32 {
        let mut states = self.states.write().await;
        let state = states
            .entry(service.to_string())
            .or_insert_with(|| ConnectionState::new(service));

        if state.reconnect_attempts >= self.max_reconnect_attempts {
            warn!(
                service,
                attempts = state.reconnect_attempts,
                "重连次数已达上限，不再累加"
            );
            return state.reconnect_attempts;
        }

        state.reconnect_attempts += 1;
        state.total_reconnects += 1;
        state.updated_at = Utc::now();
        debug!(
            service,
            attempts = state.reconnect_attempts,
            max = self.max_reconnect_attempts,
            "记录一次重连尝试"
        );
        state.reconnect_attempts
    }

    /// 是否还可以继续重连
    pub async fn should_attempt_reconnect(&self, service: &str) -> bool {
        let states = self.states.read().await;
        let attempts = states
            .get(service)
            .map(|state| state.reconnect_attempts)
            .unwrap_or(0);
        attempts < self.max_reconnect_attempts
    }

    /// 清零重连计数
    pub async fn reset_attempts(&self, service: &str) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(service) {
            state.reconnect_attempts = 0;
            state.updated_at = Utc::now();
        }
    }

    /// 标记为离线并记录错误
    pub async fn mark_offline(&self, service: &str, error: &str) {
        self.set_state(service, ConnectionStatus::Offline).await;
        self.record_error(service, error).await;
    }

    /// 记录最近一次错误，不改变状态
    pub async fn record_error(&self, service: &str, error: &str) {
        let mut states = self.states.write().await;
        let state = states
            .entry(service.to_string())
            .or_insert_with(|| ConnectionState::new(service));
        state.last_error = Some(error.to_string());
        state.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unseen_service_is_offline() {
        let manager = ConnectionStateManager::default();
        assert_eq!(manager.get_state("adspower").await, ConnectionStatus::Offline);
        assert!(manager.snapshot("adspower").await.is_none());
        assert!(manager.should_attempt_reconnect("adspower").await);
    }

    #[tokio::test]
    async fn test_reconnect_budget_and_online_reset() {
        let manager = ConnectionStateManager::new(5);

        for expected in 1..=5 {
            assert!(manager.should_attempt_reconnect("svc").await);
            assert_eq!(manager.increment_attempts("svc").await, expected);
        }
        assert!(!manager.should_attempt_reconnect("svc").await);

        manager.set_state("svc", ConnectionStatus::Online).await;
        let state = manager.snapshot("svc").await.unwrap();
        assert_eq!(state.reconnect_attempts, 0);
        assert_eq!(state.total_reconnects, 5);
        assert!(state.is_online());
        assert!(manager.should_attempt_reconnect("svc").await);
    }

    #[tokio::test]
    async fn test_attempts_never_exceed_maximum() {
        let manager = ConnectionStateManager::new(2);
        manager.increment_attempts("svc").await;
        manager.increment_attempts("svc").await;

        assert_eq!(manager.increment_attempts("svc").await, 2);
        let state = manager.snapshot("svc").await.unwrap();
        assert_eq!(state.reconnect_attempts, 2);
        assert_eq!(state.total_reconnects, 2);
    }

    #[tokio::test]
    async fn test_offline_keeps_attempts() {
        let manager = ConnectionStateManager::default();
        manager.increment_attempts("svc").await;
        manager.mark_offline("svc", "网络错误: connection refused").await;

        let state = manager.snapshot("svc").await.unwrap();
        assert_eq!(state.status, ConnectionStatus::Offline);
        assert_eq!(state.reconnect_attempts, 1);
        assert_eq!(
            state.last_error.as_deref(),
            Some("网络错误: connection refused")
        );

        manager.set_state("svc", ConnectionStatus::Online).await;
        assert!(manager.snapshot("svc").await.unwrap().last_error.is_none());
    }

    #[tokio::test]
    async fn test_reset_attempts_keeps_status() {
        let manager = ConnectionStateManager::default();
        manager.mark_offline("svc", "timeout").await;
        manager.increment_attempts("svc").await;
        manager.reset_attempts("svc").await;

        let state = manager.snapshot("svc").await.unwrap();
        assert_eq!(state.reconnect_attempts, 0);
        assert_eq!(state.status, ConnectionStatus::Offline);
    }

    #[tokio::test]
    async fn test_services_are_independent() {
        let manager = ConnectionStateManager::default();
        manager.set_state("a", ConnectionStatus::Online).await;
        manager.increment_attempts("b").await;

        assert_eq!(manager.get_state("a").await, ConnectionStatus::Online);
        assert_eq!(manager.get_state("b").await, ConnectionStatus::Offline);
        let ids: Vec<_> = manager
            .all_states()
            .await
            .into_iter()
            .map(|s| s.service_id)
            .collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }
}
