use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cache_store::CacheStore;
use super::status_poller::StatusPoller;
use crate::config::{Config, adspower::AdsPowerConfig};
use crate::error::{AppError, AppResult};
use crate::models::{BrowserConfig, BrowserType, ConnectionState, ServiceStatus};
use crate::path_validation::{
    FileSystem, LocalFileSystem, PathValidationConfig, PathValidator, ValidationReport,
};
use crate::provider::{AdsPowerClient, StatusProvider};

/// 启动浏览器前的预检结果
#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    pub browser_type: BrowserType,
    /// 是否可以按该配置启动浏览器
    pub ready: bool,
    pub message: String,
    /// local_custom 模式下的路径诊断
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    /// adspower 模式下的服务状态
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceStatus>,
}

/// 浏览器选择网关
///
/// 组合状态轮询器、路径校验器和校验结果缓存，对外提供浏览器选择功能
/// 需要的全部查询。所有轮询都挂在同一个根取消令牌下，`shutdown` 后
/// 未完成的重试与重连等待会立即结束。
pub struct BrowserGateway {
    poller: StatusPoller,
    validator: PathValidator,
    validation_cache: CacheStore<ValidationReport>,
    adspower: AdsPowerConfig,
    shutdown: CancellationToken,
}

impl BrowserGateway {
    /// 按配置创建网关，使用 AdsPower 本地API与本地文件系统
    pub fn from_config(config: &Config) -> AppResult<Self> {
        config.validate()?;
        let provider = AdsPowerClient::new(config.adspower.clone(), config.polling.request_timeout())?;
        info!(base_url = %provider.base_url(), "初始化浏览器网关");
        Ok(Self::new(
            config,
            Arc::new(provider),
            Arc::new(LocalFileSystem::new()),
        ))
    }

    pub fn new(
        config: &Config,
        provider: Arc<dyn StatusProvider>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        let mut poller = StatusPoller::new(provider, &config.polling);
        if let Some(ttl) = config.adspower.status_ttl() {
            poller = poller.with_service_ttl(config.adspower.service_id.clone(), ttl);
        }

        Self {
            poller,
            validator: PathValidator::new(fs, PathValidationConfig::from(&config.validation)),
            validation_cache: CacheStore::new(config.validation.validation_ttl()),
            adspower: config.adspower.clone(),
            shutdown: CancellationToken::new(),
        }
    }

    /// 替换路径校验配置（如目标平台）
    pub fn with_validation_config(mut self, config: PathValidationConfig) -> Self {
        self.validator = PathValidator::new(self.validator.file_system(), config);
        self
    }

    pub fn poller(&self) -> &StatusPoller {
        &self.poller
    }

    pub fn adspower_service_id(&self) -> &str {
        &self.adspower.service_id
    }

    /// 查询任意服务的状态
    pub async fn service_status(&self, service_id: &str, use_cache: bool) -> AppResult<ServiceStatus> {
        let cancel = self.shutdown.child_token();
        self.poller
            .get_status_with_cancel(service_id, use_cache, &cancel)
            .await
    }

    /// 查询 AdsPower 状态；未启用时直接返回不可用
    pub async fn adspower_status(&self, use_cache: bool) -> AppResult<ServiceStatus> {
        if !self.adspower.enabled {
            return Ok(ServiceStatus::unavailable("AdsPower集成未启用"));
        }
        self.service_status(&self.adspower.service_id, use_cache)
            .await
    }

    /// 查询 AdsPower 状态，失败时转换为不可用状态而不是错误
    pub async fn status_or_unavailable(&self, use_cache: bool) -> ServiceStatus {
        match self.adspower_status(use_cache).await {
            Ok(status) => status,
            Err(e) => {
                warn!(service = %self.adspower.service_id, error = %e, "AdsPower状态不可用");
                ServiceStatus::unavailable(describe_failure(&e))
            }
        }
    }

    /// 校验本地Chrome路径，结果按路径缓存
    pub async fn validate_chrome_path(
        &self,
        path: &str,
        use_cache: bool,
    ) -> AppResult<ValidationReport> {
        if use_cache {
            if let Some(report) = self.validation_cache.get(path).await {
                debug!(path, "命中路径校验缓存");
                return Ok(report);
            }
        }

        let report = self.validator.validate(path).await?;
        self.validation_cache
            .set(path, report.clone(), None)
            .await;
        Ok(report)
    }

    /// 启动前检查浏览器配置是否可用
    pub async fn preflight(&self, config: &BrowserConfig) -> AppResult<PreflightReport> {
        config.validate()?;

        let report = match config.browser_type {
            BrowserType::SkyvernDefault => PreflightReport {
                browser_type: config.browser_type,
                ready: true,
                message: "使用默认浏览器".to_string(),
                validation: None,
                service: None,
            },
            BrowserType::LocalCustom => {
                let path = config.chrome_path.as_deref().unwrap_or_default().trim();
                let validation = self.validate_chrome_path(path, true).await?;
                PreflightReport {
                    browser_type: config.browser_type,
                    ready: validation.valid,
                    message: validation.message.clone(),
                    validation: Some(validation),
                    service: None,
                }
            }
            BrowserType::AdsPower => {
                let user_id = config.adspower_user_id.as_deref().unwrap_or_default().trim();
                let status = self.status_or_unavailable(true).await;
                let (ready, message) = if !status.available {
                    (false, status.message.clone())
                } else if status.find_browser(user_id).is_none() {
                    (false, format!("未找到AdsPower浏览器: {}", user_id))
                } else {
                    (true, format!("AdsPower浏览器 {} 可用", user_id))
                };
                PreflightReport {
                    browser_type: config.browser_type,
                    ready,
                    message,
                    validation: None,
                    service: Some(status),
                }
            }
        };

        info!(
            browser_type = %report.browser_type,
            ready = report.ready,
            message = %report.message,
            "浏览器预检完成"
        );
        Ok(report)
    }

    /// 服务的连接状态
    pub async fn connection_state(&self, service_id: &str) -> Option<ConnectionState> {
        self.poller.connections().snapshot(service_id).await
    }

    /// 重连耗尽后由用户手动恢复：清零重连计数并丢弃缓存状态
    pub async fn reset_connection(&self, service_id: &str) {
        self.poller.connections().reset_attempts(service_id).await;
        self.poller.invalidate(service_id).await;
        info!(service = %service_id, "已重置服务连接");
    }

    /// 取消所有进行中的轮询
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("浏览器网关关闭，取消所有轮询");
            self.shutdown.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl std::fmt::Debug for BrowserGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserGateway")
            .field("poller", &self.poller)
            .field("validator", &self.validator)
            .field("adspower", &self.adspower)
            .field("shut_down", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// 面向用户的失败说明
fn describe_failure(error: &AppError) -> String {
    match error {
        AppError::ReconnectExhausted { attempts, .. } => format!(
            "AdsPower服务已离线（重连 {} 次失败）: {}",
            attempts,
            describe_failure(error.root_cause())
        ),
        AppError::RetriesExhausted { .. } => describe_failure(error.root_cause()),
        AppError::Timeout { .. } => "AdsPower连接超时，请检查客户端是否启动".to_string(),
        AppError::Network(msg) => msg.clone(),
        AppError::Cancelled => "AdsPower状态查询已取消".to_string(),
        other => format!("AdsPower服务响应异常: {}", other),
    }
}
