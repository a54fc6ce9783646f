use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::StatusProvider;
use crate::{
    config::adspower::AdsPowerConfig,
    error::{AppError, AppResult},
    models::{BrowserInfo, ServiceStatus},
};

/// AdsPower 接口通用响应包装
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct UserListData {
    #[serde(default)]
    list: Vec<BrowserInfo>,
}

/// AdsPower 本地API客户端
#[derive(Debug, Clone)]
pub struct AdsPowerClient {
    http: Client,
    config: AdsPowerConfig,
    request_timeout: Duration,
}

impl AdsPowerClient {
    pub fn new(config: AdsPowerConfig, request_timeout: Duration) -> AppResult<Self> {
        config.validate().map_err(AppError::config)?;

        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AppError::config(format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self {
            http,
            config,
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn map_send_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::timeout(self.request_timeout)
        } else {
            AppError::network(format!("AdsPower客户端未启动或网络异常: {}", e))
        }
    }

    /// 检查服务是否在线
    async fn check_alive(&self) -> AppResult<()> {
        let url = self.config.get_api_url("/api/v1/status");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = body_preview(resp).await;
            return Err(AppError::from_status(
                status.as_u16(),
                format!("AdsPower服务响应异常: body_preview={}", text),
            ));
        }
        Ok(())
    }

    /// 拉取浏览器列表
    async fn list_browsers(&self) -> AppResult<ApiEnvelope<UserListData>> {
        let url = self.config.get_api_url("/api/v1/user/list");
        let resp = self
            .http
            .get(&url)
            .query(&[("page_size", self.config.list_page_size)])
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        debug!(status = %status, "AdsPower 浏览器列表响应");

        if !status.is_success() {
            let text = body_preview(resp).await;
            return Err(AppError::from_status(
                status.as_u16(),
                format!("获取浏览器列表失败: body_preview={}", text),
            ));
        }

        resp.json::<ApiEnvelope<UserListData>>().await.map_err(|e| {
            if e.is_decode() {
                AppError::Internal(anyhow::anyhow!("解析浏览器列表失败: {}", e))
            } else {
                self.map_send_error(e)
            }
        })
    }
}

/// 读取响应体的前200个字符，读取失败时记录日志并返回空串
async fn body_preview(resp: reqwest::Response) -> String {
    match resp.text().await {
        Ok(text) => text.chars().take(200).collect(),
        Err(e) => {
            debug!(error = %e, "读取响应体失败");
            String::new()
        }
    }
}

#[async_trait::async_trait]
impl StatusProvider for AdsPowerClient {
    async fn get_status(&self, service_id: &str) -> AppResult<ServiceStatus> {
        self.check_alive().await?;

        let envelope = self.list_browsers().await?;
        if envelope.code != 0 {
            warn!(
                service = %service_id,
                code = envelope.code,
                msg = envelope.msg.as_deref().unwrap_or_default(),
                "AdsPower 返回错误码，浏览器列表不可用"
            );
            return Ok(ServiceStatus {
                available: true,
                message: "AdsPower连接正常，但获取浏览器列表失败".to_string(),
                browsers: Vec::new(),
            });
        }

        let browsers = envelope.data.map(|d| d.list).unwrap_or_default();
        debug!(service = %service_id, count = browsers.len(), "AdsPower 浏览器列表");

        Ok(ServiceStatus {
            available: true,
            message: format!("AdsPower连接正常，找到 {} 个浏览器", browsers.len()),
            browsers,
        })
    }
}
