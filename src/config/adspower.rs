use serde::{Deserialize, Serialize};
use std::time::Duration;

/// AdsPower 本地API配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdsPowerConfig {
    /// 是否启用AdsPower集成
    pub enabled: bool,
    /// AdsPower 本地API基础URL
    pub base_url: String,
    /// 在状态轮询器中使用的服务标识
    pub service_id: String,
    /// 单独覆盖状态缓存时长（毫秒），为空时使用全局 status_ttl_ms
    pub status_ttl_ms: Option<u64>,
    /// 拉取浏览器列表时的分页大小
    pub list_page_size: u32,
}

impl Default for AdsPowerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:50325".to_string(),
            service_id: "adspower".to_string(),
            status_ttl_ms: None,
            list_page_size: 100,
        }
    }
}

impl AdsPowerConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("AdsPower base_url 不能为空".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("AdsPower base_url 必须以 http:// 或 https:// 开头".to_string());
        }

        if self.service_id.trim().is_empty() {
            return Err("AdsPower service_id 不能为空".to_string());
        }

        if self.status_ttl_ms == Some(0) {
            return Err("AdsPower 状态缓存时长必须大于0".to_string());
        }

        if self.list_page_size == 0 || self.list_page_size > 1000 {
            return Err("浏览器列表分页大小应在1-1000之间".to_string());
        }

        Ok(())
    }

    /// 获取完整的API URL
    pub fn get_api_url(&self, endpoint: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let endpoint = endpoint.trim_start_matches('/');
        format!("{}/{}", base, endpoint)
    }

    /// 该服务的状态缓存时长覆盖值
    pub fn status_ttl(&self) -> Option<Duration> {
        self.status_ttl_ms.map(Duration::from_millis)
    }
}
