use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub mod adspower;

/// 应用程序配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub polling: PollingConfig,
    pub validation: ValidationConfig,
    pub adspower: adspower::AdsPowerConfig,
}

/// 状态轮询配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// 状态缓存时长（毫秒）
    pub status_ttl_ms: u64,
    /// 单次拉取的最大重试次数
    pub max_retries: u32,
    /// 初始退避时间（毫秒）
    pub base_delay_ms: u64,
    /// 最大重连次数
    pub max_reconnect_attempts: u32,
    /// 所有指数退避的延迟上限（毫秒）
    pub reconnect_delay_cap_ms: u64,
    /// 单次请求超时（毫秒）
    pub request_timeout_ms: u64,
    /// 退避时添加随机抖动
    pub jitter: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            status_ttl_ms: 30_000,
            max_retries: 3,
            base_delay_ms: 1_000,
            max_reconnect_attempts: 5,
            reconnect_delay_cap_ms: 30_000,
            request_timeout_ms: 5_000,
            jitter: false,
        }
    }
}

impl PollingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.status_ttl_ms == 0 {
            return Err("状态缓存时长必须大于0".into());
        }
        if self.max_retries > 20 {
            return Err("最大重试次数不应超过20".into());
        }
        if self.base_delay_ms == 0 {
            return Err("初始退避时间必须大于0".into());
        }
        if self.reconnect_delay_cap_ms < self.base_delay_ms {
            return Err("退避延迟上限不能小于初始退避时间".into());
        }
        if self.request_timeout_ms == 0 {
            return Err("请求超时必须大于0".into());
        }
        Ok(())
    }

    pub fn status_ttl(&self) -> Duration {
        Duration::from_millis(self.status_ttl_ms)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn reconnect_delay_cap(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_cap_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// 浏览器路径校验配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// 校验结果缓存时长（毫秒）
    pub validation_ttl_ms: u64,
    /// 可执行文件最小合理大小（字节）
    pub min_file_size_bytes: u64,
    /// 读取文件头的字节数
    pub header_probe_len: usize,
    /// 单次文件系统调用超时（毫秒）
    pub io_timeout_ms: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            validation_ttl_ms: 60_000,
            min_file_size_bytes: 10 * 1024 * 1024, // 10MB
            header_probe_len: 262,
            io_timeout_ms: 3_000,
        }
    }
}

impl ValidationConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.validation_ttl_ms == 0 {
            return Err("校验结果缓存时长必须大于0".into());
        }
        if self.header_probe_len < 4 {
            return Err("文件头读取长度不应少于4字节".into());
        }
        if self.io_timeout_ms == 0 {
            return Err("文件系统调用超时必须大于0".into());
        }
        Ok(())
    }

    pub fn validation_ttl(&self) -> Duration {
        Duration::from_millis(self.validation_ttl_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            polling: PollingConfig::default(),
            validation: ValidationConfig::default(),
            adspower: adspower::AdsPowerConfig::default(),
        }
    }
}

impl Config {
    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| AppError::config(format!("解析配置文件失败: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> AppResult<()> {
        if let Err(e) = self.polling.validate() {
            return Err(AppError::config(format!("轮询配置无效: {}", e)));
        }

        if let Err(e) = self.validation.validate() {
            return Err(AppError::config(format!("路径校验配置无效: {}", e)));
        }

        if let Err(e) = self.adspower.validate() {
            return Err(AppError::config(format!("AdsPower配置无效: {}", e)));
        }

        Ok(())
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::config(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.polling.status_ttl(), Duration::from_secs(30));
        assert_eq!(config.validation.validation_ttl(), Duration::from_secs(60));
        assert_eq!(config.polling.max_retries, 3);
        assert_eq!(config.polling.base_delay(), Duration::from_secs(1));
        assert_eq!(config.polling.max_reconnect_attempts, 5);
        assert_eq!(config.polling.reconnect_delay_cap(), Duration::from_secs(30));
        assert_eq!(config.validation.min_file_size_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.polling.reconnect_delay_cap_ms = 10;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = Config::default();
        config.validation.header_probe_len = 2;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.adspower.base_url = "ftp://localhost".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_config() {
        let mut original_config = Config::default();
        original_config.polling.max_retries = 5;
        original_config.adspower.status_ttl_ms = Some(10_000);
        let temp_file = NamedTempFile::new().unwrap();

        // 保存配置
        original_config.save_to_file(temp_file.path()).unwrap();

        // 加载配置
        let loaded_config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(loaded_config.polling.max_retries, 5);
        assert_eq!(loaded_config.adspower.status_ttl_ms, Some(10_000));
        assert_eq!(
            original_config.validation.min_file_size_bytes,
            loaded_config.validation.min_file_size_bytes
        );
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "polling = 3").unwrap();

        assert!(matches!(
            Config::from_file(temp_file.path()),
            Err(AppError::Config(_))
        ));
    }
}
