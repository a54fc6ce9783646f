pub mod local_fs;
pub mod platform;
pub mod validator;

pub use local_fs::LocalFileSystem;
pub use platform::ExecutablePlatform;
pub use validator::PathValidator;

use crate::config::ValidationConfig;
use crate::error::AppResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// 文件系统抽象接口
#[async_trait::async_trait]
pub trait FileSystem: Send + Sync {
    /// 获取路径状态；路径不存在时返回 `exists: false` 而不是错误
    async fn stat(&self, path: &Path) -> AppResult<FileStat>;

    /// 读取文件开头最多 `len` 个字节
    async fn read_header(&self, path: &Path, len: usize) -> AppResult<Vec<u8>>;
}

/// 路径状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileStat {
    pub exists: bool,
    pub is_file: bool,
    pub size_bytes: u64,
}

impl FileStat {
    pub fn missing() -> Self {
        Self::default()
    }
}

/// 检查项名称，按流水线顺序排列
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckName {
    Exists,
    IsFile,
    Extension,
    FileSize,
    ExecutableFormat,
}

impl CheckName {
    pub const ALL: [CheckName; 5] = [
        CheckName::Exists,
        CheckName::IsFile,
        CheckName::Extension,
        CheckName::FileSize,
        CheckName::ExecutableFormat,
    ];
}

impl std::fmt::Display for CheckName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckName::Exists => write!(f, "exists"),
            CheckName::IsFile => write!(f, "isFile"),
            CheckName::Extension => write!(f, "extension"),
            CheckName::FileSize => write!(f, "fileSize"),
            CheckName::ExecutableFormat => write!(f, "executableFormat"),
        }
    }
}

/// 单项检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Passed,
    Failed,
    /// 前置检查失败，未执行，按失败计
    Blocked,
    /// 当前平台没有对应规则，不参与判定
    NotApplicable,
}

impl CheckOutcome {
    pub fn from_bool(passed: bool) -> Self {
        if passed {
            CheckOutcome::Passed
        } else {
            CheckOutcome::Failed
        }
    }

    /// 是否计为通过
    pub fn is_pass(&self) -> bool {
        matches!(self, CheckOutcome::Passed | CheckOutcome::NotApplicable)
    }

    /// 是否实际执行过
    pub fn was_evaluated(&self) -> bool {
        matches!(self, CheckOutcome::Passed | CheckOutcome::Failed)
    }
}

/// 浏览器路径诊断报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// 调用方给出的原始路径
    pub path: String,
    /// 校验通过时的绝对路径
    pub resolved_path: Option<String>,
    /// 各项检查结果
    pub checks: BTreeMap<CheckName, CheckOutcome>,
    /// 修复建议，按检查顺序排列
    pub suggestions: Vec<String>,
    /// 是否有效
    pub valid: bool,
    /// 概要信息
    pub message: String,
    /// 校验所依据的平台
    pub platform: ExecutablePlatform,
    /// 校验时间
    pub checked_at: DateTime<Utc>,
}

impl ValidationReport {
    /// 指定检查是否计为通过；缺失的检查视为失败
    pub fn passed(&self, check: CheckName) -> bool {
        self.checks.get(&check).is_some_and(CheckOutcome::is_pass)
    }

    pub fn outcome(&self, check: CheckName) -> Option<CheckOutcome> {
        self.checks.get(&check).copied()
    }

    /// 未通过的检查项
    pub fn failed_checks(&self) -> Vec<CheckName> {
        self.checks
            .iter()
            .filter(|(_, outcome)| !outcome.is_pass())
            .map(|(name, _)| *name)
            .collect()
    }
}

/// 路径校验配置
#[derive(Debug, Clone)]
pub struct PathValidationConfig {
    /// 最小合理文件大小（字节）
    pub min_file_size: u64,
    /// 读取文件头的字节数
    pub header_probe_len: usize,
    /// 单次文件系统调用超时
    pub io_timeout: Duration,
    /// 目标平台
    pub platform: ExecutablePlatform,
}

impl Default for PathValidationConfig {
    fn default() -> Self {
        Self::from(&ValidationConfig::default())
    }
}

impl From<&ValidationConfig> for PathValidationConfig {
    fn from(config: &ValidationConfig) -> Self {
        Self {
            min_file_size: config.min_file_size_bytes,
            header_probe_len: config.header_probe_len,
            io_timeout: config.io_timeout(),
            platform: ExecutablePlatform::current(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_name_serializes_camel_case() {
        assert_eq!(
            serde_json::to_string(&CheckName::ExecutableFormat).unwrap(),
            "\"executableFormat\""
        );
        assert_eq!(CheckName::IsFile.to_string(), "isFile");
    }

    #[test]
    fn test_blocked_counts_as_failure() {
        assert!(!CheckOutcome::Blocked.is_pass());
        assert!(!CheckOutcome::Blocked.was_evaluated());
        assert!(CheckOutcome::NotApplicable.is_pass());
        assert!(!CheckOutcome::NotApplicable.was_evaluated());
    }

    #[test]
    fn test_default_config_matches_validation_defaults() {
        let config = PathValidationConfig::default();
        assert_eq!(config.min_file_size, 10 * 1024 * 1024);
        assert_eq!(config.platform, ExecutablePlatform::current());
    }
}
