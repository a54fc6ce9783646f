use super::{
    CheckName, CheckOutcome, FileStat, FileSystem, LocalFileSystem, PathValidationConfig,
    ValidationReport, local_fs::is_unreachable_path, platform::describe_header,
};
use crate::error::{AppError, AppResult};
use chrono::Utc;
use std::collections::BTreeMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// 浏览器可执行文件路径校验器
///
/// 依次执行 exists → isFile → extension / fileSize / executableFormat，
/// 前置检查失败时后续检查记为 `Blocked`。
#[derive(Clone)]
pub struct PathValidator {
    fs: Arc<dyn FileSystem>,
    config: PathValidationConfig,
}

/// 一次文件系统访问的结果：成功、可报告的失败（附建议），或意外错误
type FsOutcome<T> = AppResult<Result<T, String>>;

struct ReportBuilder {
    checks: BTreeMap<CheckName, CheckOutcome>,
    suggestions: Vec<String>,
}

impl ReportBuilder {
    fn new() -> Self {
        Self {
            checks: BTreeMap::new(),
            suggestions: Vec::new(),
        }
    }

    fn record(&mut self, check: CheckName, outcome: CheckOutcome, suggestion: Option<String>) {
        if outcome == CheckOutcome::Failed {
            if let Some(suggestion) = suggestion {
                self.suggestions.push(suggestion);
            }
        }
        self.checks.insert(check, outcome);
    }

    fn block(&mut self, checks: &[CheckName]) {
        for check in checks {
            self.checks.insert(*check, CheckOutcome::Blocked);
        }
    }
}

impl PathValidator {
    /// 创建新的路径校验器
    pub fn new(fs: Arc<dyn FileSystem>, config: PathValidationConfig) -> Self {
        Self { fs, config }
    }

    /// 使用本地文件系统创建校验器
    pub fn with_local_fs(config: PathValidationConfig) -> Self {
        Self::new(Arc::new(LocalFileSystem::new()), config)
    }

    pub fn config(&self) -> &PathValidationConfig {
        &self.config
    }

    pub fn file_system(&self) -> Arc<dyn FileSystem> {
        Arc::clone(&self.fs)
    }

    /// 校验路径并生成诊断报告
    ///
    /// 路径不存在、权限不足、访问超时都记入报告；只有意外的IO错误才返回 `Err`。
    pub async fn validate(&self, path: &str) -> AppResult<ValidationReport> {
        let platform = self.config.platform;
        let candidate = path.trim();
        let mut builder = ReportBuilder::new();

        // 1. 路径是否存在
        let stat = if candidate.is_empty() {
            builder.record(
                CheckName::Exists,
                CheckOutcome::Failed,
                Some("请提供浏览器可执行文件路径".to_string()),
            );
            None
        } else {
            match self.stat(Path::new(candidate)).await? {
                Ok(stat) if stat.exists => {
                    builder.record(CheckName::Exists, CheckOutcome::Passed, None);
                    Some(stat)
                }
                Ok(_) => {
                    builder.record(
                        CheckName::Exists,
                        CheckOutcome::Failed,
                        Some(format!(
                            "路径 {} 不存在，请确认浏览器已安装并检查路径拼写",
                            candidate
                        )),
                    );
                    None
                }
                Err(reason) => {
                    builder.record(CheckName::Exists, CheckOutcome::Failed, Some(reason));
                    None
                }
            }
        };

        // 2. 是否为普通文件
        let file_stat = match stat {
            Some(stat) if stat.is_file => {
                builder.record(CheckName::IsFile, CheckOutcome::Passed, None);
                Some(stat)
            }
            Some(_) => {
                builder.record(
                    CheckName::IsFile,
                    CheckOutcome::Failed,
                    Some("路径指向的不是文件（可能是目录），请选择浏览器可执行文件本身".to_string()),
                );
                None
            }
            None => {
                builder.block(&[CheckName::IsFile]);
                None
            }
        };

        match file_stat {
            Some(stat) => {
                let target = Path::new(candidate);

                // 3. 扩展名
                let extension = target.extension().and_then(|ext| ext.to_str());
                let outcome = platform
                    .extension_matches(extension)
                    .map_or(CheckOutcome::NotApplicable, CheckOutcome::from_bool);
                builder.record(
                    CheckName::Extension,
                    outcome,
                    Some(platform.extension_hint().to_string()),
                );

                // 4. 文件大小
                let size_ok = stat.size_bytes > self.config.min_file_size;
                builder.record(
                    CheckName::FileSize,
                    CheckOutcome::from_bool(size_ok),
                    Some(format!(
                        "文件大小仅 {:.1} MB，低于 {:.0} MB，可能不是完整的浏览器程序（快捷方式或启动脚本）",
                        bytes_to_mb(stat.size_bytes),
                        bytes_to_mb(self.config.min_file_size)
                    )),
                );

                // 5. 可执行文件格式
                match self.read_header(target).await? {
                    Ok(header) => {
                        let outcome = platform
                            .signature_matches(&header)
                            .map_or(CheckOutcome::NotApplicable, CheckOutcome::from_bool);
                        builder.record(
                            CheckName::ExecutableFormat,
                            outcome,
                            Some(format!(
                                "文件头不是{}可执行格式（检测结果: {}），请确认选择的是浏览器主程序",
                                platform.display_name(),
                                describe_header(&header)
                            )),
                        );
                    }
                    Err(reason) => {
                        builder.record(CheckName::ExecutableFormat, CheckOutcome::Failed, Some(reason));
                    }
                }
            }
            None => builder.block(&[
                CheckName::Extension,
                CheckName::FileSize,
                CheckName::ExecutableFormat,
            ]),
        }

        let valid = CheckName::ALL
            .iter()
            .all(|check| builder.checks.get(check).is_some_and(CheckOutcome::is_pass));

        let resolved_path = if valid {
            std::path::absolute(candidate)
                .ok()
                .map(|p| p.display().to_string())
        } else {
            None
        };

        let message = if valid {
            "浏览器路径有效".to_string()
        } else {
            let failed = builder.checks.values().filter(|o| !o.is_pass()).count();
            format!("浏览器路径无效：{} 项检查未通过", failed)
        };

        debug!(path = %candidate, valid, "完成浏览器路径校验");

        Ok(ValidationReport {
            path: path.to_string(),
            resolved_path,
            checks: builder.checks,
            suggestions: builder.suggestions,
            valid,
            message,
            platform,
            checked_at: Utc::now(),
        })
    }

    async fn stat(&self, path: &Path) -> FsOutcome<FileStat> {
        self.guarded(self.fs.stat(path)).await
    }

    async fn read_header(&self, path: &Path) -> FsOutcome<Vec<u8>> {
        self.guarded(self.fs.read_header(path, self.config.header_probe_len))
            .await
    }

    /// 为文件系统调用加上超时，并把可预期的IO失败转换为报告中的建议
    async fn guarded<T, F>(&self, operation: F) -> FsOutcome<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match tokio::time::timeout(self.config.io_timeout, operation).await {
            Err(_) => Ok(Err(format!(
                "访问路径超时（{} 毫秒），请确认路径所在磁盘或网络共享可用",
                self.config.io_timeout.as_millis()
            ))),
            Ok(Ok(value)) => Ok(Ok(value)),
            Ok(Err(AppError::Io(e))) if e.kind() == ErrorKind::PermissionDenied => Ok(Err(
                "无法访问该路径，请检查文件权限或以有权限的用户运行".to_string(),
            )),
            // 校验过程中文件被删除或移动
            Ok(Err(AppError::Io(e))) if is_unreachable_path(e.kind()) => Ok(Err(
                "校验过程中无法再访问该文件，请确认文件未被移动或删除后重试".to_string(),
            )),
            Ok(Err(e)) => Err(e),
        }
    }
}

impl std::fmt::Debug for PathValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathValidator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
