use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{AppError, AppResult};

/// 默认日志过滤规则
pub const DEFAULT_FILTER: &str = "browser_gateway=debug";

/// 初始化日志：优先读取 `RUST_LOG`，否则使用给定的默认规则
///
/// 全局订阅者只能安装一次，重复调用返回配置错误。
pub fn init_logging(default_filter: &str) -> AppResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| AppError::config(format!("初始化日志失败: {}", e)))
}
