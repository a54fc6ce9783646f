use thiserror::Error;

/// 应用程序错误类型
#[derive(Error, Debug)]
pub enum AppError {
    #[error("网络错误: {0}")]
    Network(String),

    #[error("请求超时: 超过 {timeout_ms} 毫秒未响应")]
    Timeout { timeout_ms: u64 },

    #[error("远端服务错误 HTTP {status}: {message}")]
    RemoteServer { status: u16, message: String },

    #[error("远端拒绝请求 HTTP {status}: {message}")]
    RemoteClient { status: u16, message: String },

    #[error("请求过于频繁 HTTP 429: {message}")]
    RateLimited { message: String },

    #[error("重试 {attempts} 次后仍然失败: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<AppError>,
    },

    #[error("服务 {service} 重连 {attempts} 次后放弃: {source}")]
    ReconnectExhausted {
        service: String,
        attempts: u32,
        #[source]
        source: Box<AppError>,
    },

    #[error("操作已取消")]
    Cancelled,

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("内部错误: {0}")]
    Internal(#[from] anyhow::Error),
}

/// 应用程序Result类型别名
pub type AppResult<T> = Result<T, AppError>;

/// 错误构造辅助函数
impl AppError {
    pub fn network<T: Into<String>>(msg: T) -> Self {
        Self::Network(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(msg.into())
    }

    pub fn timeout(timeout: std::time::Duration) -> Self {
        Self::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// 按HTTP状态码归类远端错误
    pub fn from_status<T: Into<String>>(status: u16, message: T) -> Self {
        let message = message.into();
        match status {
            429 => Self::RateLimited { message },
            500..=599 => Self::RemoteServer { status, message },
            _ => Self::RemoteClient { status, message },
        }
    }

    /// 默认重试判定：无响应、超时、5xx 与 429 可重试，其余 4xx 不可重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Network(_)
                | AppError::Timeout { .. }
                | AppError::RemoteServer { .. }
                | AppError::RateLimited { .. }
        )
    }

    /// 剥离重试/重连包装，返回最底层的错误
    pub fn root_cause(&self) -> &AppError {
        let mut current = self;
        loop {
            match current {
                AppError::RetriesExhausted { source, .. }
                | AppError::ReconnectExhausted { source, .. } => current = source,
                other => return other,
            }
        }
    }

    /// 远端返回的HTTP状态码（如有）
    pub fn status_code(&self) -> Option<u16> {
        match self.root_cause() {
            AppError::RemoteServer { status, .. } | AppError::RemoteClient { status, .. } => {
                Some(*status)
            }
            AppError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}
