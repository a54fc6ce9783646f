use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 服务连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Online,
    #[default]
    Offline,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Online => write!(f, "online"),
            ConnectionStatus::Offline => write!(f, "offline"),
        }
    }
}

/// 单个服务的连接状态记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionState {
    /// 服务标识
    pub service_id: String,
    /// 当前状态
    pub status: ConnectionStatus,
    /// 当前离线周期内的重连次数，进入 Online 时清零
    pub reconnect_attempts: u32,
    /// 最近一次错误
    pub last_error: Option<String>,
    /// 进程生命周期内累计的重连次数
    pub total_reconnects: u64,
    /// 最后更新时间
    pub updated_at: DateTime<Utc>,
}

impl ConnectionState {
    pub fn new<T: Into<String>>(service_id: T) -> Self {
        Self {
            service_id: service_id.into(),
            status: ConnectionStatus::Offline,
            reconnect_attempts: 0,
            last_error: None,
            total_reconnects: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == ConnectionStatus::Online
    }
}
