pub mod adspower;

pub use adspower::AdsPowerClient;

use crate::error::AppResult;
use crate::models::ServiceStatus;

/// 远端状态提供者接口
#[async_trait::async_trait]
pub trait StatusProvider: Send + Sync {
    /// 查询服务的当前可用状态
    ///
    /// 无响应时返回 `Network`，超时返回 `Timeout`，
    /// 远端返回错误状态码时按状态码归类。
    async fn get_status(&self, service_id: &str) -> AppResult<ServiceStatus>;
}
