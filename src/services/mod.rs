// 服务层模块
pub mod browser_gateway;
pub mod cache_store;
pub mod connection_state;
pub mod retry_executor;
pub mod status_poller;

pub use browser_gateway::{BrowserGateway, PreflightReport};
pub use cache_store::CacheStore;
pub use connection_state::ConnectionStateManager;
pub use retry_executor::{RetryContext, RetryExecutor, RetryPolicy};
pub use status_poller::StatusPoller;
