pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod path_validation;
pub mod provider;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use services::BrowserGateway;
