//! # Rengen管理模块
//!
//! 提供配置加载、验证、保存以及日志初始化

pub mod config;
pub mod logging;

pub use config::{ConfigManager, DashboardConfig, LoggingConfig};
pub use logging::init_logging;
