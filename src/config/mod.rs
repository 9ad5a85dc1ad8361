//! 配置管理模块
//!
//! 提供配置文件解析、验证和环境变量目标解析功能

pub mod env;
pub mod loader;
pub mod types;

// 重新导出主要类型
pub use env::{EnvSource, EnvTargets};
pub use loader::{get_default_config_path, ConfigLoader, TomlConfigLoader};
pub use types::{validate_config, Config, GlobalConfig, TargetConfig, WebConfig};
