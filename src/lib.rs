//! Service Probe - Redis/MySQL 连通性探测工具
//!
//! 对外部依赖服务执行短连接、只读的探测，支持：
//! - Redis PING/INFO 探测，解析版本和键数量
//! - MySQL 握手包探测，解析服务端版本
//! - 从配置文件、环境变量和 dotenv 文件解析探测目标
//! - Web 状态页和 JSON API
//! - 结构化日志记录

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod probe;
pub mod web;

// 重新导出主要类型
pub use config::{Config, GlobalConfig, TargetConfig};
pub use error::{ProbeError, ServiceProbeError};
pub use probe::{ProbeKind, ProbeResult, ProbeStatus, ProbeTarget, Prober, ServiceProber};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
