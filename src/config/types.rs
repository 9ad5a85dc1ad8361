//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use crate::probe::{ProbeKind, ProbeTarget};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// 主配置结构，包含全局配置和探测目标列表
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 全局配置项
    #[serde(default)]
    pub global: GlobalConfig,
    /// 探测目标列表
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

/// 全局配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 连接超时（毫秒）
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// 读取超时（毫秒）
    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,
    /// 用于解析目标的 dotenv 文件
    pub env_file: Option<PathBuf>,
    /// 是否从环境变量追加 redis/mysql 目标
    #[serde(default = "default_use_env_targets")]
    pub use_env_targets: bool,
    /// Web 状态页配置
    pub web: Option<WebConfig>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            connect_timeout_ms: default_timeout_ms(),
            read_timeout_ms: default_timeout_ms(),
            env_file: None,
            use_env_targets: default_use_env_targets(),
            web: None,
        }
    }
}

impl GlobalConfig {
    /// 全局连接超时
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// 全局读取超时
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// 探测目标配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetConfig {
    /// 目标名称
    pub name: String,
    /// 协议类型
    pub kind: ProbeKind,
    /// 主机
    pub host: String,
    /// 端口，未设置时使用协议默认端口
    pub port: Option<u16>,
    /// 目标特定的连接超时（毫秒）
    pub connect_timeout_ms: Option<u64>,
    /// 目标特定的读取超时（毫秒）
    pub read_timeout_ms: Option<u64>,
    /// 是否启用
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 目标描述
    pub description: Option<String>,
}

impl TargetConfig {
    /// 应用全局超时后转换为探测目标
    pub fn to_target(&self, global: &GlobalConfig) -> ProbeTarget {
        let connect_timeout = self
            .connect_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| global.connect_timeout());
        let read_timeout = self
            .read_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| global.read_timeout());

        ProbeTarget::new(
            self.name.clone(),
            self.kind,
            self.host.clone(),
            self.port.unwrap_or_else(|| self.kind.default_port()),
        )
        .with_timeouts(connect_timeout, read_timeout)
    }
}

/// Web 状态页配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebConfig {
    /// 绑定地址
    #[serde(default = "default_web_bind_address")]
    pub bind_address: String,
    /// 监听端口
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// 页面自动刷新间隔（秒），0 表示不刷新
    #[serde(default)]
    pub refresh_interval_seconds: u32,
    /// 是否展示运行时信息
    #[serde(default = "default_show_runtime_info")]
    pub show_runtime_info: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: default_web_bind_address(),
            port: default_web_port(),
            refresh_interval_seconds: 0,
            show_runtime_info: default_show_runtime_info(),
        }
    }
}

// 默认值函数
fn default_log_level() -> String {
    "info".to_string()
}
fn default_timeout_ms() -> u64 {
    2000
}
fn default_use_env_targets() -> bool {
    true
}
fn default_enabled() -> bool {
    true
}
fn default_web_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_web_port() -> u16 {
    8080
}
fn default_show_runtime_info() -> bool {
    true
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    if config.global.connect_timeout_ms == 0 {
        return Err("连接超时时间不能为0".to_string());
    }

    if config.global.read_timeout_ms == 0 {
        return Err("读取超时时间不能为0".to_string());
    }

    let valid_log_levels = ["debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&config.global.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            config.global.log_level, valid_log_levels
        ));
    }

    if let Some(ref web_config) = config.global.web {
        if web_config.port == 0 {
            return Err("无效的Web服务器端口: 0，端口不能为0".to_string());
        }

        if web_config.bind_address.trim().is_empty() {
            return Err("Web服务器绑定地址不能为空".to_string());
        }

        if web_config.refresh_interval_seconds > 300 {
            return Err("Web界面刷新间隔不能超过300秒".to_string());
        }
    }

    let mut names = HashSet::new();
    for target in &config.targets {
        if target.name.trim().is_empty() {
            return Err("目标名称不能为空".to_string());
        }

        if !names.insert(target.name.as_str()) {
            return Err(format!("目标名称重复: {}", target.name));
        }

        if target.host.trim().is_empty() {
            return Err(format!("目标 {} 的主机不能为空", target.name));
        }

        if target.port == Some(0) {
            return Err(format!("目标 {} 的端口不能为0", target.name));
        }

        if target.connect_timeout_ms == Some(0) || target.read_timeout_ms == Some(0) {
            return Err(format!("目标 {} 的超时时间不能为0", target.name));
        }
    }

    Ok(())
}
