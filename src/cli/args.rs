//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Service Probe - Redis/MySQL 连通性探测工具
#[derive(Parser, Debug, Clone)]
#[command(
    name = "service-probe",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "SERVICE_PROBE_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 日志级别，未指定时使用配置文件中的 `global.log_level`
    #[arg(
        short,
        long,
        value_enum,
        help = "日志级别",
        env = "SERVICE_PROBE_LOG_LEVEL"
    )]
    pub log_level: Option<LogLevel>,

    /// 是否启用详细输出
    #[arg(short, long, help = "启用详细输出")]
    pub verbose: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum LogLevel {
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// 单次探测的连接参数
///
/// 未指定主机或端口时，按 `REDIS_HOST`/`MYSQL_HOST` 等环境变量解析。
#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct ProbeArgs {
    /// 主机
    #[arg(long, value_name = "HOST", help = "目标主机")]
    pub host: Option<String>,

    /// 端口
    #[arg(short, long, value_name = "PORT", help = "目标端口")]
    pub port: Option<u16>,

    /// 连接超时（毫秒）
    #[arg(
        long,
        value_name = "MILLISECONDS",
        default_value = "2000",
        help = "连接超时（毫秒）"
    )]
    pub connect_timeout_ms: u64,

    /// 读取超时（毫秒）
    #[arg(
        long,
        value_name = "MILLISECONDS",
        default_value = "2000",
        help = "读取超时（毫秒）"
    )]
    pub read_timeout_ms: u64,

    /// 输出格式
    #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
    pub format: OutputFormat,
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 对所有目标执行一次探测
    Check {
        /// 目标名称（可选，不指定则探测所有目标）
        #[arg(value_name = "TARGET", help = "目标名称")]
        target: Option<String>,

        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 探测单个 Redis 服务
    Redis(ProbeArgs),

    /// 探测单个 MySQL 服务
    Mysql(ProbeArgs),

    /// 启动 Web 状态页
    Serve {
        /// 绑定地址，覆盖配置文件
        #[arg(short, long, value_name = "ADDR", help = "绑定地址")]
        bind: Option<String>,

        /// 监听端口，覆盖配置文件
        #[arg(short, long, value_name = "PORT", help = "监听端口")]
        port: Option<u16>,
    },

    /// 初始化配置文件
    Init {
        /// 配置文件路径
        #[arg(
            long,
            value_name = "FILE",
            help = "配置文件路径",
            default_value = crate::config::loader::CONFIG_FILE_NAME
        )]
        config_path: PathBuf,

        /// 是否覆盖现有文件
        #[arg(short, long, help = "覆盖现有文件")]
        force: bool,
    },

    /// 验证配置文件
    Validate {
        /// 配置文件路径
        #[arg(long, value_name = "FILE", help = "配置文件路径")]
        config_path: Option<PathBuf>,

        /// 是否显示详细信息
        #[arg(short, long, help = "显示详细信息")]
        verbose: bool,
    },

    /// 显示版本信息
    Version {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },
}

/// 输出格式枚举
#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
}

impl Args {
    /// 获取配置文件路径
    pub fn get_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::loader::get_default_config_path)
    }
}
