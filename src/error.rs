//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use crate::probe::result::FailureKind;
use std::time::Duration;
use thiserror::Error;

/// Service Probe 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum ServiceProbeError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 探测相关错误
    #[error("探测错误: {0}")]
    Probe(#[from] ProbeError),

    /// Web 服务相关错误
    #[error("Web服务错误: {0}")]
    Web(String),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 单次探测中某个步骤的失败原因
///
/// 这些错误只在探测器内部流转，最终会被转换成 `ProbeResult` 的字段，
/// 不会向调用方抛出。显示文本会直接出现在状态页上。
#[derive(Error, Debug)]
pub enum ProbeError {
    /// 目标参数无效（空主机名、端口为0）
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// 建立连接超时
    #[error("connection to {address} timed out after {}ms", .timeout.as_millis())]
    ConnectTimeout { address: String, timeout: Duration },

    /// 建立连接失败（拒绝连接、DNS解析失败等）
    #[error("connection to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// 读取响应超时
    #[error("no response within {}ms", .timeout.as_millis())]
    ReadTimeout { timeout: Duration },

    /// 读写失败
    #[error("failed to exchange data: {0}")]
    Read(#[source] std::io::Error),

    /// 对端在响应之前关闭了连接
    #[error("connection closed by peer before a response was received")]
    ConnectionClosed,

    /// 响应内容不符合协议
    #[error("{0}")]
    Protocol(String),
}

impl ProbeError {
    /// 失败类别：传输层连接失败，或者连接成功但协议交互失败
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ProbeError::InvalidTarget(_)
            | ProbeError::ConnectTimeout { .. }
            | ProbeError::Connect { .. } => FailureKind::Connection,
            ProbeError::ReadTimeout { .. }
            | ProbeError::Read(_)
            | ProbeError::ConnectionClosed
            | ProbeError::Protocol(_) => FailureKind::Read,
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ServiceProbeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_classification() {
        let refused = ProbeError::Connect {
            address: "127.0.0.1:1".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(refused.failure_kind(), FailureKind::Connection);
        assert_eq!(
            ProbeError::InvalidTarget("empty host".to_string()).failure_kind(),
            FailureKind::Connection
        );
        assert_eq!(
            ProbeError::ReadTimeout {
                timeout: Duration::from_secs(2)
            }
            .failure_kind(),
            FailureKind::Read
        );
        assert_eq!(ProbeError::ConnectionClosed.failure_kind(), FailureKind::Read);
    }

    #[test]
    fn test_probe_error_messages() {
        let timeout = ProbeError::ConnectTimeout {
            address: "redis:6379".to_string(),
            timeout: Duration::from_millis(1500),
        };
        assert_eq!(
            timeout.to_string(),
            "connection to redis:6379 timed out after 1500ms"
        );

        let err: ServiceProbeError = ConfigError::EnvVarError {
            var: "REDIS_HOST".to_string(),
        }
        .into();
        assert!(err.to_string().contains("REDIS_HOST"));
    }
}
