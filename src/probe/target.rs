//! 探测目标定义

use crate::error::ProbeError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 默认连接超时
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// 默认读取超时
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// 协议类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// Redis 缓存服务
    Redis,
    /// MySQL 数据库服务
    Mysql,
}

impl ProbeKind {
    /// 所有已编译的协议类型
    pub const ALL: [ProbeKind; 2] = [ProbeKind::Redis, ProbeKind::Mysql];

    /// 协议的默认端口
    pub fn default_port(&self) -> u16 {
        match self {
            ProbeKind::Redis => 6379,
            ProbeKind::Mysql => 3306,
        }
    }
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeKind::Redis => write!(f, "redis"),
            ProbeKind::Mysql => write!(f, "mysql"),
        }
    }
}

/// 一个完整解析过的探测目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTarget {
    /// 目标名称
    pub name: String,
    /// 协议类型
    pub kind: ProbeKind,
    /// 主机
    pub host: String,
    /// 端口
    pub port: u16,
    /// 连接超时
    pub connect_timeout: Duration,
    /// 读取超时
    pub read_timeout: Duration,
}

impl ProbeTarget {
    /// 使用默认超时创建目标
    pub fn new(name: impl Into<String>, kind: ProbeKind, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            kind,
            host: host.into(),
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// 设置超时，零值视为未设置并使用默认值
    pub fn with_timeouts(mut self, connect_timeout: Duration, read_timeout: Duration) -> Self {
        self.connect_timeout = or_default(connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        self.read_timeout = or_default(read_timeout, DEFAULT_READ_TIMEOUT);
        self
    }

    /// `host:port` 形式的地址
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 最坏情况下一次探测的耗时上限
    pub fn worst_case_duration(&self) -> Duration {
        self.connect_timeout + self.read_timeout * 2
    }

    /// 校验目标参数
    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.host.trim().is_empty() {
            return Err(ProbeError::InvalidTarget("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ProbeError::InvalidTarget(
                "port must be between 1 and 65535".to_string(),
            ));
        }
        Ok(())
    }
}

fn or_default(value: Duration, default: Duration) -> Duration {
    if value.is_zero() {
        default
    } else {
        value
    }
}
