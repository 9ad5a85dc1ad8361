//! 探测结果数据结构
//!
//! 定义单次探测的结果类型和状态枚举

use crate::error::ProbeError;
use crate::probe::target::{ProbeKind, ProbeTarget};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// 探测状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// 连接成功且协议交互正常
    Up,
    /// 连接成功但协议交互失败
    Degraded,
    /// 无法建立连接
    Down,
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeStatus::Up => write!(f, "正常"),
            ProbeStatus::Degraded => write!(f, "降级"),
            ProbeStatus::Down => write!(f, "异常"),
        }
    }
}

impl ProbeStatus {
    /// 判断状态是否为健康
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeStatus::Up)
    }
}

/// 失败类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// 传输层连接失败
    Connection,
    /// 已连接，但没有在截止时间内得到可用响应
    Read,
}

/// 协议适配器从一次交互中得到的信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProtocolReport {
    /// 存活命令响应的第一行
    pub liveness_reply: Option<String>,
    /// 服务自报的版本
    pub version: Option<String>,
    /// 从信息横幅中提取的指标
    pub metrics: BTreeMap<String, String>,
}

/// 单次探测结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    /// 探测ID
    pub id: Uuid,
    /// 目标名称
    pub target_name: String,
    /// 协议类型
    pub kind: ProbeKind,
    /// 主机
    pub host: String,
    /// 端口
    pub port: u16,
    /// 探测时间戳
    pub timestamp: DateTime<Utc>,
    /// 传输层连接是否成功
    pub connected: bool,
    /// 错误信息（连接或读取失败时）
    pub error_message: Option<String>,
    /// 失败类别
    pub failure: Option<FailureKind>,
    /// 存活命令响应
    pub liveness_reply: Option<String>,
    /// 服务版本
    pub version: Option<String>,
    /// 指标
    #[serde(default)]
    pub metrics: BTreeMap<String, String>,
    /// 探测耗时
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,
}

impl ProbeResult {
    /// 为目标创建一个尚未连接的空结果
    pub fn new(target: &ProbeTarget) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_name: target.name.clone(),
            kind: target.kind,
            host: target.host.clone(),
            port: target.port,
            timestamp: Utc::now(),
            connected: false,
            error_message: None,
            failure: None,
            liveness_reply: None,
            version: None,
            metrics: BTreeMap::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// 标记连接已建立
    pub fn with_connected(mut self) -> Self {
        self.connected = true;
        self
    }

    /// 记录失败原因
    pub fn with_failure(mut self, error: &ProbeError) -> Self {
        self.failure = Some(error.failure_kind());
        self.error_message = Some(error.to_string());
        self
    }

    /// 合并协议交互得到的信息
    pub fn with_report(mut self, report: ProtocolReport) -> Self {
        self.liveness_reply = report.liveness_reply;
        self.version = report.version;
        self.metrics = report.metrics;
        self
    }

    /// 设置探测耗时
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// 根据连接和错误信息推导状态
    pub fn status(&self) -> ProbeStatus {
        match (self.connected, self.error_message.is_some()) {
            (false, _) => ProbeStatus::Down,
            (true, true) => ProbeStatus::Degraded,
            (true, false) => ProbeStatus::Up,
        }
    }

    /// 获取探测耗时（毫秒）
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }

    /// 目标地址
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 转换为JSON字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Duration序列化模块
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// 一批探测结果的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSummary {
    /// 目标总数
    pub total: usize,
    /// 正常数
    pub up: usize,
    /// 降级数
    pub degraded: usize,
    /// 异常数
    pub down: usize,
}

impl ProbeSummary {
    /// 统计一批结果
    pub fn from_results(results: &[ProbeResult]) -> Self {
        results.iter().fold(
            Self {
                total: results.len(),
                ..Default::default()
            },
            |mut summary, result| {
                match result.status() {
                    ProbeStatus::Up => summary.up += 1,
                    ProbeStatus::Degraded => summary.degraded += 1,
                    ProbeStatus::Down => summary.down += 1,
                }
                summary
            },
        )
    }

    /// 是否全部正常
    pub fn all_up(&self) -> bool {
        self.up == self.total
    }
}
