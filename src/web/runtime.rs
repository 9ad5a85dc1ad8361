//! 运行时信息
//!
//! 状态页上展示的主机和进程信息

use crate::probe::ProbeKind;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// 运行时信息
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeInfo {
    /// 应用名称
    pub app_name: &'static str,
    /// 应用版本
    pub app_version: &'static str,
    /// 服务端软件
    pub server_software: &'static str,
    /// 操作系统
    pub os: &'static str,
    /// 操作系统家族
    pub os_family: &'static str,
    /// CPU 架构
    pub arch: &'static str,
    /// 进程ID
    pub pid: u32,
    /// 可用并行度
    pub available_parallelism: Option<usize>,
    /// 工作目录
    pub working_directory: Option<String>,
    /// 服务器时间
    pub server_time: DateTime<Utc>,
    /// 运行时间（秒）
    pub uptime_seconds: u64,
    /// 已编译的协议适配器
    pub protocol_adapters: Vec<String>,
    /// 内存使用情况
    pub memory: Option<MemoryUsage>,
}

impl RuntimeInfo {
    /// 收集当前运行时信息
    pub fn collect(start_time: DateTime<Utc>) -> Self {
        let server_time = Utc::now();

        Self {
            app_name: crate::APP_NAME,
            app_version: crate::VERSION,
            server_software: "axum + tokio",
            os: std::env::consts::OS,
            os_family: std::env::consts::FAMILY,
            arch: std::env::consts::ARCH,
            pid: std::process::id(),
            available_parallelism: std::thread::available_parallelism()
                .ok()
                .map(|n| n.get()),
            working_directory: std::env::current_dir()
                .ok()
                .map(|dir| dir.display().to_string()),
            server_time,
            uptime_seconds: (server_time - start_time).num_seconds().max(0) as u64,
            protocol_adapters: ProbeKind::ALL.iter().map(ToString::to_string).collect(),
            memory: get_memory_usage(),
        }
    }

    /// 以标签/值对的形式列出，便于模板渲染
    pub fn rows(&self) -> Vec<(String, String)> {
        let mut rows = vec![
            ("Application".to_string(), format!("{} v{}", self.app_name, self.app_version)),
            ("Server Software".to_string(), self.server_software.to_string()),
            ("Operating System".to_string(), format!("{} ({})", self.os, self.os_family)),
            ("Architecture".to_string(), self.arch.to_string()),
            ("Process ID".to_string(), self.pid.to_string()),
            (
                "Parallelism".to_string(),
                self.available_parallelism
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
            (
                "Working Directory".to_string(),
                self.working_directory
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
            (
                "Server Time".to_string(),
                self.server_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            ),
            ("Uptime".to_string(), format!("{}s", self.uptime_seconds)),
            ("Protocol Adapters".to_string(), self.protocol_adapters.join(", ")),
        ];

        if let Some(ref memory) = self.memory {
            rows.push((
                "Memory".to_string(),
                format!(
                    "{} / {} MiB ({:.1}%)",
                    memory.used_bytes / 1024 / 1024,
                    memory.total_bytes / 1024 / 1024,
                    memory.usage_percent
                ),
            ));
        }

        rows
    }
}

/// 内存使用情况
#[derive(Debug, Clone, Serialize)]
pub struct MemoryUsage {
    /// 已使用内存（字节）
    pub used_bytes: u64,
    /// 总内存（字节）
    pub total_bytes: u64,
    /// 使用百分比
    pub usage_percent: f64,
}

/// 获取系统内存使用情况，目前只支持 Linux
pub fn get_memory_usage() -> Option<MemoryUsage> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/meminfo")
            .ok()
            .and_then(|meminfo| parse_meminfo(&meminfo))
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// 解析 `/proc/meminfo` 内容
fn parse_meminfo(meminfo: &str) -> Option<MemoryUsage> {
    let field = |name: &str| {
        meminfo
            .lines()
            .find(|line| line.starts_with(name))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|value| value.parse::<u64>().ok())
            .map(|kb| kb * 1024)
    };

    let total_bytes = field("MemTotal:")?;
    let available_bytes = field("MemAvailable:")?;
    if total_bytes == 0 {
        return None;
    }

    let used_bytes = total_bytes.saturating_sub(available_bytes);
    Some(MemoryUsage {
        used_bytes,
        total_bytes,
        usage_percent: used_bytes as f64 / total_bytes as f64 * 100.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_runtime_info() {
        let info = RuntimeInfo::collect(Utc::now() - chrono::Duration::seconds(5));

        assert_eq!(info.app_version, crate::VERSION);
        assert!(info.uptime_seconds >= 5);
        assert_eq!(info.protocol_adapters, vec!["redis", "mysql"]);
        assert!(info.rows().iter().any(|(label, _)| label == "Protocol Adapters"));
    }

    #[test]
    fn test_parse_meminfo() {
        let meminfo = "MemTotal:       16384000 kB\nMemFree:         1000000 kB\nMemAvailable:    8192000 kB\n";
        let usage = parse_meminfo(meminfo).unwrap();

        assert_eq!(usage.total_bytes, 16384000 * 1024);
        assert_eq!(usage.used_bytes, 8192000 * 1024);
        assert!((usage.usage_percent - 50.0).abs() < f64::EPSILON);

        assert!(parse_meminfo("MemTotal: 10 kB\n").is_none());
    }
}
