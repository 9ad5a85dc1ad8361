//! Redis 协议适配器
//!
//! 使用内联命令（`PING\r\n`、`INFO\r\n`）完成存活检测并从 INFO 横幅中
//! 提取版本和指标，不需要 Redis 客户端库。

use crate::error::ProbeError;
use crate::probe::prober::{run_probe, ProtocolProbe};
use crate::probe::result::{ProbeResult, ProtocolReport};
use crate::probe::target::{ProbeKind, ProbeTarget};
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::debug;

/// 存活命令响应的读取上限
const PING_BUFFER_SIZE: usize = 512;

/// INFO 响应每次读取的块大小
const INFO_CHUNK_SIZE: usize = 1024;

/// INFO 响应累计上限
const MAX_INFO_BYTES: usize = 64 * 1024;

static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"redis_version:(\S+)").expect("valid version pattern"));

/// 指标名称及其提取规则，每个字段取第一个匹配
static METRIC_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("keys", r"db0:keys=(\d+)"),
        ("connected_clients", r"connected_clients:(\d+)"),
        ("uptime_in_seconds", r"uptime_in_seconds:(\d+)"),
        ("used_memory", r"used_memory:(\d+)"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("valid metric pattern")))
    .collect()
});

/// Redis 协议适配器
#[derive(Debug, Clone, Copy)]
pub struct RedisProtocol {
    /// INFO 命令的节名，`None` 表示请求全部节
    info_section: Option<&'static str>,
}

impl RedisProtocol {
    /// 请求全部 INFO 节（包含 server 和 keyspace）
    pub const fn new() -> Self {
        Self { info_section: None }
    }

    /// 只请求指定的 INFO 节
    pub const fn with_section(section: &'static str) -> Self {
        Self {
            info_section: Some(section),
        }
    }

    fn info_command(&self) -> String {
        match self.info_section {
            Some(section) => format!("INFO {}\r\n", section),
            None => "INFO\r\n".to_string(),
        }
    }

    /// 发送 PING 并读取一次响应
    async fn ping(&self, stream: &mut TcpStream) -> Result<String, ProbeError> {
        stream
            .write_all(b"PING\r\n")
            .await
            .map_err(ProbeError::Read)?;

        let mut buf = [0u8; PING_BUFFER_SIZE];
        let n = stream.read(&mut buf).await.map_err(ProbeError::Read)?;
        if n == 0 {
            return Err(ProbeError::ConnectionClosed);
        }

        Ok(first_line(&buf[..n]))
    }

    /// 发送 INFO 并在截止时间前累积响应
    ///
    /// 这一阶段的任何失败都只会让横幅变短，不会成为错误。
    async fn collect_info(&self, stream: &mut TcpStream, read_timeout: Duration) -> String {
        let deadline = Instant::now() + read_timeout;
        let command = self.info_command();

        match timeout_at(deadline, stream.write_all(command.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("发送 INFO 命令失败: {}", e);
                return String::new();
            }
            Err(_) => return String::new(),
        }

        let mut info = Vec::with_capacity(INFO_CHUNK_SIZE);
        let mut chunk = [0u8; INFO_CHUNK_SIZE];

        while Instant::now() < deadline {
            match timeout_at(deadline, stream.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    info.extend_from_slice(&chunk[..n]);
                    if info.len() >= MAX_INFO_BYTES || reply_complete(&info) {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    debug!("读取 INFO 响应失败: {}", e);
                    break;
                }
                Err(_) => {
                    debug!("INFO 响应在 {}ms 内未完成", read_timeout.as_millis());
                    break;
                }
            }
        }

        String::from_utf8_lossy(&info).into_owned()
    }
}

impl Default for RedisProtocol {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolProbe for RedisProtocol {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Redis
    }

    async fn exchange(
        &self,
        stream: &mut TcpStream,
        read_timeout: Duration,
    ) -> Result<ProtocolReport, ProbeError> {
        let liveness_reply = timeout(read_timeout, self.ping(stream))
            .await
            .map_err(|_| ProbeError::ReadTimeout {
                timeout: read_timeout,
            })??;

        let info = self.collect_info(stream, read_timeout).await;
        let banner = parse_info(&info);

        Ok(ProtocolReport {
            liveness_reply: Some(liveness_reply),
            version: banner.version,
            metrics: banner.metrics,
        })
    }
}

/// 从 INFO 横幅中提取的信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoBanner {
    /// `redis_version` 字段
    pub version: Option<String>,
    /// 数值指标
    pub metrics: BTreeMap<String, String>,
}

/// 解析 INFO 横幅文本
///
/// 字段缺失时保持未设置，不视为错误。
pub fn parse_info(text: &str) -> InfoBanner {
    let version = VERSION_PATTERN
        .captures(text)
        .map(|captures| captures[1].to_string());

    let metrics = METRIC_PATTERNS
        .iter()
        .filter_map(|(name, pattern)| {
            pattern
                .captures(text)
                .map(|captures| (name.to_string(), captures[1].to_string()))
        })
        .collect();

    InfoBanner { version, metrics }
}

/// 判断累积的字节是否已构成完整的 RESP 响应
///
/// 只识别批量字符串（`$<len>\r\n...\r\n`）和错误/简单响应（单行），
/// 其余情况交由截止时间结束累积。
fn reply_complete(buf: &[u8]) -> bool {
    let Some(header_end) = find_crlf(buf) else {
        return false;
    };

    match buf.first() {
        Some(b'$') => std::str::from_utf8(&buf[1..header_end])
            .ok()
            .and_then(|len| len.parse::<i64>().ok())
            .is_some_and(|len| {
                if len < 0 {
                    return true;
                }
                // 长度溢出时视为未完成，由字节上限和截止时间结束累积
                usize::try_from(len)
                    .ok()
                    .and_then(|len| (header_end + 4).checked_add(len))
                    .is_some_and(|total| buf.len() >= total)
            }),
        Some(b'-') | Some(b'+') => true,
        _ => false,
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|window| window == b"\r\n")
}

fn first_line(buf: &[u8]) -> String {
    let text = String::from_utf8_lossy(buf);
    text.lines().next().unwrap_or_default().trim().to_string()
}

/// 探测 Redis 服务
///
/// # 参数
/// * `host` - 主机名
/// * `port` - 端口
/// * `connect_timeout` - 连接超时，零值使用默认2秒
/// * `read_timeout` - 读取超时，零值使用默认2秒
///
/// # 返回
/// * `ProbeResult` - 探测结果，所有失败都编码在结果中
pub async fn probe(
    host: &str,
    port: u16,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> ProbeResult {
    let target = ProbeTarget::new("redis", ProbeKind::Redis, host, port)
        .with_timeouts(connect_timeout, read_timeout);
    run_probe(&target, &RedisProtocol::new()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_INFO: &str = "$215\r\n# Server\r\nredis_version:7.2.0\r\nredis_mode:standalone\r\nuptime_in_seconds:3600\r\n\r\n# Clients\r\nconnected_clients:3\r\n\r\n# Memory\r\nused_memory:1048576\r\nused_memory_human:1.00M\r\n\r\n# Keyspace\r\ndb0:keys=42,expires=0,avg_ttl=0\r\n\r\n";

    #[test]
    fn test_parse_version_and_keys() {
        let banner = parse_info("redis_version:7.2.0\r\ndb0:keys=42,expires=0\r\n");
        assert_eq!(banner.version.as_deref(), Some("7.2.0"));
        assert_eq!(banner.metrics.get("keys").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_parse_missing_version_is_not_an_error() {
        let banner = parse_info("# Server\r\nredis_mode:standalone\r\n");
        assert!(banner.version.is_none());
        assert!(banner.metrics.is_empty());

        assert_eq!(parse_info(""), InfoBanner::default());
    }

    #[test]
    fn test_parse_full_banner() {
        let banner = parse_info(SAMPLE_INFO);
        assert_eq!(banner.version.as_deref(), Some("7.2.0"));
        assert_eq!(banner.metrics["keys"], "42");
        assert_eq!(banner.metrics["connected_clients"], "3");
        assert_eq!(banner.metrics["uptime_in_seconds"], "3600");
        // used_memory_human 不能覆盖 used_memory
        assert_eq!(banner.metrics["used_memory"], "1048576");
    }

    #[test]
    fn test_parse_first_match_wins() {
        let banner = parse_info("redis_version:6.0.1\r\nredis_version:7.0.0\r\n");
        assert_eq!(banner.version.as_deref(), Some("6.0.1"));
    }

    #[test]
    fn test_reply_complete() {
        assert!(!reply_complete(b""));
        assert!(!reply_complete(b"$10\r\nabc"));
        assert!(reply_complete(b"$3\r\nabc\r\n"));
        assert!(reply_complete(b"$-1\r\n"));
        assert!(reply_complete(b"-ERR unknown command\r\n"));
        assert!(!reply_complete(b"garbage"));
        assert!(!reply_complete(b"*2\r\n"));
    }

    #[test]
    fn test_reply_complete_huge_length() {
        assert!(!reply_complete(b"$9223372036854775807\r\nabc"));
        assert!(!reply_complete(b"$99999999999999999999\r\nabc"));
    }

    #[test]
    fn test_info_command() {
        assert_eq!(RedisProtocol::new().info_command(), "INFO\r\n");
        assert_eq!(
            RedisProtocol::with_section("server").info_command(),
            "INFO server\r\n"
        );
    }

    #[test]
    fn test_first_line() {
        assert_eq!(first_line(b"+PONG\r\n"), "+PONG");
        assert_eq!(first_line(b"-NOAUTH Authentication required.\r\n"), "-NOAUTH Authentication required.");
    }
}
