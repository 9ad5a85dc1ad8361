//! MySQL 协议适配器
//!
//! MySQL 服务端在连接建立后会主动发送握手包，其中带有协议版本、服务端版本
//! 和连接ID。读取这个握手包即可确认服务可用，不需要任何凭据。

use crate::error::ProbeError;
use crate::probe::prober::{run_probe, ProtocolProbe};
use crate::probe::result::{ProbeResult, ProtocolReport};
use crate::probe::target::{ProbeKind, ProbeTarget};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// 握手包载荷长度上限
const MAX_PACKET_SIZE: usize = 64 * 1024;

/// 支持的握手协议版本
const HANDSHAKE_V10: u8 = 10;

/// 错误包标记
const ERR_PACKET: u8 = 0xFF;

/// CLIENT_PLUGIN_AUTH 能力位
const CLIENT_PLUGIN_AUTH: u32 = 0x0008_0000;

/// MySQL 协议适配器
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlProtocol;

#[async_trait]
impl ProtocolProbe for MysqlProtocol {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Mysql
    }

    async fn exchange(
        &self,
        stream: &mut TcpStream,
        read_timeout: Duration,
    ) -> Result<ProtocolReport, ProbeError> {
        let payload = timeout(read_timeout, read_packet(stream))
            .await
            .map_err(|_| ProbeError::ReadTimeout {
                timeout: read_timeout,
            })??;

        let greeting = parse_handshake(&payload)?;
        Ok(greeting.into_report())
    }
}

/// 读取一个完整的协议包，返回载荷
async fn read_packet(stream: &mut TcpStream) -> Result<Vec<u8>, ProbeError> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await.map_err(map_read_error)?;

    let length = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
    if length == 0 {
        return Err(ProbeError::Protocol("empty MySQL packet".to_string()));
    }
    if length > MAX_PACKET_SIZE {
        return Err(ProbeError::Protocol(format!(
            "MySQL packet too large: {} bytes",
            length
        )));
    }

    let mut payload = vec![0u8; length];
    stream
        .read_exact(&mut payload)
        .await
        .map_err(map_read_error)?;
    Ok(payload)
}

fn map_read_error(e: std::io::Error) -> ProbeError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ProbeError::ConnectionClosed
    } else {
        ProbeError::Read(e)
    }
}

/// 服务端握手信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerGreeting {
    /// 协议版本
    pub protocol_version: u8,
    /// 服务端版本字符串
    pub server_version: String,
    /// 连接ID
    pub connection_id: u32,
    /// 默认字符集ID
    pub character_set: Option<u8>,
    /// 认证插件名称
    pub auth_plugin: Option<String>,
}

impl ServerGreeting {
    fn into_report(self) -> ProtocolReport {
        let mut metrics = BTreeMap::new();
        metrics.insert(
            "protocol_version".to_string(),
            self.protocol_version.to_string(),
        );
        metrics.insert("connection_id".to_string(), self.connection_id.to_string());
        if let Some(charset) = self.character_set {
            metrics.insert("character_set".to_string(), charset.to_string());
        }
        if let Some(plugin) = self.auth_plugin {
            metrics.insert("auth_plugin".to_string(), plugin);
        }

        ProtocolReport {
            liveness_reply: Some(format!("handshake v{}", self.protocol_version)),
            version: Some(self.server_version),
            metrics,
        }
    }
}

/// 简单的字节游标
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProbeError> {
        if self.remaining() < n {
            return Err(truncated());
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, ProbeError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ProbeError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self) -> Result<u32, ProbeError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// 读取以 NUL 结尾的字符串，缺少结尾时取到末尾
    fn null_terminated(&mut self) -> String {
        let rest = &self.buf[self.pos..];
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let text = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.pos += (end + 1).min(rest.len());
        text
    }

    fn rest_as_string(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.buf[self.pos..]).into_owned();
        self.pos = self.buf.len();
        text
    }
}

fn truncated() -> ProbeError {
    ProbeError::Protocol("truncated MySQL handshake packet".to_string())
}

/// 解析握手包载荷
///
/// 错误包会被转换为带有服务端错误码和消息的协议错误。
pub fn parse_handshake(payload: &[u8]) -> Result<ServerGreeting, ProbeError> {
    let mut cursor = Cursor::new(payload);
    let protocol_version = cursor.u8()?;

    if protocol_version == ERR_PACKET {
        let code = cursor.u16()?;
        if cursor.remaining() > 0 && cursor.buf[cursor.pos] == b'#' {
            // '#' 加5字节 SQLSTATE
            cursor.take(6)?;
        }
        let message = cursor.rest_as_string();
        return Err(ProbeError::Protocol(format!(
            "MySQL error {}: {}",
            code,
            message.trim()
        )));
    }

    if protocol_version != HANDSHAKE_V10 {
        return Err(ProbeError::Protocol(format!(
            "unsupported MySQL handshake protocol version {}",
            protocol_version
        )));
    }

    let server_version = cursor.null_terminated();
    let connection_id = cursor.u32()?;
    // auth-plugin-data-part-1 + filler
    cursor.take(8 + 1)?;
    let capabilities_lower = cursor.u16()?;

    let mut greeting = ServerGreeting {
        protocol_version,
        server_version,
        connection_id,
        character_set: None,
        auth_plugin: None,
    };

    if cursor.remaining() == 0 {
        return Ok(greeting);
    }

    greeting.character_set = Some(cursor.u8()?);
    let _status_flags = cursor.u16()?;
    let capabilities_upper = cursor.u16()?;
    let capabilities = u32::from(capabilities_lower) | (u32::from(capabilities_upper) << 16);
    let auth_data_len = cursor.u8()?;
    // reserved
    cursor.take(10)?;

    if capabilities & CLIENT_PLUGIN_AUTH != 0 {
        let part2_len = usize::from(auth_data_len).saturating_sub(8).max(13);
        cursor.take(part2_len.min(cursor.remaining()))?;
        let plugin = cursor.null_terminated();
        if !plugin.is_empty() {
            greeting.auth_plugin = Some(plugin);
        }
    }

    Ok(greeting)
}

/// 探测 MySQL 服务
///
/// # 参数
/// * `host` - 主机名
/// * `port` - 端口
/// * `connect_timeout` - 连接超时，零值使用默认2秒
/// * `read_timeout` - 读取超时，零值使用默认2秒
pub async fn probe(
    host: &str,
    port: u16,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> ProbeResult {
    let target = ProbeTarget::new("mysql", ProbeKind::Mysql, host, port)
        .with_timeouts(connect_timeout, read_timeout);
    run_probe(&target, &MysqlProtocol).await
}

/// 构造一个 MySQL 8 风格的握手包（含4字节包头），供测试使用
#[cfg(test)]
pub(crate) fn sample_handshake_packet(server_version: &str, connection_id: u32) -> Vec<u8> {
    let mut payload = vec![HANDSHAKE_V10];
    payload.extend_from_slice(server_version.as_bytes());
    payload.push(0);
    payload.extend_from_slice(&connection_id.to_le_bytes());
    payload.extend_from_slice(b"abcdefgh");
    payload.push(0);
    let capabilities: u32 = 0xFFFF_F7FF;
    payload.extend_from_slice(&(capabilities as u16).to_le_bytes());
    payload.push(255); // utf8mb4_0900_ai_ci
    payload.extend_from_slice(&0x0002u16.to_le_bytes());
    payload.extend_from_slice(&((capabilities >> 16) as u16).to_le_bytes());
    payload.push(21);
    payload.extend_from_slice(&[0u8; 10]);
    payload.extend_from_slice(b"ijklmnopqrst\0");
    payload.extend_from_slice(b"caching_sha2_password\0");

    let mut packet = (payload.len() as u32).to_le_bytes()[..3].to_vec();
    packet.push(0);
    packet.extend_from_slice(&payload);
    packet
}
