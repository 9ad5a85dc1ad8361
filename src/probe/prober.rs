//! 通用TCP探测器实现
//!
//! 负责建立连接、超时控制、失败分类和连接释放，具体协议交互由
//! [`ProtocolProbe`] 实现提供。

use crate::error::ProbeError;
use crate::probe::mysql::MysqlProtocol;
use crate::probe::redis::RedisProtocol;
use crate::probe::result::{ProbeResult, ProtocolReport};
use crate::probe::target::{ProbeKind, ProbeTarget};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

/// 协议适配器trait，定义一次连接上的协议交互
#[async_trait]
pub trait ProtocolProbe: Send + Sync {
    /// 协议类型
    fn kind(&self) -> ProbeKind;

    /// 在已建立的连接上执行协议交互
    ///
    /// # 参数
    /// * `stream` - 已连接的TCP流
    /// * `read_timeout` - 每个读取阶段的超时时间
    ///
    /// # 返回
    /// * `Result<ProtocolReport, ProbeError>` - 交互得到的信息或失败原因
    async fn exchange(
        &self,
        stream: &mut TcpStream,
        read_timeout: Duration,
    ) -> Result<ProtocolReport, ProbeError>;
}

/// 探测器trait，定义探测接口
#[async_trait]
pub trait Prober: Send + Sync {
    /// 执行单次探测，所有失败都编码在结果中
    async fn probe(&self, target: &ProbeTarget) -> ProbeResult;

    /// 批量探测，每个目标独立并发执行
    async fn probe_batch(&self, targets: &[ProbeTarget]) -> Vec<ProbeResult> {
        let futures = targets.iter().map(|target| self.probe(target));
        futures::future::join_all(futures).await
    }
}

/// 按目标协议类型分派到对应适配器的探测器
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceProber;

impl ServiceProber {
    /// 创建新的探测器
    pub fn new() -> Self {
        Self
    }

    /// 获取协议适配器
    pub fn protocol_for(kind: ProbeKind) -> &'static dyn ProtocolProbe {
        static REDIS: RedisProtocol = RedisProtocol::new();
        static MYSQL: MysqlProtocol = MysqlProtocol;

        match kind {
            ProbeKind::Redis => &REDIS,
            ProbeKind::Mysql => &MYSQL,
        }
    }
}

#[async_trait]
impl Prober for ServiceProber {
    async fn probe(&self, target: &ProbeTarget) -> ProbeResult {
        run_probe(target, Self::protocol_for(target.kind)).await
    }
}

/// 使用指定协议适配器探测目标
///
/// 连接在每条返回路径上都会被关闭。
pub async fn run_probe(target: &ProbeTarget, protocol: &dyn ProtocolProbe) -> ProbeResult {
    let start_time = Instant::now();
    let result = ProbeResult::new(target);
    debug!(
        "开始探测 {} ({} {})，最长耗时 {}ms",
        target.name,
        protocol.kind(),
        target.address(),
        target.worst_case_duration().as_millis()
    );

    if let Err(e) = target.validate() {
        warn!("探测目标 {} 参数无效: {}", target.name, e);
        return result.with_failure(&e).with_elapsed(start_time.elapsed());
    }

    let mut stream = match connect(&target.host, target.port, target.connect_timeout).await {
        Ok(stream) => stream,
        Err(e) => {
            debug!("连接 {} 失败: {}", target.address(), e);
            return result.with_failure(&e).with_elapsed(start_time.elapsed());
        }
    };

    let result = result.with_connected();
    let result = match protocol.exchange(&mut stream, target.read_timeout).await {
        Ok(report) => result.with_report(report),
        Err(e) => {
            debug!("{} 协议交互失败 ({}): {}", protocol.kind(), target.address(), e);
            result.with_failure(&e)
        }
    };

    release(stream).await;

    result.with_elapsed(start_time.elapsed())
}

/// 在超时时间内建立TCP连接（包含DNS解析）
async fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<TcpStream, ProbeError> {
    let address = format!("{}:{}", host, port);

    match timeout(connect_timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => {
            debug!("已连接到 {}", address);
            Ok(stream)
        }
        Ok(Err(source)) => Err(ProbeError::Connect { address, source }),
        Err(_) => Err(ProbeError::ConnectTimeout {
            address,
            timeout: connect_timeout,
        }),
    }
}

/// 关闭写端后释放连接
async fn release(mut stream: TcpStream) {
    // shutdown 只发出 FIN，不等待对端
    if let Err(e) = stream.shutdown().await {
        debug!("关闭连接时出错: {}", e);
    }
}
