//! 服务探测模块
//!
//! 提供短连接探测、协议适配器和结果类型

pub mod mysql;
pub mod prober;
pub mod redis;
pub mod result;
pub mod target;

// 重新导出主要类型
pub use mysql::MysqlProtocol;
pub use prober::{run_probe, Prober, ProtocolProbe, ServiceProber};
pub use redis::{parse_info, InfoBanner, RedisProtocol};
pub use result::{FailureKind, ProbeResult, ProbeStatus, ProbeSummary, ProtocolReport};
pub use target::{ProbeKind, ProbeTarget, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};
