//! Web状态页模块
//!
//! 每次请求都会重新探测所有目标，并以HTML卡片或JSON形式展示结果

use crate::config::WebConfig;
use crate::probe::{Prober, ProbeTarget};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

pub mod handlers;
pub mod runtime;
pub mod server;

pub use runtime::RuntimeInfo;
pub use server::WebServer;

/// Web 处理函数共享的状态
#[derive(Clone)]
pub struct WebAppState {
    /// Web配置
    pub config: WebConfig,
    /// 探测目标
    pub targets: Arc<Vec<ProbeTarget>>,
    /// 探测器
    pub prober: Arc<dyn Prober>,
    /// 启动时间
    pub start_time: DateTime<Utc>,
}

impl WebAppState {
    /// 创建新的Web状态
    pub fn new(config: WebConfig, targets: Vec<ProbeTarget>, prober: Arc<dyn Prober>) -> Self {
        Self {
            config,
            targets: Arc::new(targets),
            prober,
            start_time: Utc::now(),
        }
    }

    /// 按名称查找目标
    pub fn find_target(&self, name: &str) -> Option<&ProbeTarget> {
        self.targets.iter().find(|target| target.name == name)
    }
}

/// API响应包装器
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// 是否成功
    pub success: bool,
    /// 响应数据
    pub data: Option<T>,
    /// 错误信息
    pub error: Option<String>,
    /// 时间戳
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// 创建错误响应
    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}
