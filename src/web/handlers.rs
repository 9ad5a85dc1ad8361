//! Web 路由处理函数
//!
//! 实现状态页和 JSON API 的处理逻辑

use super::{ApiResponse, RuntimeInfo, WebAppState};
use crate::logging::LoggingSystem;
use crate::probe::{ProbeResult, ProbeStatus, ProbeSummary};
use askama::Template;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json},
};
use serde::Serialize;
use tracing::{debug, error};

/// 状态卡片中的一个指标
struct MetricRow {
    name: String,
    value: String,
}

/// 状态页上的一张卡片
struct StatusCard {
    name: String,
    kind: String,
    address: String,
    connected: bool,
    healthy: bool,
    status_label: String,
    version: String,
    liveness_reply: String,
    error_message: String,
    elapsed_ms: u64,
    metrics: Vec<MetricRow>,
}

impl From<&ProbeResult> for StatusCard {
    fn from(result: &ProbeResult) -> Self {
        Self {
            name: result.target_name.clone(),
            kind: result.kind.to_string(),
            address: result.address(),
            connected: result.connected,
            healthy: result.status().is_healthy(),
            status_label: match result.status() {
                ProbeStatus::Up => "✅ Connected".to_string(),
                ProbeStatus::Degraded => "⚠️ Connected, no response".to_string(),
                ProbeStatus::Down => "❌ Failed".to_string(),
            },
            version: result.version.clone().unwrap_or_default(),
            liveness_reply: result.liveness_reply.clone().unwrap_or_default(),
            error_message: result
                .error_message
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string()),
            elapsed_ms: result.elapsed_ms(),
            metrics: result
                .metrics
                .iter()
                .map(|(name, value)| MetricRow {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }
}

/// 运行时信息表格中的一行
struct RuntimeRow {
    label: String,
    value: String,
}

/// 状态页模板
#[derive(Template)]
#[template(path = "status.html")]
struct StatusTemplate {
    app_name: &'static str,
    app_version: &'static str,
    cards: Vec<StatusCard>,
    summary: ProbeSummary,
    last_updated: String,
    refresh_interval: u32,
    runtime_rows: Vec<RuntimeRow>,
}

/// 探测结果列表响应
#[derive(Debug, Serialize)]
pub struct ProbeListResponse {
    /// 汇总
    pub summary: ProbeSummary,
    /// 全部结果
    pub results: Vec<ProbeResult>,
}

/// 状态页处理函数
pub async fn status_page(State(app_state): State<WebAppState>) -> impl IntoResponse {
    let results = app_state.prober.probe_batch(&app_state.targets).await;
    results.iter().for_each(LoggingSystem::probe_log);
    debug!("状态页探测完成，目标数量: {}", results.len());

    let runtime_rows = if app_state.config.show_runtime_info {
        RuntimeInfo::collect(app_state.start_time)
            .rows()
            .into_iter()
            .map(|(label, value)| RuntimeRow { label, value })
            .collect()
    } else {
        Vec::new()
    };

    let template = StatusTemplate {
        app_name: crate::APP_NAME,
        app_version: crate::VERSION,
        summary: ProbeSummary::from_results(&results),
        cards: results.iter().map(StatusCard::from).collect(),
        last_updated: chrono::Utc::now()
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string(),
        refresh_interval: app_state.config.refresh_interval_seconds,
        runtime_rows,
    };

    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("模板渲染失败: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "模板渲染失败").into_response()
        }
    }
}

/// 全部目标探测 API
pub async fn api_probes(State(app_state): State<WebAppState>) -> impl IntoResponse {
    let results = app_state.prober.probe_batch(&app_state.targets).await;

    Json(ApiResponse::success(ProbeListResponse {
        summary: ProbeSummary::from_results(&results),
        results,
    }))
}

/// 单个目标探测 API
pub async fn api_probe(
    State(app_state): State<WebAppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match app_state.find_target(&name) {
        Some(target) => {
            let result = app_state.prober.probe(target).await;
            (StatusCode::OK, Json(ApiResponse::success(result))).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<ProbeResult>::error(format!(
                "unknown target: {}",
                name
            ))),
        )
            .into_response(),
    }
}

/// 运行时信息 API
pub async fn api_runtime(State(app_state): State<WebAppState>) -> impl IntoResponse {
    Json(ApiResponse::success(RuntimeInfo::collect(app_state.start_time)))
}

/// 状态页自身的存活检测
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
