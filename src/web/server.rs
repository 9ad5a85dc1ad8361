//! Web服务器实现
//!
//! 提供HTTP服务器和路由管理

use super::{handlers, WebAppState};
use crate::config::WebConfig;
use crate::error::{Result, ServiceProbeError};
use crate::probe::{Prober, ProbeTarget};
use axum::{routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Web服务器
pub struct WebServer {
    /// 配置
    config: WebConfig,
    /// 共享状态
    state: WebAppState,
}

impl WebServer {
    /// 创建新的Web服务器
    pub fn new(config: WebConfig, targets: Vec<ProbeTarget>, prober: Arc<dyn Prober>) -> Self {
        let state = WebAppState::new(config.clone(), targets, prober);
        Self { config, state }
    }

    /// 创建路由
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(handlers::status_page))
            .route("/health", get(handlers::health))
            .route("/api/v1/probes", get(handlers::api_probes))
            .route("/api/v1/probes/{name}", get(handlers::api_probe))
            .route("/api/v1/runtime", get(handlers::api_runtime))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// 启动Web服务器，直到 `shutdown` 完成
    pub async fn start<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| ServiceProbeError::Web(format!("绑定地址 {} 失败: {}", addr, e)))?;

        info!("状态页已启动: http://{}", addr);
        info!("探测API: http://{}/api/v1/probes", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServiceProbeError::Web(format!("Web服务器运行失败: {}", e)))?;

        info!("Web服务器已关闭");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ProbeKind, ServiceProber};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn create_test_server() -> WebServer {
        // 端口 0 的目标在校验阶段失败，不会访问网络
        WebServer::new(
            WebConfig::default(),
            vec![ProbeTarget::new("cache", ProbeKind::Redis, "127.0.0.1", 0)],
            Arc::new(ServiceProber::new()),
        )
    }

    async fn get_body(server: &WebServer, uri: &str) -> (StatusCode, String) {
        let response = server
            .router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_health_route() {
        let (status, body) = get_body(&create_test_server(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("ok"));
    }

    #[tokio::test]
    async fn test_probes_route() {
        let (status, body) = get_body(&create_test_server(), "/api/v1/probes").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["summary"]["total"], 1);
        assert_eq!(json["data"]["summary"]["down"], 1);
        assert_eq!(json["data"]["results"][0]["connected"], false);
    }

    #[tokio::test]
    async fn test_single_probe_route() {
        let server = create_test_server();

        let (status, _) = get_body(&server, "/api/v1/probes/cache").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get_body(&server, "/api/v1/probes/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("unknown target"));
    }

    #[tokio::test]
    async fn test_status_page_route() {
        let (status, body) = get_body(&create_test_server(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("cache (redis)"));
        assert!(body.contains("127.0.0.1:0"));
        assert!(body.contains("Runtime Information"));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (status, _) = get_body(&create_test_server(), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
