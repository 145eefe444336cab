//! # 签发服务应用模块
//!
//! 把签发流程挂到 HTTP 接口上：`GET /get` 生成并下载一份新的客户端配置包，
//! `GET /` 作为健康检查。

use crate::AppResult;
use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use error::{ErrorCategory, ErrorInfo, ErrorSeverity};
use ovpn_provision::error::CONFIG_FAILED_MESSAGE;
use ovpn_provision::{BundleDelivery, ProvisionConfig, ProvisionError, ProvisionedBundle, ProvisioningService};
use std::future::Future;
#[cfg(feature = "config")]
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{error, info};

/// 默认监听地址
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:80";

/// 配置文件路径环境变量
pub const CONFIG_PATH_ENV: &str = "OVPN_PROVISIONER_CONFIG";

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 配置包下载的内容类型
pub const BUNDLE_CONTENT_TYPE: &str = "application/x-openvpn-profile";

/// 应用程序配置
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP 监听地址
    pub listen_addr: String,
    /// 签发流程配置
    pub provision: ProvisionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            provision: ProvisionConfig::default(),
        }
    }
}

/// 应用程序状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AppState {
    /// 初始化中
    Initializing,
    /// 运行中
    Running,
    /// 已停止
    Stopped,
}

/// 把配置包读入内存，随 HTTP 响应一起发送
///
/// 读入内存即视为交付成功，之后配置包文件会被删除。响应体写入连接时的失败
/// （例如客户端中途断开）不会变成 `DeliveryFailed`，只出现在 hyper 的连接日志里。
#[derive(Default)]
pub struct ResponseDelivery {
    content: parking_lot::Mutex<Option<Vec<u8>>>,
}

impl ResponseDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出已读取的配置包内容
    pub fn take(&self) -> Option<Vec<u8>> {
        self.content.lock().take()
    }
}

#[async_trait]
impl BundleDelivery for ResponseDelivery {
    async fn deliver(&self, bundle: &ProvisionedBundle) -> Result<(), ProvisionError> {
        let content = tokio::fs::read(&bundle.path)
            .await
            .map_err(|e| ProvisionError::DeliveryFailed {
                identifier: bundle.identifier.to_string(),
                reason: format!("读取 {} 失败: {}", bundle.path.display(), e),
            })?;
        *self.content.lock() = Some(content);
        Ok(())
    }
}

/// 创建 HTTP 路由
///
/// Routes:
/// - `GET /` - 健康检查
/// - `GET /get` - 签发并下载新的客户端配置包
pub fn router(service: Arc<ProvisioningService>) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/get", get(get_bundle))
        .with_state(service)
}

/// 处理 `GET /get`
///
/// 签发流程在独立任务中运行：客户端断开导致处理函数被丢弃时，
/// 已开始的签发、交付和清理仍会执行完毕。
async fn get_bundle(State(service): State<Arc<ProvisioningService>>) -> Response {
    let delivery = Arc::new(ResponseDelivery::new());

    let task = {
        let delivery = delivery.clone();
        tokio::spawn(async move { service.provision_and_deliver(delivery.as_ref()).await })
    };

    let outcome = match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("签发任务异常终止: {}", e);
            return failure_response(CONFIG_FAILED_MESSAGE);
        }
    };

    match outcome {
        Ok(identifier) => match delivery.take() {
            Some(content) => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, BUNDLE_CONTENT_TYPE.to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", identifier.bundle_file_name()),
                    ),
                ],
                content,
            )
                .into_response(),
            None => error_response(ProvisionError::DeliveryFailed {
                identifier: identifier.to_string(),
                reason: "配置包内容为空".to_string(),
            }),
        },
        Err(e) => error_response(e),
    }
}

/// 失败响应只带对外描述，细节在这里写入日志
fn error_response(err: ProvisionError) -> Response {
    let message = err.public_message();
    let info = ErrorInfo::from(err);
    error!("配置包请求失败: {}", info);
    failure_response(message)
}

fn failure_response(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// 从 TOML 文件加载应用程序配置
#[cfg(feature = "config")]
pub fn load_config_file(path: &Path) -> AppResult<AppConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ErrorInfo::from(e).with_context(format!("读取配置文件 {}", path.display())))?;

    toml::from_str(&content).map_err(|e| {
        ErrorInfo::new(2003, format!("解析配置文件 {} 失败: {}", path.display(), e))
            .with_category(ErrorCategory::Configuration)
            .with_severity(ErrorSeverity::Critical)
    })
}

/// 签发服务应用程序
pub struct ProvisionerApp {
    config: AppConfig,
    service: Arc<ProvisioningService>,
    state: Arc<RwLock<AppState>>,
}

impl ProvisionerApp {
    /// 校验配置并创建应用程序
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.provision.validate()?;
        let service = ProvisioningService::new(config.provision.clone());
        Ok(Self::with_service(config, service))
    }

    /// 使用已构建的签发服务创建应用程序
    pub fn with_service(config: AppConfig, service: ProvisioningService) -> Self {
        Self {
            config,
            service: Arc::new(service),
            state: Arc::new(RwLock::new(AppState::Initializing)),
        }
    }

    pub fn router(&self) -> Router {
        router(self.service.clone())
    }

    /// 绑定配置的监听地址并运行，直到 `shutdown` 完成
    pub async fn run<F>(&self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.config.listen_addr).await.map_err(|e| {
            ErrorInfo::new(2001, format!("绑定监听地址 {} 失败: {}", self.config.listen_addr, e))
                .with_category(ErrorCategory::Network)
                .with_severity(ErrorSeverity::Critical)
        })?;
        self.run_with_listener(listener, shutdown).await
    }

    /// 在已绑定的监听器上运行
    pub async fn run_with_listener<F>(&self, listener: TcpListener, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            info!("签发服务监听于 {}", addr);
        }
        *self.state.write().await = AppState::Running;

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await;

        *self.state.write().await = AppState::Stopped;
        result.map_err(|e| {
            ErrorInfo::new(2002, format!("HTTP 服务异常退出: {}", e)).with_category(ErrorCategory::Network)
        })
    }

    /// 获取当前状态
    pub async fn state(&self) -> AppState {
        *self.state.read().await
    }

    /// 获取配置
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 获取签发服务
    pub fn service(&self) -> Arc<ProvisioningService> {
        self.service.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovpn_provision::{ClientIdentifier, ProtectionMode};

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:80");
        assert_eq!(config.provision.identifier_length, 16);
        assert!(config.provision.validate().is_ok());
    }

    #[test]
    fn test_app_creation_rejects_invalid_config() {
        let mut config = AppConfig::default();
        config.provision.identifier_length = 0;

        let err = ProvisionerApp::new(config).err().expect("无效配置应被拒绝");
        assert_eq!(err.code(), 7101);
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[tokio::test]
    async fn test_app_starts_initializing() {
        let app = ProvisionerApp::new(AppConfig::default()).unwrap();
        assert_eq!(app.state().await, AppState::Initializing);
        assert_eq!(app.config().listen_addr, DEFAULT_LISTEN_ADDR);
    }

    #[tokio::test]
    async fn test_response_delivery_reads_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client01.ovpn");
        tokio::fs::write(&path, "<ca>\nCA\n</ca>").await.unwrap();

        let bundle = ProvisionedBundle {
            identifier: ClientIdentifier::parse("client01").unwrap(),
            path,
            protection: ProtectionMode::None,
        };
        let delivery = ResponseDelivery::new();
        delivery.deliver(&bundle).await.unwrap();

        assert_eq!(delivery.take().unwrap(), b"<ca>\nCA\n</ca>".to_vec());
        assert!(delivery.take().is_none());
    }

    #[tokio::test]
    async fn test_response_delivery_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = ProvisionedBundle {
            identifier: ClientIdentifier::parse("client01").unwrap(),
            path: dir.path().join("client01.ovpn"),
            protection: ProtectionMode::None,
        };

        let err = ResponseDelivery::new().deliver(&bundle).await.unwrap_err();
        assert!(matches!(err, ProvisionError::DeliveryFailed { .. }));
        assert_eq!(err.public_message(), "Error sending file");
    }
}
