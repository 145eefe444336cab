//! # OpenVPN 客户端配置签发服务
//!
//! 每次请求生成一个新的客户端身份，调用 easy-rsa 签发证书，
//! 组装内嵌全部证书材料的 `.ovpn` 配置包并通过 HTTP 下载，下载后删除文件。
//!
//! ## 模块架构
//!
//! ```text
//! ovpn-provisioner/
//! ├── src/
//! │   ├── main.rs         # 主程序入口
//! │   ├── lib.rs          # 库入口
//! │   ├── app.rs          # HTTP 应用
//! │   └── crates/
//! │       ├── error/          # 错误处理框架
//! │       ├── error-derive/   # 错误派生宏
//! │       ├── sys/            # 主机环境与交付目录
//! │       └── ovpn-provision/ # 签发流程
//! ```
//!
//! ## 使用示例
//!
//! ```no_run
//! use ovpn_provisioner::app::{AppConfig, ProvisionerApp};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = ProvisionerApp::new(AppConfig::default())?;
//!     app.run(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod app;

use error::ErrorInfo;

pub use ovpn_provision::{
    BundleDelivery, ClientIdentifier, ConfigError, ProtectionMode, ProvisionConfig, ProvisionError,
    ProvisionStage, ProvisionedBundle, ProvisioningService,
};

/// 应用程序结果类型
pub type AppResult<T> = std::result::Result<T, ErrorInfo>;
