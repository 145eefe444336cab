//! # OpenVPN 客户端配置签发
//!
//! 按需为新客户端生成身份并交付一份自包含的 `.ovpn` 配置包。
//!
//! ## 流程
//!
//! - **分配**: 生成随机客户端名，对照 easy-rsa 登记簿（`pki/index.txt`）确认未被使用
//! - **签发**: 调用 `easyrsa --batch build-client-full <名称> nopass`
//! - **检测**: 扫描 `server.conf` 判断使用 tls-crypt、tls-auth 或都不使用
//! - **组装**: 内嵌 CA 证书、客户端证书、私钥与共享密钥，写入 `<名称>.ovpn`
//! - **交付与清理**: 由传输层发送配置包，随后删除文件
//!
//! ## 使用示例
//!
//! ```no_run
//! use ovpn_provision::{ProvisionConfig, ProvisioningService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProvisionConfig::builder()
//!     .with_openvpn_dir("/etc/openvpn")
//!     .with_easyrsa_dir("/etc/openvpn/easy-rsa")
//!     .build()?;
//!
//! let service = ProvisioningService::new(config);
//! let bundle = service.provision().await?;
//! println!("配置包: {}", bundle.path.display());
//! service.cleanup(&bundle).await?;
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod config;
pub mod error;
pub mod identity;
pub mod issuer;
pub mod protection;
pub mod service;
pub mod types;

pub use bundle::{extract_certificate_pem, BundleAssembler};
pub use config::{ProvisionConfig, ProvisionConfigBuilder};
pub use error::{ConfigError, ProvisionError};
pub use identity::{IdentityAllocator, IdentityRegistry, IndexFileRegistry};
pub use issuer::{CommandOutput, CommandRunner, CredentialIssuer, TokioCommandRunner};
pub use protection::{detect_from_text, ProtectionModeDetector};
pub use service::{BundleDelivery, ProvisioningService};
pub use types::{ClientIdentifier, ConfigBundle, ProtectionMode, ProvisionStage, ProvisionedBundle};
