//! # 隧道保护模式检测
//!
//! 对服务端配置做文本扫描：包含 `tls-crypt` 为 Crypt，否则包含 `tls-auth`
//! 为 Auth，否则为 None。这里不解析配置语法。

use crate::error::ProvisionError;
use crate::types::ProtectionMode;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 从服务端配置文本判断保护模式，Crypt 优先
pub fn detect_from_text(text: &str) -> ProtectionMode {
    if text.contains("tls-crypt") {
        ProtectionMode::Crypt
    } else if text.contains("tls-auth") {
        ProtectionMode::Auth
    } else {
        ProtectionMode::None
    }
}

/// 隧道保护模式检测器
#[derive(Debug, Clone)]
pub struct ProtectionModeDetector {
    server_config_path: PathBuf,
}

impl ProtectionModeDetector {
    pub fn new<P: AsRef<Path>>(server_config_path: P) -> Self {
        Self {
            server_config_path: server_config_path.as_ref().to_path_buf(),
        }
    }

    /// 读取服务端配置并检测保护模式
    ///
    /// 配置文件不存在时返回 `ProtectionMode::None`；存在但无法读取时返回错误。
    pub async fn detect(&self) -> Result<ProtectionMode, ProvisionError> {
        let content = match tokio::fs::read(&self.server_config_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("服务端配置不存在: {}", self.server_config_path.display());
                return Ok(ProtectionMode::None);
            }
            Err(e) => {
                warn!("读取服务端配置失败 {}: {}", self.server_config_path.display(), e);
                return Err(ProvisionError::ServerConfigUnreadable {
                    path: self.server_config_path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let mode = detect_from_text(&String::from_utf8_lossy(&content));
        debug!("检测到隧道保护模式: {}", mode);
        Ok(mode)
    }
}
