//! # 签发流程错误定义
//!
//! 每个错误变体对应流程中的一个阶段，对外只暴露笼统的失败描述。

use crate::types::ProvisionStage;
use error::{Error, ErrorCategory, ErrorInfo, ErrorKind, ErrorSeverity};

/// 对外的构建失败描述（分配、签发阶段）
pub const BUILD_FAILED_MESSAGE: &str = "Client build failed";

/// 对外的配置生成失败描述（检测、组装阶段）
pub const CONFIG_FAILED_MESSAGE: &str = "Error generating client configuration";

/// 对外的交付失败描述
pub const DELIVERY_FAILED_MESSAGE: &str = "Error sending file";

/// 签发流程错误
#[derive(Debug, Clone, Error)]
pub enum ProvisionError {
    /// 登记簿无法读取，唯一性检查不可信
    #[code(7001)]
    #[error("身份登记簿不可读 {path}: {reason}")]
    RegistryUnreadable { path: String, reason: String },

    /// 达到最大尝试次数仍未找到可用客户端名
    #[code(7002)]
    #[error("尝试 {attempts} 次后仍未找到可用的客户端名")]
    AllocationExhausted { attempts: u32 },

    /// 证书颁发机构执行失败
    #[code(7003)]
    #[error("客户端 {identifier} 证书签发失败: {reason}")]
    IssueFailed {
        identifier: String,
        status: Option<i32>,
        reason: String,
        output: String,
    },

    /// 服务端配置存在但无法读取
    #[code(7004)]
    #[error("服务端配置不可读 {path}: {reason}")]
    ServerConfigUnreadable { path: String, reason: String },

    /// 证书材料缺失或格式错误
    #[code(7005)]
    #[error("客户端 {identifier} 配置包组装失败: {reason}")]
    AssembleFailed { identifier: String, reason: String },

    #[code(7006)]
    #[error("客户端 {identifier} 配置包交付失败: {reason}")]
    DeliveryFailed { identifier: String, reason: String },

    #[code(7007)]
    #[error("配置包清理失败 {path}: {reason}")]
    CleanupFailed { path: String, reason: String },
}

impl ProvisionError {
    /// 产生该错误的流程阶段
    pub fn stage(&self) -> ProvisionStage {
        match self {
            ProvisionError::RegistryUnreadable { .. } | ProvisionError::AllocationExhausted { .. } => {
                ProvisionStage::Allocate
            }
            ProvisionError::IssueFailed { .. } => ProvisionStage::Issue,
            ProvisionError::ServerConfigUnreadable { .. } => ProvisionStage::DetectProtection,
            ProvisionError::AssembleFailed { .. } => ProvisionStage::Assemble,
            ProvisionError::DeliveryFailed { .. } => ProvisionStage::Deliver,
            ProvisionError::CleanupFailed { .. } => ProvisionStage::Cleanup,
        }
    }

    /// 返回给调用方的描述，不含路径和颁发机构输出
    pub fn public_message(&self) -> &'static str {
        match self.stage() {
            ProvisionStage::Allocate | ProvisionStage::Issue => BUILD_FAILED_MESSAGE,
            ProvisionStage::DetectProtection | ProvisionStage::Assemble => CONFIG_FAILED_MESSAGE,
            ProvisionStage::Deliver | ProvisionStage::Cleanup => DELIVERY_FAILED_MESSAGE,
        }
    }
}

impl From<ProvisionError> for ErrorInfo {
    fn from(err: ProvisionError) -> Self {
        let (category, severity) = match &err {
            ProvisionError::RegistryUnreadable { .. } => (ErrorCategory::Registry, ErrorSeverity::Critical),
            ProvisionError::AllocationExhausted { .. } => (ErrorCategory::Registry, ErrorSeverity::Error),
            ProvisionError::IssueFailed { .. } => (ErrorCategory::Authority, ErrorSeverity::Error),
            ProvisionError::ServerConfigUnreadable { .. } => {
                (ErrorCategory::Configuration, ErrorSeverity::Error)
            }
            ProvisionError::AssembleFailed { .. } => (ErrorCategory::Assembly, ErrorSeverity::Error),
            ProvisionError::DeliveryFailed { .. } => (ErrorCategory::Delivery, ErrorSeverity::Warning),
            ProvisionError::CleanupFailed { .. } => (ErrorCategory::FileSystem, ErrorSeverity::Warning),
        };

        ErrorInfo::new(err.error_code(), err.to_string())
            .with_context(format!("阶段: {}", err.stage()))
            .with_category(category)
            .with_severity(severity)
    }
}

/// 配置错误
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[code(7101)]
    #[error("无效的客户端名长度: {0}")]
    InvalidIdentifierLength(usize),

    #[code(7102)]
    #[error("最大尝试次数必须大于 0")]
    InvalidAttemptLimit,

    #[code(7103)]
    #[error("无效的路径配置: {0}")]
    InvalidPath(String),

    #[code(7104)]
    #[error("配置验证失败: {0}")]
    ValidationFailed(String),
}

impl From<ConfigError> for ErrorInfo {
    fn from(err: ConfigError) -> Self {
        ErrorInfo::new(err.error_code(), err.to_string())
            .with_category(ErrorCategory::Configuration)
            .with_severity(ErrorSeverity::Critical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_messages_by_stage() {
        let err = ProvisionError::RegistryUnreadable {
            path: "/etc/openvpn/easy-rsa/pki/index.txt".to_string(),
            reason: "permission denied".to_string(),
        };
        assert_eq!(err.stage(), ProvisionStage::Allocate);
        assert_eq!(err.public_message(), BUILD_FAILED_MESSAGE);

        let err = ProvisionError::IssueFailed {
            identifier: "abc".to_string(),
            status: Some(1),
            reason: "非零退出".to_string(),
            output: "easyrsa: pki not initialised".to_string(),
        };
        assert_eq!(err.public_message(), BUILD_FAILED_MESSAGE);

        let err = ProvisionError::AssembleFailed {
            identifier: "abc".to_string(),
            reason: "未找到证书块".to_string(),
        };
        assert_eq!(err.stage(), ProvisionStage::Assemble);
        assert_eq!(err.public_message(), CONFIG_FAILED_MESSAGE);

        let err = ProvisionError::DeliveryFailed {
            identifier: "abc".to_string(),
            reason: "连接中断".to_string(),
        };
        assert_eq!(err.public_message(), DELIVERY_FAILED_MESSAGE);
    }

    #[test]
    fn test_public_message_does_not_leak_details() {
        let err = ProvisionError::ServerConfigUnreadable {
            path: "/etc/openvpn/server.conf".to_string(),
            reason: "permission denied".to_string(),
        };
        assert!(!err.public_message().contains("/etc/openvpn"));
        assert!(err.to_string().contains("/etc/openvpn/server.conf"));
    }

    #[test]
    fn test_into_error_info() {
        let err = ProvisionError::IssueFailed {
            identifier: "abc".to_string(),
            status: Some(2),
            reason: "非零退出".to_string(),
            output: String::new(),
        };
        let info: ErrorInfo = err.into();
        assert_eq!(info.code(), 7003);
        assert_eq!(info.category(), ErrorCategory::Authority);
        assert!(info.context()[0].contains("签发证书"));
    }

    #[test]
    fn test_config_error_codes() {
        assert_eq!(ConfigError::InvalidIdentifierLength(0).error_code(), 7101);
        let info: ErrorInfo = ConfigError::InvalidAttemptLimit.into();
        assert!(info.is_critical());
    }
}
