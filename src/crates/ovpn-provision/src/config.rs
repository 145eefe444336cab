//! # 签发配置
//!
//! 描述 OpenVPN 与 easy-rsa 的目录布局以及签发流程的参数，
//! 通过构建器创建并验证。

use crate::error::ConfigError;
use crate::types::{ClientIdentifier, ProtectionMode, DEFAULT_IDENTIFIER_LENGTH, IDENTIFIER_ALPHABET};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 默认 OpenVPN 配置目录
pub const DEFAULT_OPENVPN_DIR: &str = "/etc/openvpn";

/// 默认 easy-rsa 工作目录
pub const DEFAULT_EASYRSA_DIR: &str = "/etc/openvpn/easy-rsa";

/// 默认 easy-rsa 可执行文件（相对工作目录）
pub const DEFAULT_EASYRSA_PROGRAM: &str = "./easyrsa";

/// 默认最大分配尝试次数
pub const DEFAULT_MAX_ALLOCATION_ATTEMPTS: u32 = 1000;

/// 配置包文件权限
pub const DEFAULT_BUNDLE_FILE_MODE: u32 = 0o600;

/// 签发配置构建器
#[derive(Debug, Clone, Default)]
pub struct ProvisionConfigBuilder {
    config: ProvisionConfig,
}

impl ProvisionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置 OpenVPN 配置目录（server.conf 与共享密钥所在目录）
    pub fn with_openvpn_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config.openvpn_dir = dir.as_ref().to_path_buf();
        self
    }

    /// 设置 easy-rsa 工作目录
    pub fn with_easyrsa_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config.easyrsa_dir = dir.as_ref().to_path_buf();
        self
    }

    /// 设置 easy-rsa 可执行文件
    pub fn with_easyrsa_program(mut self, program: impl Into<String>) -> Self {
        self.config.easyrsa_program = program.into();
        self
    }

    /// 设置客户端名长度
    pub fn with_identifier_length(mut self, length: usize) -> Self {
        self.config.identifier_length = length;
        self
    }

    /// 设置最大分配尝试次数，`None` 表示不限
    pub fn with_max_allocation_attempts(mut self, attempts: Option<u32>) -> Self {
        self.config.max_allocation_attempts = attempts;
        self
    }

    /// 固定交付目录，不再按主机环境选择
    pub fn with_delivery_directory<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config.delivery_directory = Some(dir.as_ref().to_path_buf());
        self
    }

    /// 设置客户端模板文件，内容会放在配置包开头
    pub fn with_client_template<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.client_template_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// 设置配置包文件权限（仅 Unix 生效）
    pub fn with_bundle_file_mode(mut self, mode: u32) -> Self {
        self.config.bundle_file_mode = mode;
        self
    }

    /// 构建并验证配置
    pub fn build(self) -> Result<ProvisionConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// 签发配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// OpenVPN 配置目录
    pub openvpn_dir: PathBuf,

    /// easy-rsa 工作目录，颁发机构在此目录下执行
    pub easyrsa_dir: PathBuf,

    /// easy-rsa 可执行文件
    pub easyrsa_program: String,

    /// 客户端名长度
    pub identifier_length: usize,

    /// 最大分配尝试次数
    pub max_allocation_attempts: Option<u32>,

    /// 固定交付目录
    pub delivery_directory: Option<PathBuf>,

    /// 客户端模板文件
    pub client_template_path: Option<PathBuf>,

    /// 配置包文件权限
    pub bundle_file_mode: u32,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            openvpn_dir: PathBuf::from(DEFAULT_OPENVPN_DIR),
            easyrsa_dir: PathBuf::from(DEFAULT_EASYRSA_DIR),
            easyrsa_program: DEFAULT_EASYRSA_PROGRAM.to_string(),
            identifier_length: DEFAULT_IDENTIFIER_LENGTH,
            max_allocation_attempts: Some(DEFAULT_MAX_ALLOCATION_ATTEMPTS),
            delivery_directory: None,
            client_template_path: None,
            bundle_file_mode: DEFAULT_BUNDLE_FILE_MODE,
        }
    }
}

impl ProvisionConfig {
    /// 创建配置构建器
    pub fn builder() -> ProvisionConfigBuilder {
        ProvisionConfigBuilder::new()
    }

    /// 验证配置参数
    ///
    /// 从配置文件反序列化得到的配置也需要经过这里。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identifier_length == 0 || self.identifier_length > IDENTIFIER_ALPHABET.len() {
            return Err(ConfigError::InvalidIdentifierLength(self.identifier_length));
        }

        if self.max_allocation_attempts == Some(0) {
            return Err(ConfigError::InvalidAttemptLimit);
        }

        if self.openvpn_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidPath("OpenVPN 目录不能为空".to_string()));
        }

        if self.easyrsa_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidPath("easy-rsa 目录不能为空".to_string()));
        }

        if let Some(dir) = &self.delivery_directory {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::InvalidPath("交付目录不能为空".to_string()));
            }
        }

        if self.easyrsa_program.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("easy-rsa 可执行文件不能为空".to_string()));
        }

        if self.bundle_file_mode > 0o777 {
            return Err(ConfigError::ValidationFailed(format!(
                "无效的文件权限: {:o}",
                self.bundle_file_mode
            )));
        }

        Ok(())
    }

    /// PKI 目录
    pub fn pki_dir(&self) -> PathBuf {
        self.easyrsa_dir.join("pki")
    }

    /// 已签发身份登记簿（easy-rsa 的 index.txt）
    pub fn registry_path(&self) -> PathBuf {
        self.pki_dir().join("index.txt")
    }

    pub fn ca_certificate_path(&self) -> PathBuf {
        self.pki_dir().join("ca.crt")
    }

    pub fn issued_certificate_path(&self, identifier: &ClientIdentifier) -> PathBuf {
        self.pki_dir().join("issued").join(format!("{}.crt", identifier))
    }

    pub fn private_key_path(&self, identifier: &ClientIdentifier) -> PathBuf {
        self.pki_dir().join("private").join(format!("{}.key", identifier))
    }

    pub fn server_config_path(&self) -> PathBuf {
        self.openvpn_dir.join("server.conf")
    }

    /// 保护模式对应的共享密钥文件
    pub fn protection_key_path(&self, mode: ProtectionMode) -> Option<PathBuf> {
        match mode {
            ProtectionMode::None => None,
            ProtectionMode::Crypt => Some(self.openvpn_dir.join("tls-crypt.key")),
            ProtectionMode::Auth => Some(self.openvpn_dir.join("tls-auth.key")),
        }
    }

    /// 生成配置摘要
    pub fn generate_config_summary(&self) -> String {
        format!(
            "签发配置摘要:\n\
            - OpenVPN 目录: {}\n\
            - easy-rsa 目录: {}\n\
            - 客户端名长度: {}\n\
            - 最大尝试次数: {}\n\
            - 交付目录: {}",
            self.openvpn_dir.display(),
            self.easyrsa_dir.display(),
            self.identifier_length,
            self.max_allocation_attempts
                .map(|n| n.to_string())
                .unwrap_or_else(|| "不限".to_string()),
            self.delivery_directory
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "按主机环境选择".to_string()),
        )
    }
}
