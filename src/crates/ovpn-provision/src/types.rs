//! # 签发流程数据类型
//!
//! 客户端名、隧道保护模式、配置包以及流程阶段的定义。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 客户端名字母表：小写、大写、数字、`_`、`-`，共 64 个字符
pub const IDENTIFIER_ALPHABET: &[u8; 64] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-";

/// 默认客户端名长度
pub const DEFAULT_IDENTIFIER_LENGTH: usize = 16;

/// 配置包文件扩展名
pub const BUNDLE_EXTENSION: &str = "ovpn";

/// 客户端名
///
/// 作为证书的 Common Name 使用，每个请求生成一次，不跨请求复用。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentifier(String);

impl ClientIdentifier {
    /// 从字母表中逐个均匀抽取字符生成客户端名
    pub fn generate(length: usize) -> Self {
        let name = (0..length)
            .map(|_| IDENTIFIER_ALPHABET[fastrand::usize(..IDENTIFIER_ALPHABET.len())] as char)
            .collect();
        Self(name)
    }

    /// 校验并包装已有的名称
    ///
    /// 名称为空或含有字母表以外的字符时返回 `None`。
    pub fn parse(name: &str) -> Option<Self> {
        if name.is_empty() || !name.bytes().all(is_identifier_byte) {
            return None;
        }
        Some(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 配置包文件名，`<客户端名>.ovpn`
    pub fn bundle_file_name(&self) -> String {
        format!("{}.{}", self.0, BUNDLE_EXTENSION)
    }
}

impl fmt::Display for ClientIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClientIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 判断字节是否属于客户端名字母表
pub fn is_identifier_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-'
}

/// 隧道保护模式
///
/// 由服务端配置决定配置包末尾附加哪一种共享密钥。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtectionMode {
    /// 不附加共享密钥
    None,
    /// tls-crypt：控制通道加密并认证
    Crypt,
    /// tls-auth：控制通道仅认证
    Auth,
}

impl ProtectionMode {
    /// 服务端配置中对应的指令，也是配置包中的块标签
    pub fn directive(&self) -> Option<&'static str> {
        match self {
            ProtectionMode::None => None,
            ProtectionMode::Crypt => Some("tls-crypt"),
            ProtectionMode::Auth => Some("tls-auth"),
        }
    }
}

impl fmt::Display for ProtectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.directive().unwrap_or("none"))
    }
}

/// 客户端配置包
///
/// 有序的文本块序列，渲染时以换行连接。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigBundle {
    blocks: Vec<String>,
}

impl ConfigBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一行原样文本
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.blocks.push(line.into());
    }

    /// 追加 `<tag>` 内容 `</tag>` 三个块
    pub fn push_tagged(&mut self, tag: &str, content: impl Into<String>) {
        self.blocks.push(format!("<{}>", tag));
        self.blocks.push(content.into());
        self.blocks.push(format!("</{}>", tag));
    }

    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    pub fn render(&self) -> String {
        self.blocks.join("\n")
    }
}

/// 签发流程阶段
///
/// 流程严格线性推进，任一阶段失败即终止。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProvisionStage {
    Allocate,
    Issue,
    DetectProtection,
    Assemble,
    Deliver,
    Cleanup,
}

impl fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisionStage::Allocate => "分配客户端名",
            ProvisionStage::Issue => "签发证书",
            ProvisionStage::DetectProtection => "检测隧道保护模式",
            ProvisionStage::Assemble => "组装配置包",
            ProvisionStage::Deliver => "交付配置包",
            ProvisionStage::Cleanup => "清理配置包",
        };
        f.write_str(name)
    }
}

/// 已写入磁盘、等待交付的配置包
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedBundle {
    /// 客户端名
    pub identifier: ClientIdentifier,
    /// 配置包文件路径
    pub path: PathBuf,
    /// 使用的隧道保护模式
    pub protection: ProtectionMode,
}

impl ProvisionedBundle {
    /// 交付时使用的文件名
    pub fn file_name(&self) -> String {
        self.identifier.bundle_file_name()
    }
}
