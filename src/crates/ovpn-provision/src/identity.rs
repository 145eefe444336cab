//! # 客户端名分配
//!
//! 随机生成客户端名，并对照颁发机构的已签发身份登记簿检查唯一性。
//! 登记簿无法读取时分配直接失败，不会把未经检查的名称交给后续阶段。

use crate::error::ProvisionError;
use crate::types::ClientIdentifier;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 已签发身份登记簿
#[async_trait]
pub trait IdentityRegistry: Send + Sync {
    /// 登记簿中是否已有以该名称为 Common Name 的记录
    async fn contains(&self, identifier: &ClientIdentifier) -> Result<bool, ProvisionError>;
}

/// 基于 easy-rsa `index.txt` 的登记簿
///
/// 每行形如 `V\t<到期时间>\t\t<序列号>\tunknown\t/CN=<名称>`。
#[derive(Debug, Clone)]
pub struct IndexFileRegistry {
    path: PathBuf,
}

impl IndexFileRegistry {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl IdentityRegistry for IndexFileRegistry {
    async fn contains(&self, identifier: &ClientIdentifier) -> Result<bool, ProvisionError> {
        let content = tokio::fs::read(&self.path).await.map_err(|e| {
            warn!("读取登记簿失败 {}: {}", self.path.display(), e);
            ProvisionError::RegistryUnreadable {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        let content = String::from_utf8_lossy(&content);

        registry_contains(&content, identifier).map_err(|e| ProvisionError::RegistryUnreadable {
            path: self.path.display().to_string(),
            reason: format!("无法构造匹配模式: {}", e),
        })
    }
}

/// 在登记簿文本中查找 `/CN=<名称>` 结尾的行
///
/// 锚定行尾，避免与更长名称发生子串误匹配。
pub fn registry_contains(content: &str, identifier: &ClientIdentifier) -> Result<bool, regex::Error> {
    let pattern = Regex::new(&format!(r"(?m)/CN={}\r?$", regex::escape(identifier.as_str())))?;
    Ok(pattern.is_match(content))
}

type IdentifierGenerator = dyn Fn(usize) -> ClientIdentifier + Send + Sync;

/// 客户端名分配器
///
/// 分配与登记簿检查在同一把锁内完成，并发请求不会同时检查同一时刻的登记簿快照。
pub struct IdentityAllocator {
    registry: Arc<dyn IdentityRegistry>,
    length: usize,
    max_attempts: Option<u32>,
    generator: Box<IdentifierGenerator>,
    lock: Mutex<()>,
}

impl IdentityAllocator {
    /// 创建分配器
    ///
    /// # 参数
    ///
    /// * `registry` - 已签发身份登记簿
    /// * `length` - 客户端名长度
    /// * `max_attempts` - 最大尝试次数，`None` 表示不限
    pub fn new(registry: Arc<dyn IdentityRegistry>, length: usize, max_attempts: Option<u32>) -> Self {
        Self {
            registry,
            length,
            max_attempts,
            generator: Box::new(ClientIdentifier::generate),
            lock: Mutex::new(()),
        }
    }

    /// 替换候选名生成函数
    pub fn with_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(usize) -> ClientIdentifier + Send + Sync + 'static,
    {
        self.generator = Box::new(generator);
        self
    }

    /// 分配一个登记簿中不存在的客户端名
    pub async fn allocate(&self) -> Result<ClientIdentifier, ProvisionError> {
        let _guard = self.lock.lock().await;
        let mut attempts: u32 = 0;

        loop {
            if let Some(max) = self.max_attempts {
                if attempts >= max {
                    warn!("客户端名分配在 {} 次尝试后放弃", attempts);
                    return Err(ProvisionError::AllocationExhausted { attempts });
                }
            }
            attempts = attempts.saturating_add(1);

            let candidate = (self.generator)(self.length);
            if self.registry.contains(&candidate).await? {
                debug!("客户端名 {} 已被占用，重新生成", candidate);
                continue;
            }

            info!("已分配客户端名: {} (尝试 {} 次)", candidate, attempts);
            return Ok(candidate);
        }
    }
}
