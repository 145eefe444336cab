//! # 客户端配置签发服务
//!
//! 串联各阶段：分配客户端名 → 签发证书 → 检测保护模式 → 组装配置包 → 交付 → 清理。
//! 任一阶段失败即终止，错误携带所在阶段，不做自动重试。

use crate::bundle::BundleAssembler;
use crate::config::ProvisionConfig;
use crate::error::ProvisionError;
use crate::identity::{IdentityAllocator, IdentityRegistry, IndexFileRegistry};
use crate::issuer::{CommandRunner, CredentialIssuer, TokioCommandRunner};
use crate::protection::ProtectionModeDetector;
use crate::types::{ClientIdentifier, ProvisionStage, ProvisionedBundle};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 配置包交付方
///
/// 由传输层实现，把配置包发送给请求方。
#[async_trait]
pub trait BundleDelivery: Send + Sync {
    /// 交付配置包，返回成功即视为请求方已收到
    async fn deliver(&self, bundle: &ProvisionedBundle) -> Result<(), ProvisionError>;
}

/// 客户端配置签发服务
pub struct ProvisioningService {
    config: Arc<ProvisionConfig>,
    allocator: IdentityAllocator,
    issuer: CredentialIssuer,
    detector: ProtectionModeDetector,
    assembler: BundleAssembler,
}

impl ProvisioningService {
    /// 使用 easy-rsa 登记簿和系统进程创建服务
    pub fn new(config: ProvisionConfig) -> Self {
        let registry = Arc::new(IndexFileRegistry::new(config.registry_path()));
        Self::with_collaborators(config, registry, Arc::new(TokioCommandRunner))
    }

    /// 指定登记簿与进程执行器创建服务
    pub fn with_collaborators(
        config: ProvisionConfig,
        registry: Arc<dyn IdentityRegistry>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let config = Arc::new(config);

        let allocator =
            IdentityAllocator::new(registry, config.identifier_length, config.max_allocation_attempts);
        let issuer = CredentialIssuer::new(runner, &config.easyrsa_dir, &config.easyrsa_program);
        let detector = ProtectionModeDetector::new(config.server_config_path());
        let assembler = BundleAssembler::new(config.clone());

        Self {
            config,
            allocator,
            issuer,
            detector,
            assembler,
        }
    }

    /// 替换客户端名生成函数
    pub fn with_identifier_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(usize) -> ClientIdentifier + Send + Sync + 'static,
    {
        self.allocator = self.allocator.with_generator(generator);
        self
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// 生成一份新的客户端配置包并写入磁盘
    ///
    /// 返回的配置包由调用方负责交付，交付后调用 [`cleanup`](Self::cleanup) 删除。
    /// 失败不在这里记录日志，由调用方在边界处记录一次。
    pub async fn provision(&self) -> Result<ProvisionedBundle, ProvisionError> {
        debug!("进入阶段: {}", ProvisionStage::Allocate);
        let identifier = self.allocator.allocate().await?;

        debug!("进入阶段: {}", ProvisionStage::Issue);
        self.issuer.issue(&identifier).await?;

        debug!("进入阶段: {}", ProvisionStage::DetectProtection);
        let protection = self.detector.detect().await?;

        debug!("进入阶段: {}", ProvisionStage::Assemble);
        let bundle = self.assembler.assemble(&identifier, protection).await?;
        let directory = self.delivery_directory(&identifier).await;
        let path = self.assembler.write(&bundle, &directory, &identifier).await?;

        info!("客户端 {} 配置包就绪 (保护模式: {})", identifier, protection);
        Ok(ProvisionedBundle {
            identifier,
            path,
            protection,
        })
    }

    /// 删除已交付的配置包
    pub async fn cleanup(&self, bundle: &ProvisionedBundle) -> Result<(), ProvisionError> {
        debug!("进入阶段: {}", ProvisionStage::Cleanup);
        match tokio::fs::remove_file(&bundle.path).await {
            Ok(()) => {
                debug!("配置包已删除: {}", bundle.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProvisionError::CleanupFailed {
                path: bundle.path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// 完整流程：生成、交付并清理配置包
    ///
    /// 交付失败时同样删除配置包。返回的 future 在配置包写入后被丢弃会跳过清理，
    /// 调用方需要在独立任务中运行它，见 `tokio::spawn`。
    pub async fn provision_and_deliver<D>(&self, delivery: &D) -> Result<ClientIdentifier, ProvisionError>
    where
        D: BundleDelivery + ?Sized,
    {
        let bundle = self.provision().await?;

        debug!("进入阶段: {}", ProvisionStage::Deliver);
        let delivered = delivery.deliver(&bundle).await;
        let cleaned = self.cleanup(&bundle).await;

        match (delivered, cleaned) {
            (Ok(()), Ok(())) => {
                info!("客户端 {} 配置包已交付", bundle.identifier);
                Ok(bundle.identifier)
            }
            (Ok(()), Err(cleanup_err)) => Err(cleanup_err),
            (Err(e), cleaned) => {
                if let Err(cleanup_err) = cleaned {
                    warn!("交付失败后清理也失败: {}", cleanup_err);
                }
                Err(e)
            }
        }
    }

    /// 决定配置包写入的目录
    async fn delivery_directory(&self, identifier: &ClientIdentifier) -> PathBuf {
        match &self.config.delivery_directory {
            Some(dir) => dir.clone(),
            None => sys::resolve_delivery_directory(identifier.as_str()).await,
        }
    }
}
