//! # 签发服务主程序入口
//!
//! 加载配置，启动 HTTP 服务，收到 Ctrl+C 后优雅退出。

use ovpn_provisioner::app::{self, AppConfig, ProvisionerApp};
use ovpn_provisioner::AppResult;
use sys::SystemInfo;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("签发服务启动");

    // 加载配置
    let config = load_config()?;

    tracing::info!("{}", SystemInfo::new().summary());
    tracing::info!("{}", config.provision.generate_config_summary());

    let app = ProvisionerApp::new(config)?;
    app.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("监听停止信号失败: {}", e);
            return;
        }
        tracing::info!("收到停止信号，正在关闭服务...");
    })
    .await?;

    tracing::info!("签发服务已停止");
    Ok(())
}

/// 加载配置
///
/// 配置文件路径取自 `OVPN_PROVISIONER_CONFIG`，默认 `config.toml`；文件不存在时使用默认配置
fn load_config() -> AppResult<AppConfig> {
    #[cfg(feature = "config")]
    {
        let config_path = std::env::var(app::CONFIG_PATH_ENV)
            .unwrap_or_else(|_| app::DEFAULT_CONFIG_PATH.to_string());
        let path = std::path::Path::new(&config_path);

        if path.exists() {
            let config = app::load_config_file(path)?;
            tracing::info!("从配置文件加载: {}", config_path);
            return Ok(config);
        }
    }

    tracing::info!("使用默认配置");
    Ok(AppConfig::default())
}
