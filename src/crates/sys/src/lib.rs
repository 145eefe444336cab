//! # 主机环境模块
//!
//! 提供签发服务所需的主机信息：启动日志中的系统概况，以及
//! 配置包交付目录的选择逻辑。
//!
//! ## 使用示例
//!
//! ```no_run
//! use sys::SystemInfo;
//!
//! let sys_info = SystemInfo::new();
//! println!("主机: {} ({})", sys_info.host_name(), sys_info.os_name());
//! ```

use sysinfo::System;

pub mod delivery;

pub use delivery::{choose_delivery_directory, invoking_user, resolve_delivery_directory};

/// 系统信息
///
/// 只刷新内存信息，主机名等静态信息按需读取。
pub struct SystemInfo {
    system: System,
}

impl SystemInfo {
    /// 创建新的系统信息对象
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        Self { system }
    }

    /// 获取操作系统名称
    pub fn os_name(&self) -> String {
        System::name().unwrap_or_else(|| String::from("Unknown"))
    }

    /// 获取内核版本
    pub fn kernel_version(&self) -> String {
        System::kernel_version().unwrap_or_else(|| String::from("Unknown"))
    }

    /// 获取主机名
    pub fn host_name(&self) -> String {
        System::host_name().unwrap_or_else(|| String::from("Unknown"))
    }

    /// 获取内存信息（已使用，总量），单位字节
    pub fn memory_info(&self) -> (u64, u64) {
        (self.system.used_memory(), self.system.total_memory())
    }

    /// 生成一行启动摘要
    pub fn summary(&self) -> String {
        let (used, total) = self.memory_info();
        format!(
            "{} / {} / 内核 {} / 内存 {}MB/{}MB",
            self.host_name(),
            self.os_name(),
            self.kernel_version(),
            used / (1024 * 1024),
            total / (1024 * 1024)
        )
    }
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self::new()
    }
}
