//! # 交付目录选择
//!
//! 决定生成的 `.ovpn` 文件写入哪个目录。决策本身是纯函数，
//! 文件系统检查和环境变量读取放在外层。

use std::path::{Path, PathBuf};
use tracing::debug;

/// 普通用户主目录的根
pub const HOME_ROOT: &str = "/home";

/// root 用户主目录
pub const ROOT_HOME: &str = "/root";

/// 记录 sudo 调用者的环境变量
pub const INVOKING_USER_ENV: &str = "SUDO_USER";

/// 选择交付目录
///
/// - 候选主目录存在：使用候选主目录
/// - 否则调用者存在且不是 root：使用 `/home/<调用者>`
/// - 否则：使用 `/root`
///
/// # 示例
///
/// ```rust
/// use std::path::{Path, PathBuf};
/// use sys::choose_delivery_directory;
///
/// let dir = choose_delivery_directory(Path::new("/home/abc"), false, Some("alice"));
/// assert_eq!(dir, PathBuf::from("/home/alice"));
/// ```
pub fn choose_delivery_directory(
    candidate_home: &Path,
    candidate_home_exists: bool,
    invoking_user: Option<&str>,
) -> PathBuf {
    if candidate_home_exists {
        return candidate_home.to_path_buf();
    }

    match invoking_user {
        Some(user) if !user.is_empty() && user != "root" => Path::new(HOME_ROOT).join(user),
        _ => PathBuf::from(ROOT_HOME),
    }
}

/// 读取 sudo 调用者，空值视为不存在
pub fn invoking_user() -> Option<String> {
    std::env::var(INVOKING_USER_ENV)
        .ok()
        .filter(|user| !user.trim().is_empty())
}

/// 按客户端名解析交付目录
///
/// 候选主目录为 `/home/<客户端名>`，无法判断是否存在时按不存在处理。
pub async fn resolve_delivery_directory(client_name: &str) -> PathBuf {
    let candidate_home = Path::new(HOME_ROOT).join(client_name);
    let exists = tokio::fs::try_exists(&candidate_home).await.unwrap_or(false);
    let user = invoking_user();

    let dir = choose_delivery_directory(&candidate_home, exists, user.as_deref());
    debug!("交付目录: {} (候选主目录存在: {}, 调用者: {:?})", dir.display(), exists, user);
    dir
}
