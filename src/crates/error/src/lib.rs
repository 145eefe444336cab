//! # 错误处理框架
//!
//! 为客户端配置签发服务的各个组件提供统一的错误信息结构。
//!
//! ## 特性
//!
//! - **统一错误信息**: `ErrorInfo` 携带错误码、消息、上下文、严重程度和类别
//! - **派生宏**: 通过 `#[derive(Error)]` 为错误枚举实现 `Display`、`ErrorKind` 和 `std::error::Error`
//! - **显式转换**: 各模块的错误枚举通过 `From` 显式映射为 `ErrorInfo`
//!
//! ## 使用示例
//!
//! ```rust
//! use error::{Error, ErrorKind};
//!
//! #[derive(Debug, Error)]
//! enum BundleError {
//!     #[error("文件缺失: {0}")]
//!     Missing(String),
//!
//!     #[code(42)]
//!     #[error("证书块缺失: {path}")]
//!     NoPem { path: String },
//! }
//!
//! let err = BundleError::NoPem { path: "issued/a.crt".to_string() };
//! assert_eq!(err.error_code(), 42);
//! ```

pub use error_derive::Error;

use std::fmt;

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// 调试级别
    Debug = 0,
    /// 信息级别
    Info = 1,
    /// 警告级别：需要注意但不影响继续运行
    Warning = 2,
    /// 错误级别：当前请求失败
    Error = 3,
    /// 严重级别：服务无法继续提供签发
    Critical = 4,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Debug => write!(f, "调试"),
            ErrorSeverity::Info => write!(f, "信息"),
            ErrorSeverity::Warning => write!(f, "警告"),
            ErrorSeverity::Error => write!(f, "错误"),
            ErrorSeverity::Critical => write!(f, "严重"),
        }
    }
}

/// 错误类别
///
/// 按签发流程中出错的协作方分类，便于日志检索和统计。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// IO 错误
    Io,
    /// 配置错误
    Configuration,
    /// 验证错误
    Validation,
    /// 身份登记簿错误
    Registry,
    /// 证书颁发机构错误
    Authority,
    /// 配置包组装错误
    Assembly,
    /// 交付错误
    Delivery,
    /// 文件系统错误
    FileSystem,
    /// 权限错误
    Permission,
    /// 网络错误
    Network,
    /// 系统错误
    System,
    /// 其他错误
    Other,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Io => write!(f, "IO错误"),
            ErrorCategory::Configuration => write!(f, "配置错误"),
            ErrorCategory::Validation => write!(f, "验证错误"),
            ErrorCategory::Registry => write!(f, "登记簿错误"),
            ErrorCategory::Authority => write!(f, "颁发机构错误"),
            ErrorCategory::Assembly => write!(f, "组装错误"),
            ErrorCategory::Delivery => write!(f, "交付错误"),
            ErrorCategory::FileSystem => write!(f, "文件系统错误"),
            ErrorCategory::Permission => write!(f, "权限错误"),
            ErrorCategory::Network => write!(f, "网络错误"),
            ErrorCategory::System => write!(f, "系统错误"),
            ErrorCategory::Other => write!(f, "其他错误"),
        }
    }
}

/// 错误类型的核心trait
///
/// 由 `#[derive(Error)]` 自动实现，也可以手动实现。
pub trait ErrorKind: fmt::Debug + fmt::Display + Send + Sync {
    /// 获取错误码
    fn error_code(&self) -> u32;

    /// 获取错误消息
    fn error_message(&self) -> String;

    /// 获取源错误
    fn source_kind(&self) -> Option<&(dyn ErrorKind + Send + Sync)> {
        None
    }
}

/// 错误信息结构体
///
/// 封装了错误码、消息、源错误、上下文、严重程度和类别。
#[derive(Debug)]
pub struct ErrorInfo {
    code: u32,
    message: String,
    source: Option<Box<dyn ErrorKind + Send + Sync>>,
    context: Vec<String>,
    severity: ErrorSeverity,
    category: ErrorCategory,
}

impl Clone for ErrorInfo {
    fn clone(&self) -> Self {
        Self {
            code: self.code,
            message: self.message.clone(),
            source: None, // 源错误不克隆
            context: self.context.clone(),
            severity: self.severity,
            category: self.category,
        }
    }
}

impl PartialEq for ErrorInfo {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
            && self.message == other.message
            && self.context == other.context
            && self.severity == other.severity
            && self.category == other.category
    }
}

impl ErrorInfo {
    /// 创建一个新的错误信息
    ///
    /// # 示例
    ///
    /// ```rust
    /// use error::ErrorInfo;
    ///
    /// let error = ErrorInfo::new(7003, "客户端证书签发失败".to_string());
    /// assert_eq!(error.code(), 7003);
    /// ```
    pub fn new(code: u32, message: String) -> Self {
        Self {
            code,
            message,
            source: None,
            context: Vec::new(),
            severity: ErrorSeverity::Error,
            category: ErrorCategory::Other,
        }
    }

    /// 创建一个带有源错误的错误信息
    pub fn with_source<E: ErrorKind + 'static>(code: u32, message: String, source: E) -> Self {
        Self {
            code,
            message,
            source: Some(Box::new(source)),
            context: Vec::new(),
            severity: ErrorSeverity::Error,
            category: ErrorCategory::Other,
        }
    }

    /// 链式添加错误上下文
    ///
    /// ```rust
    /// use error::ErrorInfo;
    ///
    /// let error = ErrorInfo::new(404, "文件未找到".to_string())
    ///     .with_context("读取 ca.crt".to_string());
    /// assert_eq!(error.context().len(), 1);
    /// ```
    pub fn with_context(mut self, context: String) -> Self {
        self.context.push(context);
        self
    }

    /// 设置错误严重程度
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// 设置错误类别
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source(&self) -> Option<&(dyn ErrorKind + Send + Sync)> {
        self.source.as_deref()
    }

    pub fn context(&self) -> &[String] {
        &self.context
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// 判断是否为严重错误
    pub fn is_critical(&self) -> bool {
        self.severity == ErrorSeverity::Critical
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}][{}][错误码: {}] {}",
            self.severity, self.category, self.code, self.message
        )?;

        for ctx in &self.context {
            write!(f, "\n  上下文: {}", ctx)?;
        }

        if let Some(source) = &self.source {
            write!(f, "\n  由以下错误引起: {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorInfo {}

impl ErrorKind for ErrorInfo {
    fn error_code(&self) -> u32 {
        self.code
    }

    fn error_message(&self) -> String {
        self.message.clone()
    }

    fn source_kind(&self) -> Option<&(dyn ErrorKind + Send + Sync)> {
        self.source.as_deref()
    }
}

/// 使用 `ErrorInfo` 作为错误类型的 Result 别名
pub type Result<T> = std::result::Result<T, ErrorInfo>;

impl From<std::io::Error> for ErrorInfo {
    fn from(err: std::io::Error) -> Self {
        let (code, category) = match err.kind() {
            std::io::ErrorKind::NotFound => (404, ErrorCategory::FileSystem),
            std::io::ErrorKind::PermissionDenied => (403, ErrorCategory::Permission),
            std::io::ErrorKind::AlreadyExists => (409, ErrorCategory::FileSystem),
            std::io::ErrorKind::InvalidInput | std::io::ErrorKind::InvalidData => {
                (400, ErrorCategory::Validation)
            }
            std::io::ErrorKind::AddrInUse
            | std::io::ErrorKind::AddrNotAvailable
            | std::io::ErrorKind::ConnectionRefused => (503, ErrorCategory::Network),
            std::io::ErrorKind::TimedOut => (504, ErrorCategory::Network),
            _ => (500, ErrorCategory::Io),
        };

        ErrorInfo::new(code, err.to_string())
            .with_category(category)
            .with_severity(ErrorSeverity::Error)
    }
}
