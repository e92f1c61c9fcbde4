use std::path::PathBuf;

/// pmsync 统一错误类型
///
/// 引擎级错误（Configuration / MalformedBatch / StatusDoc）一律在任何写盘之前抛出，
/// 整个 run 中止；SourceFetch 只在抓取层内部使用，记录日志后跳过该条记录。
#[derive(Debug, thiserror::Error)]
pub enum PmSyncError {
    /// 缺少凭据或输出位置
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 已有批文件无法拆分为记录块
    #[error("Malformed batch file {}: {reason}", path.display())]
    MalformedBatch { path: PathBuf, reason: String },

    /// 状态文档缺少水位字段或摘要小节
    #[error("Status doc error: {0}")]
    StatusDoc(String),

    /// 单条记录抓取失败（抓取层记录后忽略）
    #[error("Source fetch error: {0}")]
    SourceFetch(String),

    #[error("Transport error: {0}")]
    Transport(String),

    /// 非 2xx 响应
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// 重试次数耗尽仍被限流
    #[error("Rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// API 在 200 响应中返回了业务错误（GraphQL errors 等）
    #[error("API error: {0}")]
    Api(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    IO(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// NDDF 数据集缺失或不完整
    #[error("NDDF error: {0}")]
    Nddf(String),
}

impl From<std::io::Error> for PmSyncError {
    fn from(error: std::io::Error) -> Self {
        PmSyncError::IO(error.to_string())
    }
}

impl From<serde_json::Error> for PmSyncError {
    fn from(error: serde_json::Error) -> Self {
        PmSyncError::Serialization(error.to_string())
    }
}

impl From<reqwest::Error> for PmSyncError {
    fn from(error: reqwest::Error) -> Self {
        PmSyncError::Transport(error.to_string())
    }
}

impl From<regex::Error> for PmSyncError {
    fn from(error: regex::Error) -> Self {
        PmSyncError::InvalidData(format!("regex: {}", error))
    }
}

impl PmSyncError {
    /// 构造 MalformedBatch
    pub fn malformed<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        PmSyncError::MalformedBatch {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// 是否属于引擎级致命错误（不可重试，且保证未写任何文件）
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PmSyncError::Configuration(_)
                | PmSyncError::MalformedBatch { .. }
                | PmSyncError::StatusDoc(_)
        )
    }

    /// HTTP 状态码（如果这是一个 HTTP 错误）
    pub fn http_status(&self) -> Option<u16> {
        match self {
            PmSyncError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PmSyncError>;
