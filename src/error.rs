use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 批次被拒绝（任何任务启动之前）
    #[error("批次被拒绝: {0}")]
    Rejected(#[from] BatchRejection),
    /// 单个文件的抽取错误
    #[error("抽取错误: {0}")]
    Extraction(#[from] ExtractionError),
    /// 临时存储错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 网关错误
    #[error("网关错误: {0}")]
    Gateway(#[from] GatewayError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 批次级拒绝：快速失败，不启动任何任务
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchRejection {
    /// 批次为空
    #[error("批次中没有任何文件")]
    EmptyBatch,
    /// 同一批次内重复提交同一个文件
    #[error("重复提交的文件: {id}")]
    DuplicateSubmission { id: String },
    /// 调用方已有批次在处理中
    #[error("调用方 {caller} 已有 {in_flight} 个批次在处理中 (上限 {limit})")]
    BatchInFlight {
        caller: String,
        in_flight: usize,
        limit: usize,
    },
    /// 文件大小必须为正数
    #[error("文件 {id} 的声明大小必须大于 0")]
    InvalidSize { id: String },
}

/// 单个文件失败的类型（对外可见）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    UnsupportedMediaType,
    PayloadTooLarge,
    UpstreamUnavailable,
    UpstreamMalformed,
    UpstreamRejected,
    StorageUnavailable,
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedMediaType => "UnsupportedMediaType",
            Self::PayloadTooLarge => "PayloadTooLarge",
            Self::UpstreamUnavailable => "UpstreamUnavailable",
            Self::UpstreamMalformed => "UpstreamMalformed",
            Self::UpstreamRejected => "UpstreamRejected",
            Self::StorageUnavailable => "StorageUnavailable",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "UnsupportedMediaType" => Some(Self::UnsupportedMediaType),
            "PayloadTooLarge" => Some(Self::PayloadTooLarge),
            "UpstreamUnavailable" => Some(Self::UpstreamUnavailable),
            "UpstreamMalformed" => Some(Self::UpstreamMalformed),
            "UpstreamRejected" => Some(Self::UpstreamRejected),
            "StorageUnavailable" => Some(Self::StorageUnavailable),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 抽取错误
///
/// 覆盖 ExtractionClient 与网关共享的全部失败类型。
/// 序列化时以 `error` 字段作为标签，网关响应体与客户端还原使用同一格式。
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "error")]
pub enum ExtractionError {
    /// 媒体类型不在允许列表中
    #[error("不支持的文件类型: {media_type}")]
    UnsupportedMediaType { media_type: String },
    /// 文件超过大小上限
    #[error("文件过大: {size} 字节 (上限 {max} 字节)")]
    PayloadTooLarge { size: u64, max: u64 },
    /// 抽取服务无法连接或超时
    #[error("抽取服务不可用: {reason}")]
    UpstreamUnavailable { reason: String },
    /// 抽取服务返回了缺字段或无法解析的响应
    #[error("抽取服务响应格式错误: {detail}")]
    UpstreamMalformed {
        missing: Vec<String>,
        detail: String,
    },
    /// 抽取服务返回非 2xx 状态
    #[error("抽取服务拒绝请求 (状态码 {status}): {message}")]
    UpstreamRejected { status: u16, message: String },
    /// 临时存储失败
    #[error("临时存储失败: {reason}")]
    #[serde(rename = "StorageUnavailable")]
    Storage { reason: String },
}

impl ExtractionError {
    /// 返回对外可见的失败类型
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::UnsupportedMediaType { .. } => FailureKind::UnsupportedMediaType,
            Self::PayloadTooLarge { .. } => FailureKind::PayloadTooLarge,
            Self::UpstreamUnavailable { .. } => FailureKind::UpstreamUnavailable,
            Self::UpstreamMalformed { .. } => FailureKind::UpstreamMalformed,
            Self::UpstreamRejected { .. } => FailureKind::UpstreamRejected,
            Self::Storage { .. } => FailureKind::StorageUnavailable,
        }
    }

    /// 由缺失字段列表创建格式错误
    pub fn missing_fields(missing: Vec<String>) -> Self {
        let detail = format!("缺少必填字段: {}", missing.join(", "));
        Self::UpstreamMalformed { missing, detail }
    }
}

impl From<StorageError> for ExtractionError {
    fn from(err: StorageError) -> Self {
        ExtractionError::Storage {
            reason: err.to_string(),
        }
    }
}

/// 临时存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 写入临时文件失败
    #[error("写入临时文件失败: {0}")]
    WriteFailed(#[source] std::io::Error),
    /// 读取临时文件失败
    #[error("读取临时文件失败 (句柄 {handle}): {source}")]
    ReadFailed {
        handle: u64,
        #[source]
        source: std::io::Error,
    },
    /// 句柄不存在或已释放
    #[error("临时文件句柄不存在: {0}")]
    UnknownHandle(u64),
    /// 阻塞线程池中的存储任务异常终止
    #[error("临时存储任务异常终止: {0}")]
    TaskFailed(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 配置值非法
    #[error("配置项 {key} 非法: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// 网关错误
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 监听地址解析失败
    #[error("无法解析监听地址 {addr}: {reason}")]
    InvalidBindAddress { addr: String, reason: String },
    /// 服务运行失败
    #[error("网关服务运行失败: {0}")]
    Serve(#[source] std::io::Error),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Other(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Other(format!("JSON解析失败: {}", err))
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
