use crate::error::ConfigError;
use crate::models::media::MediaPolicy;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// ExtractionClient 发送文件的地址（可以是网关，也可以直接是抽取服务）
    pub extraction_endpoint: String,
    /// 网关转发的上游抽取服务地址
    pub upstream_endpoint: String,
    /// 网关监听地址
    pub gateway_bind: String,
    /// 允许的媒体类型（支持 pdf / jpeg / png 简写或完整 MIME）
    pub allowed_media_types: Vec<String>,
    /// 单个文件大小上限（字节）
    pub max_file_size_bytes: u64,
    /// 抽取调用超时（秒）
    pub extraction_timeout_secs: u64,
    /// 每个调用方同时处理的批次数量上限
    pub max_in_flight_batches_per_caller: usize,
    /// 同时上传的文件数量（0 表示不限制）
    pub max_concurrent_uploads: usize,
    /// 临时文件目录（为空时使用系统临时目录）
    pub temp_dir: Option<String>,
    /// 批量模式下扫描的发票目录
    pub input_folder: String,
    /// 批次报告输出文件
    pub report_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extraction_endpoint: "http://127.0.0.1:8080/api/v1/extract".to_string(),
            upstream_endpoint: "http://127.0.0.1:8000/process".to_string(),
            gateway_bind: "127.0.0.1:8080".to_string(),
            allowed_media_types: vec!["pdf".to_string(), "jpeg".to_string(), "png".to_string()],
            max_file_size_bytes: 10 * 1024 * 1024,
            extraction_timeout_secs: 60,
            max_in_flight_batches_per_caller: 1,
            max_concurrent_uploads: 8,
            temp_dir: None,
            input_folder: "invoices".to_string(),
            report_file: "batch_report.json".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            extraction_endpoint: std::env::var("EXTRACTION_ENDPOINT").unwrap_or(default.extraction_endpoint),
            upstream_endpoint: std::env::var("UPSTREAM_ENDPOINT").unwrap_or(default.upstream_endpoint),
            gateway_bind: std::env::var("GATEWAY_BIND").unwrap_or(default.gateway_bind),
            allowed_media_types: std::env::var("ALLOWED_MEDIA_TYPES")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or(default.allowed_media_types),
            max_file_size_bytes: std::env::var("MAX_FILE_SIZE_BYTES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_file_size_bytes),
            extraction_timeout_secs: std::env::var("EXTRACTION_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.extraction_timeout_secs),
            max_in_flight_batches_per_caller: std::env::var("MAX_IN_FLIGHT_BATCHES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_in_flight_batches_per_caller),
            max_concurrent_uploads: std::env::var("MAX_CONCURRENT_UPLOADS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_uploads),
            temp_dir: std::env::var("TEMP_DIR").ok().or(default.temp_dir),
            input_folder: std::env::var("INPUT_FOLDER").unwrap_or(default.input_folder),
            report_file: std::env::var("REPORT_FILE").unwrap_or(default.report_file),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }

    /// 从 TOML 文件加载配置，缺省项使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 检查配置是否可用
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_file_size_bytes == 0 {
            return Err(invalid("max_file_size_bytes", "必须大于 0"));
        }
        if self.extraction_timeout_secs == 0 {
            return Err(invalid("extraction_timeout_secs", "必须大于 0"));
        }
        if self.max_in_flight_batches_per_caller == 0 {
            return Err(invalid("max_in_flight_batches_per_caller", "必须大于 0"));
        }
        if self.allowed_media_types.is_empty() {
            return Err(invalid("allowed_media_types", "至少需要一种媒体类型"));
        }
        MediaPolicy::from_names(&self.allowed_media_types)
            .map_err(|name| invalid("allowed_media_types", &format!("未知的媒体类型 {}", name)))?;
        Ok(())
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    /// 构建媒体类型策略
    pub fn media_policy(&self) -> Result<MediaPolicy, ConfigError> {
        MediaPolicy::from_names(&self.allowed_media_types)
            .map_err(|name| invalid("allowed_media_types", &format!("未知的媒体类型 {}", name)))
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
