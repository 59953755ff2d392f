//! 抽取传输 - 基础设施层
//!
//! 一个文件 = 一次 multipart 请求/响应。只负责把字节送出去、把状态码和响应体带回来，
//! 不认识发票字段，也不判断成败。

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error};

/// 一次上传请求
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// 上游响应（未解析）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 传输层错误：请求根本没有拿到响应
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("连接失败: {0}")]
    Connect(String),
    #[error("请求超时")]
    Timeout,
    #[error("请求失败: {0}")]
    Request(String),
}

/// 抽取传输能力
#[async_trait]
pub trait ExtractionTransport: Send + Sync {
    async fn send(&self, request: UploadRequest) -> Result<TransportResponse, TransportError>;

    /// 目标地址（仅用于日志）
    fn endpoint(&self) -> &str;
}

/// 基于 reqwest 的 multipart 传输
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl ReqwestTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ExtractionTransport for ReqwestTransport {
    async fn send(&self, request: UploadRequest) -> Result<TransportResponse, TransportError> {
        debug!(
            "上传 {} ({} 字节, {}) 到 {}",
            request.file_name,
            request.bytes.len(),
            request.media_type,
            self.endpoint
        );

        let part = reqwest::multipart::Part::bytes(request.bytes)
            .file_name(request.file_name.clone())
            .mime_str(&request.media_type)
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!("上传 {} 失败: {}", request.file_name, e);
                classify(e)
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;

        debug!("{} 上游返回状态 {}, 响应 {} 字节", request.file_name, status, body.len());

        Ok(TransportResponse { status, body })
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}
